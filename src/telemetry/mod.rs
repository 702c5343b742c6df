//! Telemetry initialization and structured error events

use crate::config::TelemetryConfig;
use std::backtrace::Backtrace;
use std::fmt::Display;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Install the global tracing subscriber.
///
/// `RUST_LOG` drives the filter. With `log_format == "json"` every event is a
/// flattened JSON line carrying timestamp, level, target and line number.
/// Returns `false` when a global subscriber was already installed.
pub fn init(config: &TelemetryConfig) -> bool {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| config.default_filter.as_str().into());

    let registry = tracing_subscriber::registry().with(env_filter);

    if config.log_format == "json" {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .json()
            .flatten_event(true)
            .with_target(true)
            .with_line_number(true);
        registry.with(fmt_layer).try_init().is_ok()
    } else {
        let fmt_layer = tracing_subscriber::fmt::layer().with_line_number(true);
        registry.with(fmt_layer).try_init().is_ok()
    }
}

/// Emit an error event for `error` with its message, type name and a captured backtrace.
pub fn log_error<E>(message: &str, error: &E)
where
    E: Display + ?Sized,
{
    tracing::error!(
        error = %error,
        error_class = std::any::type_name::<E>(),
        backtrace = %Backtrace::capture(),
        "{}",
        message
    );
}

/// Log the error side of a `Result` and hand the result back untouched.
pub trait LogErrorExt<T, E> {
    fn log_error(self, message: &str) -> Result<T, E>;
}

impl<T, E: Display> LogErrorExt<T, E> for Result<T, E> {
    fn log_error(self, message: &str) -> Result<T, E> {
        if let Err(error) = &self {
            log_error(message, error);
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_error_ext_passes_ok_through() {
        let result: Result<u8, String> = Ok(7);
        assert_eq!(result.log_error("never logged"), Ok(7));
    }

    #[test]
    fn test_log_error_ext_keeps_error() {
        let result: Result<u8, String> = Err("boom".to_string());
        assert_eq!(result.log_error("failed"), Err("boom".to_string()));
    }

    #[test]
    fn test_init_twice_is_harmless() {
        let config = TelemetryConfig::default();
        init(&config);
        assert!(!init(&config));
    }
}
