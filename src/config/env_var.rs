//! Typed environment variable loading

use std::env::{self, VarError};
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum EnvVarError {
    #[error("Missing required environment variable \"{0}\"")]
    Missing(String),

    #[error("An error occurred when casting the value of \"{name}\"")]
    Cast {
        name: String,
        #[source]
        source: BoxError,
    },
}

/// Load `.env` from the working directory (or a parent), overriding variables
/// already present in the process environment. A missing file is not an error.
pub fn load_dotenv() -> Result<(), dotenvy::Error> {
    ignore_missing(dotenvy::dotenv_override())
}

/// Like [`load_dotenv`], for an explicit file.
pub fn load_dotenv_from(path: impl AsRef<Path>) -> Result<(), dotenvy::Error> {
    ignore_missing(dotenvy::from_path_override(path))
}

fn ignore_missing<T>(result: Result<T, dotenvy::Error>) -> Result<(), dotenvy::Error> {
    match result {
        Ok(_) => Ok(()),
        Err(e) if e.not_found() => Ok(()),
        Err(e) => Err(e),
    }
}

/// Read `name` and convert it with `cast`.
///
/// Returns `Ok(None)` when the variable is unset.
pub fn optional_env_var_with<T, E, F>(name: &str, cast: F) -> Result<Option<T>, EnvVarError>
where
    F: FnOnce(&str) -> Result<T, E>,
    E: Into<BoxError>,
{
    let raw = match env::var(name) {
        Ok(raw) => raw,
        Err(VarError::NotPresent) => return Ok(None),
        Err(err @ VarError::NotUnicode(_)) => {
            return Err(EnvVarError::Cast {
                name: name.to_string(),
                source: Box::new(err),
            })
        }
    };

    cast(&raw).map(Some).map_err(|e| EnvVarError::Cast {
        name: name.to_string(),
        source: e.into(),
    })
}

/// Read a required variable and convert it with `cast`.
pub fn env_var_with<T, E, F>(name: &str, cast: F) -> Result<T, EnvVarError>
where
    F: FnOnce(&str) -> Result<T, E>,
    E: Into<BoxError>,
{
    optional_env_var_with(name, cast)?.ok_or_else(|| EnvVarError::Missing(name.to_string()))
}

/// Read a required variable through `FromStr`.
pub fn env_var<T>(name: &str) -> Result<T, EnvVarError>
where
    T: FromStr,
    T::Err: Into<BoxError>,
{
    env_var_with(name, str::parse::<T>)
}

/// Read a variable through `FromStr`, or `None` when unset.
pub fn optional_env_var<T>(name: &str) -> Result<Option<T>, EnvVarError>
where
    T: FromStr,
    T::Err: Into<BoxError>,
{
    optional_env_var_with(name, str::parse::<T>)
}

/// Read a variable through `FromStr`, falling back to `default` when unset.
///
/// A value that is present but does not parse is still an error.
pub fn env_var_or<T>(name: &str, default: T) -> Result<T, EnvVarError>
where
    T: FromStr,
    T::Err: Into<BoxError>,
{
    Ok(optional_env_var(name)?.unwrap_or(default))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    // Each test owns its variable names so tests can run in parallel.

    #[test]
    fn test_load_dotenv_from_missing_file() {
        let dir = tempfile::TempDir::new().unwrap();
        assert!(load_dotenv_from(dir.path().join(".env")).is_ok());
    }

    #[test]
    fn test_load_dotenv_from_overrides() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join(".env");
        std::fs::write(&path, "TEST_ENV_VAR_DOTENV=from_file\n").unwrap();
        env::set_var("TEST_ENV_VAR_DOTENV", "from_process");

        load_dotenv_from(&path).unwrap();
        assert_eq!(env::var("TEST_ENV_VAR_DOTENV").unwrap(), "from_file");
    }

    #[test]
    fn test_load_dotenv_from_malformed_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join(".env");
        std::fs::write(&path, "TEST_ENV_VAR_DOTENV_BROKEN='unterminated\n").unwrap();

        let err = load_dotenv_from(&path).unwrap_err();
        assert!(!err.not_found());
    }

    #[test]
    fn test_env_var_is_found() {
        env::set_var("TEST_ENV_VAR_FOUND", "my_value");
        let value: String = env_var("TEST_ENV_VAR_FOUND").unwrap();
        assert_eq!(value, "my_value");
    }

    #[test]
    fn test_env_var_is_not_found() {
        env::remove_var("TEST_ENV_VAR_MISSING");
        let err = env_var::<String>("TEST_ENV_VAR_MISSING").unwrap_err();
        assert!(matches!(err, EnvVarError::Missing(_)));
        assert_eq!(
            err.to_string(),
            "Missing required environment variable \"TEST_ENV_VAR_MISSING\""
        );
    }

    #[test]
    fn test_env_var_is_defaulted() {
        env::remove_var("TEST_ENV_VAR_DEFAULTED");
        let value = env_var_or("TEST_ENV_VAR_DEFAULTED", "my_default_value".to_string()).unwrap();
        assert_eq!(value, "my_default_value");
    }

    #[test]
    fn test_optional_env_var_is_none() {
        env::remove_var("TEST_ENV_VAR_OPTIONAL");
        let value: Option<String> = optional_env_var("TEST_ENV_VAR_OPTIONAL").unwrap();
        assert!(value.is_none());
    }

    #[test]
    fn test_env_var_is_found_and_cast() {
        env::set_var("TEST_ENV_VAR_INT", "123");
        let value: i64 = env_var("TEST_ENV_VAR_INT").unwrap();
        assert_eq!(value, 123);
    }

    #[test]
    fn test_env_var_custom_cast() {
        #[derive(Debug, PartialEq)]
        struct Ports(Vec<u16>);

        env::set_var("TEST_ENV_VAR_PORTS", "80, 443");
        let value = env_var_with("TEST_ENV_VAR_PORTS", |raw| {
            raw.split(',')
                .map(|p| p.trim().parse::<u16>())
                .collect::<Result<Vec<_>, _>>()
                .map(Ports)
        })
        .unwrap();
        assert_eq!(value, Ports(vec![80, 443]));
    }

    #[test]
    fn test_env_var_casting_failed() {
        env::set_var("TEST_ENV_VAR_BAD_INT", "1,2,3");
        let err = env_var::<i32>("TEST_ENV_VAR_BAD_INT").unwrap_err();
        assert!(matches!(err, EnvVarError::Cast { .. }));
        assert!(err
            .to_string()
            .starts_with("An error occurred when casting the value"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_env_var_or_rejects_unparsable_value() {
        env::set_var("TEST_ENV_VAR_BAD_DEFAULTED", "not-a-number");
        assert!(env_var_or("TEST_ENV_VAR_BAD_DEFAULTED", 5u32).is_err());
    }
}
