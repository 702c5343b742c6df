//! Configuration management

mod env_var;

pub use env_var::{
    env_var, env_var_or, env_var_with, load_dotenv, load_dotenv_from, optional_env_var,
    optional_env_var_with, EnvVarError,
};

use anyhow::{Context, Result};

/// Demo server configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server host
    pub http_host: String,
    /// HTTP server port
    pub http_port: u16,
    /// Name and version reported by `GET /`
    pub app: AppInfo,
    /// Token configuration, present when `AUTH_SECRET_KEY` is set
    pub auth: Option<AuthConfig>,
    /// Logging configuration
    pub telemetry: TelemetryConfig,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppInfo {
    pub name: String,
    pub version: String,
}

impl Default for AppInfo {
    fn default() -> Self {
        Self {
            name: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// HMAC secret used to sign tokens
    pub secret_key: String,
    /// Shared key clients present to `Auth::validate_public_key`
    pub public_key: String,
    /// Claims copied from a refresh token into a new access token.
    /// Must contain `username`.
    pub token_data_keys: Vec<String>,
    pub access_token_expire_secs: i64,
    pub refresh_token_expire_days: i64,
}

impl AuthConfig {
    pub fn new(secret_key: impl Into<String>, public_key: impl Into<String>) -> Self {
        Self {
            secret_key: secret_key.into(),
            public_key: public_key.into(),
            token_data_keys: vec!["username".to_string()],
            access_token_expire_secs: 86400,
            refresh_token_expire_days: 30,
        }
    }

    fn from_env() -> Result<Option<Self>> {
        let Some(secret_key) = optional_env_var::<String>("AUTH_SECRET_KEY")? else {
            return Ok(None);
        };

        let defaults = Self::new(secret_key, String::new());
        Ok(Some(Self {
            public_key: env_var("AUTH_PUBLIC_KEY")
                .context("AUTH_PUBLIC_KEY is required when AUTH_SECRET_KEY is set")?,
            token_data_keys: optional_env_var_with("AUTH_TOKEN_DATA_KEYS", |raw| {
                Ok::<_, std::convert::Infallible>(
                    raw.split(',')
                        .map(|k| k.trim().to_string())
                        .filter(|k| !k.is_empty())
                        .collect(),
                )
            })?
            .unwrap_or(defaults.token_data_keys),
            access_token_expire_secs: env_var_or(
                "AUTH_ACCESS_TOKEN_EXPIRE_SECONDS",
                defaults.access_token_expire_secs,
            )?,
            refresh_token_expire_days: env_var_or(
                "AUTH_REFRESH_TOKEN_EXPIRE_DAYS",
                defaults.refresh_token_expire_days,
            )?,
            secret_key: defaults.secret_key,
        }))
    }
}

/// PostgreSQL connection settings
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub user: String,
    pub password: String,
    pub host: String,
    pub port: u16,
    pub database: String,
    pub pool_size: u32,
}

impl DatabaseConfig {
    /// Load from `SQL_*` environment variables
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            user: env_var("SQL_USER")?,
            password: env_var("SQL_PASSWORD")?,
            host: env_var("SQL_HOST")?,
            port: env_var_or("SQL_PORT", 5432).context("Invalid SQL_PORT")?,
            database: env_var("SQL_DATABASE")?,
            pool_size: env_var_or("SQL_POOL_SIZE", 5).context("Invalid SQL_POOL_SIZE")?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// "json" or "text"
    pub log_format: String,
    /// Filter used when `RUST_LOG` is not set
    pub default_filter: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_format: "text".to_string(),
            default_filter: "backend_utils=info,tower_http=info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let app_defaults = AppInfo::default();
        let telemetry_defaults = TelemetryConfig::default();

        Ok(Self {
            http_host: env_var_or("HTTP_HOST", "0.0.0.0".to_string())?,
            http_port: env_var_or("HTTP_PORT", 8080).context("Invalid HTTP_PORT")?,
            app: AppInfo {
                name: env_var_or("APP_NAME", app_defaults.name)?,
                version: env_var_or("APP_VERSION", app_defaults.version)?,
            },
            auth: AuthConfig::from_env()?,
            telemetry: TelemetryConfig {
                log_format: env_var_or("LOG_FORMAT", telemetry_defaults.log_format)?,
                default_filter: telemetry_defaults.default_filter,
            },
        })
    }

    /// Get HTTP server address
    pub fn http_addr(&self) -> String {
        format!("{}:{}", self.http_host, self.http_port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    fn test_config() -> Config {
        Config {
            http_host: "127.0.0.1".to_string(),
            http_port: 8080,
            app: AppInfo::default(),
            auth: None,
            telemetry: TelemetryConfig::default(),
        }
    }

    #[test]
    fn test_config_http_addr() {
        let config = test_config();
        assert_eq!(config.http_addr(), "127.0.0.1:8080");
    }

    #[test]
    fn test_config_http_addr_ipv6() {
        let mut config = test_config();
        config.http_host = "::1".to_string();
        config.http_port = 3000;

        assert_eq!(config.http_addr(), "::1:3000");
    }

    #[test]
    fn test_app_info_defaults_to_crate_metadata() {
        let info = AppInfo::default();
        assert_eq!(info.name, "backend-utils");
        assert_eq!(info.version, env!("CARGO_PKG_VERSION"));
    }

    #[test]
    fn test_auth_config_defaults() {
        let config = AuthConfig::new("secret", "public");
        assert_eq!(config.token_data_keys, vec!["username"]);
        assert_eq!(config.access_token_expire_secs, 86400);
        assert_eq!(config.refresh_token_expire_days, 30);
    }

    // Only this test touches AUTH_* and SQL_* variables.
    #[test]
    fn test_sections_from_env() {
        env::set_var("AUTH_SECRET_KEY", "secret");
        env::set_var("AUTH_PUBLIC_KEY", "public");
        env::set_var("AUTH_TOKEN_DATA_KEYS", "username, tenant");
        env::set_var("AUTH_ACCESS_TOKEN_EXPIRE_SECONDS", "60");

        let auth = AuthConfig::from_env().unwrap().unwrap();
        assert_eq!(auth.secret_key, "secret");
        assert_eq!(auth.public_key, "public");
        assert_eq!(auth.token_data_keys, vec!["username", "tenant"]);
        assert_eq!(auth.access_token_expire_secs, 60);
        assert_eq!(auth.refresh_token_expire_days, 30);

        env::remove_var("AUTH_SECRET_KEY");
        assert!(AuthConfig::from_env().unwrap().is_none());

        env::set_var("SQL_USER", "postgres");
        env::set_var("SQL_PASSWORD", "postgres");
        env::set_var("SQL_HOST", "localhost");
        env::set_var("SQL_DATABASE", "app");
        env::set_var("SQL_PORT", "not-a-port");
        assert!(DatabaseConfig::from_env().is_err());

        env::set_var("SQL_PORT", "6543");
        let database = DatabaseConfig::from_env().unwrap();
        assert_eq!(database.port, 6543);
        assert_eq!(database.pool_size, 5);
        assert_eq!(database.database, "app");
    }
}
