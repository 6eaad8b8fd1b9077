use secrecy::SecretString;
use thiserror::Error;

use crate::domain::credential::PosEnvironment;

/// Process configuration, read from environment variables.
///
/// Construction goes through [`AppConfig::load_with`] so tests can inject a
/// lookup closure instead of mutating process env.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub toast: ToastConfig,
    pub clover: CloverConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct ToastConfig {
    pub sandbox_base_url: String,
    pub prod_base_url: String,
    /// Short-circuits token acquisition and replaces network calls with
    /// deterministic local computations.
    pub mock: bool,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct CloverConfig {
    /// App-level OAuth client used for the authorization-code exchange.
    pub client_id: Option<String>,
    pub client_secret: Option<SecretString>,
    pub environment: PosEnvironment,
    pub sandbox_base_url: String,
    pub prod_base_url: String,
    pub mock: bool,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

impl LogFormat {
    fn parse(raw: &str) -> Option<Self> {
        match raw.to_lowercase().as_str() {
            "compact" => Some(Self::Compact),
            "pretty" => Some(Self::Pretty),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required env var: {0}")]
    MissingVar(&'static str),
    #[error("invalid value for `{key}`: `{value}`")]
    InvalidValue { key: &'static str, value: String },
}

const TOAST_SANDBOX_DEFAULT: &str = "https://api-sandbox.toasttab.com";
const TOAST_PROD_DEFAULT: &str = "https://api.toasttab.com";
const CLOVER_SANDBOX_DEFAULT: &str = "https://sandbox.dev.clover.com";
const CLOVER_PROD_DEFAULT: &str = "https://api.clover.com";
const PROVIDER_TIMEOUT_DEFAULT_SECS: u64 = 10;

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::load_with(|key| std::env::var(key).ok())
    }

    pub fn load_with(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let database = DatabaseConfig {
            url: lookup("DATABASE_URL").ok_or(ConfigError::MissingVar("DATABASE_URL"))?,
            max_connections: parse_or(&lookup, "DATABASE_MAX_CONNECTIONS", 5)?,
            timeout_secs: parse_or(&lookup, "DATABASE_TIMEOUT_SECS", 30)?,
        };

        let toast = ToastConfig {
            sandbox_base_url: lookup("TOAST_SANDBOX_BASE_URL")
                .unwrap_or_else(|| TOAST_SANDBOX_DEFAULT.to_owned()),
            prod_base_url: lookup("TOAST_PROD_BASE_URL")
                .unwrap_or_else(|| TOAST_PROD_DEFAULT.to_owned()),
            mock: flag(&lookup, "TOAST_MOCK"),
            timeout_secs: parse_or(&lookup, "TOAST_TIMEOUT_SECS", PROVIDER_TIMEOUT_DEFAULT_SECS)?,
        };

        let clover_environment = match lookup("CLOVER_ENVIRONMENT") {
            Some(raw) => PosEnvironment::parse(&raw),
            None => PosEnvironment::Sandbox,
        };
        let clover = CloverConfig {
            client_id: lookup("CLOVER_CLIENT_ID").filter(|value| !value.is_empty()),
            client_secret: lookup("CLOVER_CLIENT_SECRET")
                .filter(|value| !value.is_empty())
                .map(SecretString::from),
            environment: clover_environment,
            sandbox_base_url: lookup("CLOVER_SANDBOX_BASE_URL")
                .unwrap_or_else(|| CLOVER_SANDBOX_DEFAULT.to_owned()),
            prod_base_url: lookup("CLOVER_PROD_BASE_URL")
                .unwrap_or_else(|| CLOVER_PROD_DEFAULT.to_owned()),
            mock: flag(&lookup, "CLOVER_MOCK"),
            timeout_secs: parse_or(&lookup, "CLOVER_TIMEOUT_SECS", PROVIDER_TIMEOUT_DEFAULT_SECS)?,
        };

        let format_raw = lookup("LOG_FORMAT").unwrap_or_else(|| "compact".to_owned());
        let logging = LoggingConfig {
            level: lookup("LOG_LEVEL").unwrap_or_else(|| "info".to_owned()),
            format: LogFormat::parse(&format_raw)
                .ok_or(ConfigError::InvalidValue { key: "LOG_FORMAT", value: format_raw })?,
        };

        Ok(Self { database, toast, clover, logging })
    }
}

fn flag(lookup: impl Fn(&str) -> Option<String>, key: &str) -> bool {
    lookup(key).map(|value| value == "true" || value == "1").unwrap_or(false)
}

fn parse_or<T: std::str::FromStr>(
    lookup: impl Fn(&str) -> Option<String>,
    key: &'static str,
    fallback: T,
) -> Result<T, ConfigError> {
    match lookup(key) {
        None => Ok(fallback),
        Some(raw) => raw.parse().map_err(|_| ConfigError::InvalidValue { key, value: raw }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use crate::domain::credential::PosEnvironment;

    use super::{AppConfig, ConfigError, LogFormat};

    fn from_map(vars: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let map: HashMap<String, String> =
            vars.iter().map(|(key, value)| (key.to_string(), value.to_string())).collect();
        AppConfig::load_with(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_only_database_url_is_set() {
        let config = from_map(&[("DATABASE_URL", "sqlite::memory:")]).expect("load");

        assert_eq!(config.database.max_connections, 5);
        assert_eq!(config.toast.sandbox_base_url, "https://api-sandbox.toasttab.com");
        assert_eq!(config.clover.environment, PosEnvironment::Sandbox);
        assert_eq!(config.toast.timeout_secs, 10);
        assert!(!config.toast.mock);
        assert_eq!(config.logging.format, LogFormat::Compact);
    }

    #[test]
    fn missing_database_url_is_an_error() {
        let error = from_map(&[]).expect_err("should fail");
        assert!(matches!(error, ConfigError::MissingVar("DATABASE_URL")));
    }

    #[test]
    fn mock_flags_and_environment_are_parsed() {
        let config = from_map(&[
            ("DATABASE_URL", "sqlite::memory:"),
            ("TOAST_MOCK", "true"),
            ("CLOVER_MOCK", "1"),
            ("CLOVER_ENVIRONMENT", "production"),
            ("TOAST_TIMEOUT_SECS", "3"),
        ])
        .expect("load");

        assert!(config.toast.mock);
        assert!(config.clover.mock);
        assert_eq!(config.clover.environment, PosEnvironment::Prod);
        assert_eq!(config.toast.timeout_secs, 3);
    }

    #[test]
    fn invalid_numeric_value_is_rejected() {
        let error = from_map(&[
            ("DATABASE_URL", "sqlite::memory:"),
            ("DATABASE_MAX_CONNECTIONS", "lots"),
        ])
        .expect_err("should fail");

        assert!(matches!(error, ConfigError::InvalidValue { key: "DATABASE_MAX_CONNECTIONS", .. }));
    }
}
