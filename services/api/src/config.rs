//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::net::SocketAddr;
use std::str::FromStr;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub database_url: String,
    pub log_level: Level,
    pub openai_api_key: Option<String>,
    pub openai_base_url: Option<String>,
    pub generation_model: String,
    pub cors_origin: String,
    /// Largest single attachment accepted, in bytes.
    pub max_upload_bytes: usize,
    /// Largest whole request body accepted, in bytes.
    pub max_request_bytes: usize,
    pub auth_session_days: i64,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        // --- Load Server and Database Settings ---
        let bind_address = parse_var("BIND_ADDRESS", "0.0.0.0:3000")?;

        let database_url = std::env::var("DATABASE_URL")
            .map_err(|_| ConfigError::MissingVar("DATABASE_URL".to_string()))?;

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let cors_origin = std::env::var("CORS_ORIGIN")
            .unwrap_or_else(|_| "http://localhost:3000".to_string());

        // --- Load API Keys (as optional) ---
        let openai_api_key = std::env::var("OPENAI_API_KEY").ok();
        let openai_base_url = std::env::var("OPENAI_BASE_URL").ok();

        // --- Load Generation and Upload Settings ---
        let generation_model =
            std::env::var("GENERATION_MODEL").unwrap_or_else(|_| "gpt-4o".to_string());
        let max_upload_bytes = parse_var("MAX_UPLOAD_BYTES", "52428800")?;
        let max_request_bytes = parse_var("MAX_REQUEST_BYTES", "104857600")?;
        let auth_session_days = parse_var("AUTH_SESSION_DAYS", "30")?;

        Ok(Self {
            bind_address,
            database_url,
            log_level,
            openai_api_key,
            openai_base_url,
            generation_model,
            cors_origin,
            max_upload_bytes,
            max_request_bytes,
            auth_session_days,
        })
    }
}

/// Reads `name` from the environment, falling back to `default`, and parses it.
fn parse_var<T>(name: &str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = std::env::var(name).unwrap_or_else(|_| default.to_string());
    raw.parse::<T>()
        .map_err(|e| ConfigError::InvalidValue(name.to_string(), e.to_string()))
}

#[cfg(test)]
impl Config {
    /// A configuration that never touches the environment.
    pub fn for_tests() -> Self {
        Self {
            bind_address: SocketAddr::from(([127, 0, 0, 1], 0)),
            database_url: "postgres://localhost/exam_forge_test".to_string(),
            log_level: Level::DEBUG,
            openai_api_key: None,
            openai_base_url: None,
            generation_model: "gpt-4o".to_string(),
            cors_origin: "http://localhost:3000".to_string(),
            max_upload_bytes: 1024,
            max_request_bytes: 4096,
            auth_session_days: 30,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_variables_use_their_defaults() {
        let days: i64 = parse_var("EXAM_FORGE_TEST_UNSET_DAYS", "30").unwrap();
        assert_eq!(days, 30);
    }

    #[test]
    fn unparsable_defaults_name_the_variable() {
        let err = parse_var::<usize>("EXAM_FORGE_TEST_UNSET_BYTES", "lots").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(name, _) if name == "EXAM_FORGE_TEST_UNSET_BYTES"));
    }
}
