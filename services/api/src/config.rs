//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use axum::http::HeaderValue;
use od_ledger_core::ledger::DEFAULT_EVENT_NAME;
use regex::Regex;
use std::net::SocketAddr;
use tracing::Level;

/// Roll numbers look like `CB.SC.U4CSE23001`.
pub const DEFAULT_ROLL_NUMBER_PATTERN: &str = r"^CB\.SC\.U4[A-Z]{3}\d{5}$";

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Which `DocumentStore` implementation backs the service.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres { database_url: String, max_connections: u32 },
    Memory,
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub store: StoreBackend,
    pub log_level: Level,
    pub default_event_name: String,
    pub roll_number_pattern: Regex,
    pub cors_allowed_origin: HeaderValue,
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
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the configuration from any variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // --- Server Settings ---
        let bind_address_str =
            lookup("BIND_ADDRESS").unwrap_or_else(|| "0.0.0.0:3000".to_string());
        let bind_address = bind_address_str.parse::<SocketAddr>().map_err(|e| {
            ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string())
        })?;

        let log_level_str = lookup("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let cors_origin_str = lookup("CORS_ALLOWED_ORIGIN")
            .unwrap_or_else(|| "http://localhost:3000".to_string());
        let cors_allowed_origin = HeaderValue::from_str(&cors_origin_str).map_err(|e| {
            ConfigError::InvalidValue("CORS_ALLOWED_ORIGIN".to_string(), e.to_string())
        })?;

        // --- Store Settings ---
        let backend = lookup("STORE_BACKEND").unwrap_or_else(|| "postgres".to_string());
        let store = match backend.to_lowercase().as_str() {
            "postgres" => {
                let database_url = lookup("DATABASE_URL")
                    .ok_or_else(|| ConfigError::MissingVar("DATABASE_URL".to_string()))?;
                let max_connections = match lookup("DATABASE_MAX_CONNECTIONS") {
                    Some(value) => value.parse::<u32>().map_err(|e| {
                        ConfigError::InvalidValue(
                            "DATABASE_MAX_CONNECTIONS".to_string(),
                            e.to_string(),
                        )
                    })?,
                    None => 5,
                };
                StoreBackend::Postgres {
                    database_url,
                    max_connections,
                }
            }
            "memory" => StoreBackend::Memory,
            other => {
                return Err(ConfigError::InvalidValue(
                    "STORE_BACKEND".to_string(),
                    format!("'{}' is not one of postgres, memory", other),
                ))
            }
        };

        // --- Ledger Settings ---
        let default_event_name =
            lookup("DEFAULT_EVENT_NAME").unwrap_or_else(|| DEFAULT_EVENT_NAME.to_string());

        let pattern = lookup("ROLL_NUMBER_PATTERN")
            .unwrap_or_else(|| DEFAULT_ROLL_NUMBER_PATTERN.to_string());
        let roll_number_pattern = Regex::new(&pattern).map_err(|e| {
            ConfigError::InvalidValue("ROLL_NUMBER_PATTERN".to_string(), e.to_string())
        })?;

        Ok(Self {
            bind_address,
            store,
            log_level,
            default_event_name,
            roll_number_pattern,
            cors_allowed_origin,
        })
    }

    /// The default configuration on the in-memory store, ignoring the environment.
    pub fn in_memory() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| (name == "STORE_BACKEND").then(|| "memory".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn postgres_is_the_default_backend_and_needs_a_url() {
        let err = load(&[]).unwrap_err();
        assert!(matches!(err, ConfigError::MissingVar(ref v) if v == "DATABASE_URL"));

        let config = load(&[("DATABASE_URL", "postgres://localhost/ods")]).unwrap();
        assert_eq!(
            config.store,
            StoreBackend::Postgres {
                database_url: "postgres://localhost/ods".to_string(),
                max_connections: 5,
            }
        );
        assert_eq!(config.bind_address, "0.0.0.0:3000".parse().unwrap());
        assert_eq!(config.log_level, Level::INFO);
        assert_eq!(config.default_event_name, "Manual Entry");
    }

    #[test]
    fn memory_backend_needs_no_database() {
        let config = load(&[("STORE_BACKEND", "memory"), ("RUST_LOG", "debug")]).unwrap();
        assert_eq!(config.store, StoreBackend::Memory);
        assert_eq!(config.log_level, Level::DEBUG);
    }

    #[test]
    fn rejects_invalid_values() {
        let err = load(&[("STORE_BACKEND", "memory"), ("BIND_ADDRESS", "nowhere")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(ref v, _) if v == "BIND_ADDRESS"));

        let err = load(&[("STORE_BACKEND", "sqlite")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(ref v, _) if v == "STORE_BACKEND"));

        let err = load(&[("STORE_BACKEND", "memory"), ("ROLL_NUMBER_PATTERN", "([")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(ref v, _) if v == "ROLL_NUMBER_PATTERN"));
    }

    #[test]
    fn default_roll_number_pattern() {
        let config = Config::in_memory().unwrap();
        assert!(config.roll_number_pattern.is_match("CB.SC.U4CSE23001"));
        assert!(!config.roll_number_pattern.is_match("cb.sc.u4cse23001"));
        assert!(!config.roll_number_pattern.is_match("CB.SC.U4CSE2300"));
    }
}
