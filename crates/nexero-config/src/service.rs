use nexero_core::DatabaseConfig;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::str::FromStr;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {details}")]
    InvalidConfiguration { details: String },

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}

const SUPPORTED_SCHEMES: [&str; 3] = ["postgres://", "postgresql://", "sqlite:"];

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ServerConfig {
    pub address: SocketAddr,
    pub database_url: String,
    /// Deployment label reported by the health endpoint
    pub environment: String,
    /// Allowed CORS origins; `*` allows any origin
    pub cors_origins: Vec<String>,

    // Connection pool settings (env driven, with defaults)
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_connect_timeout_secs: u64,
}

impl ServerConfig {
    /// Build the configuration, reading pool settings from the process environment
    pub fn new(
        address: &str,
        database_url: String,
        environment: String,
        cors_origins: Vec<String>,
    ) -> Result<Self, ConfigError> {
        Self::with_env(address, database_url, environment, cors_origins, |key| {
            std::env::var(key).ok()
        })
    }

    /// Same as [`ServerConfig::new`] with an explicit environment lookup
    pub fn with_env<F>(
        address: &str,
        database_url: String,
        environment: String,
        cors_origins: Vec<String>,
        lookup: F,
    ) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let address = address
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidConfiguration {
                details: format!("address '{}' is not a socket address: {}", address, e),
            })?;

        if database_url.trim().is_empty() {
            return Err(ConfigError::InvalidConfiguration {
                details: "database url is required".to_string(),
            });
        }
        if !SUPPORTED_SCHEMES
            .iter()
            .any(|scheme| database_url.starts_with(scheme))
        {
            return Err(ConfigError::InvalidConfiguration {
                details: format!(
                    "database url must start with one of {}",
                    SUPPORTED_SCHEMES.join(", ")
                ),
            });
        }

        let cors_origins: Vec<String> = cors_origins
            .into_iter()
            .map(|origin| origin.trim().to_string())
            .filter(|origin| !origin.is_empty())
            .collect();

        let db_max_connections = env_or(&lookup, "NEXERO_DB_MAX_CONNECTIONS", 20)?;
        let db_min_connections = env_or(&lookup, "NEXERO_DB_MIN_CONNECTIONS", 2)?;
        let db_connect_timeout_secs = env_or(&lookup, "NEXERO_DB_CONNECT_TIMEOUT", 10)?;

        if db_min_connections > db_max_connections {
            return Err(ConfigError::InvalidConfiguration {
                details: format!(
                    "min connections ({}) exceeds max connections ({})",
                    db_min_connections, db_max_connections
                ),
            });
        }

        let config = ServerConfig {
            address,
            database_url,
            environment,
            cors_origins: if cors_origins.is_empty() {
                vec!["*".to_string()]
            } else {
                cors_origins
            },
            db_max_connections,
            db_min_connections,
            db_connect_timeout_secs,
        };
        debug!(
            "Server configuration loaded: address={}, environment={}, cors={:?}",
            config.address, config.environment, config.cors_origins
        );

        Ok(config)
    }

    pub fn database_config(&self) -> DatabaseConfig {
        DatabaseConfig {
            url: self.database_url.clone(),
            max_connections: self.db_max_connections,
            min_connections: self.db_min_connections,
            connect_timeout_secs: self.db_connect_timeout_secs,
        }
    }

    pub fn allows_any_origin(&self) -> bool {
        self.cors_origins.iter().any(|origin| origin == "*")
    }
}

fn env_or<T, F>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(value) => value.trim().parse().map_err(|_| ConfigError::InvalidValue {
            key: key.to_string(),
            value,
        }),
        None => Ok(default),
    }
}
