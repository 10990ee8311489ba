//! Configuration shared between the database layer and the binary

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Database connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout_secs: u64,
}

impl DatabaseConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_connections: 20,
            min_connections: 2,
            connect_timeout_secs: 10,
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// SQLite in-memory databases only live as long as their single connection.
    pub fn is_sqlite_memory(&self) -> bool {
        self.url.starts_with("sqlite::memory:")
    }
}
