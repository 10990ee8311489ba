//! Server configuration

mod service;

pub use service::{ConfigError, ServerConfig};
