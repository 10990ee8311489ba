//! Core utilities and types shared across all Nexero crates

pub mod config;
pub mod error;
pub mod error_builder;
pub mod plugin;
pub mod problemdetails;
pub use problemdetails::ProblemDetails;
pub mod types;
pub mod utils;

// Re-export commonly used types
pub use config::*;
pub use error::*;
pub use error_builder::*;
pub use types::*;
pub use utils::*;

// Re-export external dependencies
pub use async_trait;
pub use chrono;
pub use serde;
pub use serde_json;
pub use thiserror;
pub use tokio;
pub use tracing;
pub use uuid;
