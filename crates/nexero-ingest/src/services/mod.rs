mod ingest_service;
mod session_service;
mod tracking_service;

pub use ingest_service::IngestService;
pub use session_service::{SessionService, VrSession};
pub use tracking_service::{BatchOutcome, TrackingService};

use thiserror::Error;

use crate::classify::Rejection;
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    #[error(transparent)]
    Rejected(#[from] Rejection),

    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Stored row could not be read: {0}")]
    Decode(String),

    #[error("Validation error: {0}")]
    Validation(String),
}
