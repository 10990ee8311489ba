//! Ingestion of VR tour analytics sent by Unreal Engine clients
//!
//! Payloads are classified, normalized and written through a [`RecordStore`].

pub mod classify;
pub mod handlers;
pub mod normalize;
pub mod plugin;
pub mod services;
pub mod store;
pub mod types;

pub use classify::{classify, ClassificationPolicy, ClassifiedRecord, Rejection};
pub use plugin::{IngestPlugin, IngestSettings};
pub use services::*;
pub use store::{MemoryRecordStore, RecordStore, SeaOrmRecordStore, Table};
pub use types::*;
