use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

/// Outcome of the universal endpoint; members depend on `data_type`
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct IngestResponse {
    pub status: String,
    /// session, poi, view or generic
    pub data_type: String,
    pub message: String,
    pub received_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub poi: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub view: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_type: Option<String>,
}

impl IngestResponse {
    pub fn success(data_type: &str, message: &str, received_at: String) -> Self {
        Self {
            status: "success".to_string(),
            data_type: data_type.to_string(),
            message: message.to_string(),
            received_at,
            session_id: None,
            duration_seconds: None,
            poi: None,
            parent: None,
            view: None,
            duration: None,
            event_type: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TrackingEventResponse {
    pub status: String,
    pub timestamp: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TrackingBatchResponse {
    pub status: String,
    pub total_events: usize,
    pub processed: usize,
    pub failed: usize,
    /// Percentage of events stored, 0.0 for an empty batch
    pub success_rate: f64,
    pub timestamp: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct FlexibleEventResponse {
    pub status: String,
    pub event_type: String,
    pub timestamp: String,
}

/// A stored VR session
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SessionResponse {
    pub session_id: String,
    /// active or completed
    pub status: String,
    pub started_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<i64>,
    pub customer_id: Option<String>,
    pub property_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SessionStatusResponse {
    pub session_id: String,
    /// active, completed or not_found
    pub status: String,
    pub started_at: Option<String>,
    /// Seconds since start, only for active sessions
    pub duration_so_far: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HeartbeatResponse {
    pub status: String,
    pub session_id: String,
    pub timestamp: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SessionEventsResponse {
    pub session_id: String,
    pub count: usize,
    #[schema(value_type = Vec<Object>)]
    pub events: Vec<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
    pub environment: String,
    /// connected or error
    pub database: String,
    pub version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ServiceInfoResponse {
    pub service: String,
    pub version: String,
    pub status: String,
    pub docs: String,
    pub health: String,
}
