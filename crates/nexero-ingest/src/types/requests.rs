use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use utoipa::ToSchema;

/// Position in VR world space
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Position {
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub z: Option<f64>,
}

/// Head rotation in degrees
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Rotation {
    pub pitch: Option<f64>,
    pub yaw: Option<f64>,
    pub roll: Option<f64>,
}

/// A single tracking event sent by the VR client
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[schema(example = json!({
    "event_type": "gaze",
    "timestamp": 1727653850.125,
    "session_id": "session_abc123",
    "zone_name": "kitchen",
    "gaze_target": "granite_countertop",
    "dwell_time_ms": 2500
}))]
pub struct TrackingEventRequest {
    /// gaze, zone_enter, zone_exit, interaction, ...
    pub event_type: String,
    /// Epoch seconds (number or numeric string) or ISO 8601 text
    #[schema(value_type = Option<Object>)]
    pub timestamp: Option<Value>,
    /// Required unless the event arrives inside a batch
    pub session_id: Option<String>,
    pub zone_name: Option<String>,
    pub object_name: Option<String>,
    pub gaze_target: Option<String>,
    pub interaction_type: Option<String>,
    pub dwell_time_ms: Option<i64>,
    pub position: Option<Position>,
    pub rotation: Option<Rotation>,
    #[serde(default)]
    #[schema(value_type = Object)]
    pub metadata: Map<String, Value>,
    /// Unrecognised fields, kept alongside `metadata`
    #[serde(flatten)]
    #[schema(ignore)]
    pub extra: Map<String, Value>,
}

/// Events collected during a tour, uploaded together
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct TrackingBatchRequest {
    pub session_id: String,
    /// When the client sent the batch
    #[schema(value_type = Option<Object>)]
    pub sent_at: Option<Value>,
    /// Parsed one by one; a malformed entry only fails itself
    #[schema(value_type = Vec<TrackingEventRequest>)]
    pub events: Vec<Value>,
}

/// Any client event; only `event_type` is required
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[schema(example = json!({
    "event_type": "NavBar_Click",
    "Menu_Item": "Amenities",
    "timestamp": "1764540726"
}))]
pub struct FlexibleEventRequest {
    pub event_type: String,
    pub session_id: Option<String>,
    #[schema(value_type = Option<Object>)]
    pub timestamp: Option<Value>,
    #[serde(flatten)]
    #[schema(ignore)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct StartSessionRequest {
    pub customer_id: Option<String>,
    pub property_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct EndSessionRequest {
    /// Defaults to the time the request is handled
    #[schema(value_type = Option<Object>)]
    pub ended_at: Option<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SessionEventsQuery {
    pub event_type: Option<String>,
    pub zone_name: Option<String>,
}
