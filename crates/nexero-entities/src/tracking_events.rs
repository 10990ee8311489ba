use nexero_core::DBDateTime;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "tracking_events")]
pub struct Model {
    #[sea_orm(primary_key)]
    #[serde(skip_deserializing)]
    pub id: i32,
    pub session_id: String,
    pub event_type: String,
    /// Client-side instant of the event
    pub timestamp: Option<DBDateTime>,
    pub zone_name: Option<String>,
    pub object_name: Option<String>,
    pub gaze_target: Option<String>,
    pub interaction_type: Option<String>,
    pub dwell_time_ms: Option<i64>,
    pub position_x: Option<f64>,
    pub position_y: Option<f64>,
    pub position_z: Option<f64>,
    pub rotation_pitch: Option<f64>,
    pub rotation_yaw: Option<f64>,
    pub rotation_roll: Option<f64>,
    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub metadata: Option<Json>,
    pub received_at: DBDateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
