use std::sync::Arc;

use chrono::Utc;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use super::IngestError;
use crate::classify::{TrackingBatch, TrackingEvent};
use crate::normalize::parse_timestamp;
use crate::store::{Query, RecordStore, Row, SortOrder, Table};

/// Counts reported back for a batch upload
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BatchOutcome {
    pub total: usize,
    pub processed: usize,
    pub failed: usize,
    /// `processed / total * 100`, 0.0 for an empty batch
    pub success_rate: f64,
}

impl BatchOutcome {
    pub fn new(total: usize, processed: usize) -> Self {
        let success_rate = if total == 0 {
            0.0
        } else {
            processed as f64 / total as f64 * 100.0
        };

        Self {
            total,
            processed,
            failed: total.saturating_sub(processed),
            success_rate,
        }
    }
}

/// Stores tracking events; storage failures are logged, never surfaced
pub struct TrackingService {
    store: Arc<dyn RecordStore>,
}

impl TrackingService {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// Returns whether the event was stored.
    pub async fn log_event(&self, event: &TrackingEvent) -> bool {
        let row = tracking_row(event, &Utc::now().to_rfc3339());

        match self.store.insert_one(Table::TrackingEvents, row).await {
            Ok(_) => {
                debug!(
                    "Logged event: session={}, type={}",
                    event.session_id, event.event_type
                );
                true
            }
            Err(e) => {
                warn!(
                    "Failed to store tracking event for session {} (type={}): {}",
                    event.session_id, event.event_type, e
                );
                false
            }
        }
    }

    /// Store a batch in one insert, retrying row by row when that fails.
    pub async fn log_batch(&self, batch: &TrackingBatch) -> BatchOutcome {
        let total = batch.total();
        if total == 0 {
            warn!("Empty events list for session {}", batch.session_id);
            return BatchOutcome::new(0, 0);
        }

        let received_at = Utc::now().to_rfc3339();
        let rows: Vec<Row> = batch
            .events
            .iter()
            .filter_map(|event| event.as_ref().ok())
            .map(|event| tracking_row(event, &received_at))
            .collect();

        for (index, event) in batch.events.iter().enumerate() {
            if let Err(rejection) = event {
                warn!(
                    "Skipping event {} of batch for session {}: {}",
                    index, batch.session_id, rejection
                );
            }
        }

        let processed = self.insert_with_fallback(&batch.session_id, rows).await;
        let outcome = BatchOutcome::new(total, processed);

        info!(
            "Batch processed for session {}: {}/{} events stored ({:.1}% success rate)",
            batch.session_id, outcome.processed, outcome.total, outcome.success_rate
        );
        outcome
    }

    async fn insert_with_fallback(&self, session_id: &str, rows: Vec<Row>) -> usize {
        if rows.is_empty() {
            return 0;
        }

        let error = match self.store.insert(Table::TrackingEvents, rows.clone()).await {
            Ok(stored) => return stored.len(),
            Err(e) => e,
        };

        if rows.len() == 1 {
            warn!("Failed to store tracking event for session {}: {}", session_id, error);
            return 0;
        }

        warn!(
            "Bulk insert of {} events for session {} failed, storing individually: {}",
            rows.len(),
            session_id,
            error
        );

        let mut stored = 0;
        for row in rows {
            match self.store.insert_one(Table::TrackingEvents, row).await {
                Ok(_) => stored += 1,
                Err(e) => warn!("Dropped tracking event for session {}: {}", session_id, e),
            }
        }
        stored
    }

    /// Events of a session ordered by client timestamp
    pub async fn session_events(
        &self,
        session_id: &str,
        event_type: Option<&str>,
        zone_name: Option<&str>,
    ) -> Result<Vec<Row>, IngestError> {
        let mut query = Query::new().eq("session_id", session_id);
        if let Some(event_type) = event_type {
            query = query.eq("event_type", event_type);
        }
        if let Some(zone_name) = zone_name {
            query = query.eq("zone_name", zone_name);
        }

        let events = self
            .store
            .select(Table::TrackingEvents, &query.order_by("timestamp", SortOrder::Asc))
            .await?;

        debug!("Retrieved {} events for session {}", events.len(), session_id);
        Ok(events)
    }
}

/// Flatten an event into a `tracking_events` row.
///
/// Position and rotation become their own columns; unknown keys join
/// `metadata`, where explicitly sent metadata wins on conflicts.
pub fn tracking_row(event: &TrackingEvent, received_at: &str) -> Row {
    let mut row = Map::new();
    row.insert("session_id".into(), event.session_id.clone().into());
    row.insert("event_type".into(), event.event_type.clone().into());
    row.insert("timestamp".into(), event_timestamp(event.timestamp.as_ref()));
    row.insert("zone_name".into(), event.zone_name.clone().into());
    row.insert("object_name".into(), event.object_name.clone().into());
    row.insert("gaze_target".into(), event.gaze_target.clone().into());
    row.insert("interaction_type".into(), event.interaction_type.clone().into());
    row.insert("dwell_time_ms".into(), event.dwell_time_ms.into());

    let position = event.position.unwrap_or_default();
    row.insert("position_x".into(), position.x.into());
    row.insert("position_y".into(), position.y.into());
    row.insert("position_z".into(), position.z.into());

    let rotation = event.rotation.unwrap_or_default();
    row.insert("rotation_pitch".into(), rotation.pitch.into());
    row.insert("rotation_yaw".into(), rotation.yaw.into());
    row.insert("rotation_roll".into(), rotation.roll.into());

    let mut metadata = event.metadata.clone();
    for (key, value) in &event.extra {
        metadata.entry(key.clone()).or_insert_with(|| value.clone());
    }
    row.insert(
        "metadata".into(),
        if metadata.is_empty() {
            Value::Null
        } else {
            Value::Object(metadata)
        },
    );

    row.insert("received_at".into(), received_at.into());
    row
}

fn event_timestamp(timestamp: Option<&Value>) -> Value {
    match timestamp {
        None | Some(Value::Null) => Value::Null,
        Some(value) => parse_timestamp(value)
            .map(|instant| Value::from(instant.to_rfc3339()))
            .unwrap_or(Value::Null),
    }
}
