use std::sync::Arc;

use chrono::Utc;
use serde_json::{json, Map, Value};
use tracing::{info, warn};

use super::{IngestError, SessionService};
use crate::classify::{classify, ClassificationPolicy, ClassifiedRecord, Payload};
use crate::store::{RecordStore, Row, Table};
use crate::types::{FlexibleEventRequest, FlexibleEventResponse, IngestResponse};

const POI_FALLBACK_EVENT: &str = "POI_Visit";
const VIEW_FALLBACK_EVENT: &str = "View_Change";

/// Universal and flexible event ingestion
///
/// POI and view rows that cannot be written to their own table are retried
/// against `simple_events`. When that fails too the record is dropped with
/// a warning and the client still gets a success response.
pub struct IngestService {
    store: Arc<dyn RecordStore>,
    sessions: Arc<SessionService>,
    policy: ClassificationPolicy,
}

impl IngestService {
    pub fn new(
        store: Arc<dyn RecordStore>,
        sessions: Arc<SessionService>,
        policy: ClassificationPolicy,
    ) -> Self {
        Self {
            store,
            sessions,
            policy,
        }
    }

    pub fn policy(&self) -> ClassificationPolicy {
        self.policy
    }

    /// Classify a payload from the universal endpoint and store it.
    pub async fn ingest(&self, payload: &Payload) -> Result<IngestResponse, IngestError> {
        let received_at = Utc::now().to_rfc3339();
        let record = classify(payload, self.policy);
        info!(
            "Classified payload as {} ({} policy)",
            record.kind(),
            self.policy
        );

        match record {
            ClassifiedRecord::Session(session) => {
                let stored = self.sessions.record_completed_session(&session).await?;

                let mut response = IngestResponse::success(
                    "session",
                    "Session data validated and processed",
                    received_at,
                );
                response.session_id = Some(stored.id);
                response.duration_seconds = Some(session.duration_seconds());
                Ok(response)
            }
            ClassifiedRecord::Poi(poi) => {
                let row = object(json!({
                    "poi_name": poi.poi,
                    "parent_zone": poi.parent,
                    "duration_string": poi.duration,
                    "duration_seconds": poi.duration_seconds,
                    "received_at": received_at,
                }));
                self.store_with_fallback(Table::PoiVisits, row, POI_FALLBACK_EVENT, &received_at)
                    .await;
                info!(
                    "POI received: {}/{} ({}s)",
                    poi.parent, poi.poi, poi.duration_seconds
                );

                let mut response =
                    IngestResponse::success("poi", "POI data validated and received", received_at);
                response.poi = Some(poi.poi);
                response.parent = Some(poi.parent);
                response.duration = Some(poi.duration);
                response.duration_seconds = Some(i64::from(poi.duration_seconds));
                Ok(response)
            }
            ClassifiedRecord::View(view) => {
                let row = object(json!({
                    "view_name": view.view,
                    "duration_string": view.duration,
                    "duration_seconds": view.duration_seconds,
                    "received_at": received_at,
                }));
                self.store_with_fallback(
                    Table::ViewEvents,
                    row,
                    VIEW_FALLBACK_EVENT,
                    &received_at,
                )
                .await;
                info!("View received: {} ({}s)", view.view, view.duration_seconds);

                let mut response = IngestResponse::success(
                    "view",
                    "View data validated and received",
                    received_at,
                );
                response.view = Some(view.view);
                response.duration = Some(view.duration);
                response.duration_seconds = Some(i64::from(view.duration_seconds));
                Ok(response)
            }
            ClassifiedRecord::Generic(event) => {
                let session_id = event
                    .payload
                    .get("session_id")
                    .and_then(Value::as_str)
                    .map(str::to_string);
                let row = simple_event_row(
                    &event.event_type,
                    session_id,
                    Value::Object(event.payload),
                    &received_at,
                );
                self.store_simple_event(row).await;

                let mut response =
                    IngestResponse::success("generic", "Event received", received_at);
                response.event_type = Some(event.event_type);
                Ok(response)
            }
            ClassifiedRecord::Rejected(rejection) => {
                warn!("Rejected payload: {}", rejection);
                Err(rejection.into())
            }
            ClassifiedRecord::TrackingEvent(_) | ClassifiedRecord::TrackingBatch(_) => {
                Err(IngestError::Validation(
                    "tracking events are accepted on the tracking endpoints".to_string(),
                ))
            }
        }
    }

    /// Store any client event in `simple_events`; failures are only logged.
    pub async fn record_flexible_event(
        &self,
        request: FlexibleEventRequest,
    ) -> FlexibleEventResponse {
        let received_at = Utc::now().to_rfc3339();

        let timestamp = match request.timestamp {
            None | Some(Value::Null) => Value::Null,
            Some(Value::String(text)) => Value::String(text),
            Some(other) => Value::String(other.to_string()),
        };
        let mut data = Map::new();
        data.insert("timestamp".to_string(), timestamp);
        data.extend(request.extra);

        let row = simple_event_row(
            &request.event_type,
            request.session_id,
            Value::Object(data),
            &received_at,
        );
        self.store_simple_event(row).await;

        FlexibleEventResponse {
            status: "received".to_string(),
            event_type: request.event_type,
            timestamp: received_at,
        }
    }

    /// Returns the table the row ended up in, if any.
    async fn store_with_fallback(
        &self,
        table: Table,
        row: Row,
        fallback_event_type: &str,
        received_at: &str,
    ) -> Option<Table> {
        let error = match self.store.insert_one(table, row.clone()).await {
            Ok(_) => return Some(table),
            Err(e) => e,
        };
        warn!("Could not store row in {}: {}", table, error);

        let fallback = simple_event_row(fallback_event_type, None, Value::Object(row), received_at);
        match self.store.insert_one(Table::SimpleEvents, fallback).await {
            Ok(_) => {
                info!("Stored {} in simple_events (fallback)", fallback_event_type);
                Some(Table::SimpleEvents)
            }
            Err(e) => {
                warn!("Fallback storage also failed: {}", e);
                None
            }
        }
    }

    async fn store_simple_event(&self, row: Row) -> bool {
        match self.store.insert_one(Table::SimpleEvents, row).await {
            Ok(_) => true,
            Err(e) => {
                warn!("Could not store event in simple_events: {}", e);
                false
            }
        }
    }
}

fn simple_event_row(
    event_type: &str,
    session_id: Option<String>,
    data: Value,
    received_at: &str,
) -> Row {
    object(json!({
        "event_type": event_type,
        "session_id": session_id,
        "received_at": received_at,
        "data": data,
    }))
}

fn object(value: Value) -> Row {
    match value {
        Value::Object(row) => row,
        _ => Row::new(),
    }
}
