use std::sync::Arc;

use chrono::Utc;
use nexero_core::{generate_id, UtcDateTime};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, error, info, warn};

use super::IngestError;
use crate::classify::SessionRecord;
use crate::store::{Query, RecordStore, Row, Table};
use crate::types::{HeartbeatResponse, SessionResponse, SessionStatusResponse};

const STATUS_ACTIVE: &str = "active";
const STATUS_COMPLETED: &str = "completed";

/// A row of `vr_sessions`
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct VrSession {
    pub id: String,
    pub started_at: UtcDateTime,
    pub ended_at: Option<UtcDateTime>,
    pub duration_seconds: Option<i64>,
    pub status: String,
    pub customer_id: Option<String>,
    pub property_id: Option<String>,
}

impl VrSession {
    fn from_row(row: Row) -> Result<Self, IngestError> {
        serde_json::from_value(Value::Object(row)).map_err(|e| IngestError::Decode(e.to_string()))
    }

    pub fn is_active(&self) -> bool {
        self.status == STATUS_ACTIVE
    }
}

impl From<VrSession> for SessionResponse {
    fn from(session: VrSession) -> Self {
        Self {
            session_id: session.id,
            status: session.status,
            started_at: session.started_at.to_rfc3339(),
            ended_at: session.ended_at.map(|at| at.to_rfc3339()),
            duration_seconds: session.duration_seconds,
            customer_id: session.customer_id,
            property_id: session.property_id,
        }
    }
}

/// Session lifecycle on top of the `vr_sessions` table
///
/// No state machine is enforced: a session can be ended without having
/// been started through this service, as long as its row exists.
pub struct SessionService {
    store: Arc<dyn RecordStore>,
}

impl SessionService {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// Store a session the client reports after the fact, already completed.
    pub async fn record_completed_session(
        &self,
        record: &SessionRecord,
    ) -> Result<VrSession, IngestError> {
        let session_id = generate_id().to_string();
        let duration_seconds = record.duration_seconds();

        let row = session_row(json!({
            "id": session_id,
            "started_at": record.started_at.to_rfc3339(),
            "ended_at": record.ended_at.to_rfc3339(),
            "duration_seconds": duration_seconds,
            "status": STATUS_COMPLETED,
            "customer_id": record.customer_id,
            "property_id": record.property_id,
        }));

        let stored = self
            .store
            .insert_one(Table::VrSessions, row)
            .await
            .map_err(|e| {
                error!("Failed to store session {}: {}", session_id, e);
                e
            })?;

        info!(
            "Recorded completed session {}: duration={}s",
            session_id, duration_seconds
        );
        VrSession::from_row(stored)
    }

    pub async fn start_session(
        &self,
        customer_id: Option<String>,
        property_id: Option<String>,
    ) -> Result<VrSession, IngestError> {
        let session_id = generate_id().to_string();

        let row = session_row(json!({
            "id": session_id,
            "started_at": Utc::now().to_rfc3339(),
            "status": STATUS_ACTIVE,
            "customer_id": customer_id,
            "property_id": property_id,
        }));

        let stored = self.store.insert_one(Table::VrSessions, row).await?;
        info!(
            "Started session {} for customer={:?}, property={:?}",
            session_id, customer_id, property_id
        );
        VrSession::from_row(stored)
    }

    /// Mark a session completed, computing its duration from `started_at`.
    pub async fn end_session(
        &self,
        session_id: &str,
        ended_at: Option<UtcDateTime>,
    ) -> Result<VrSession, IngestError> {
        let session = self
            .get_session(session_id)
            .await?
            .ok_or_else(|| IngestError::SessionNotFound(session_id.to_string()))?;

        let ended_at = ended_at.unwrap_or_else(Utc::now);
        let duration_seconds = (ended_at - session.started_at).num_seconds();

        let updated = self
            .store
            .update(
                Table::VrSessions,
                &Query::new().eq("id", session_id),
                session_row(json!({
                    "ended_at": ended_at.to_rfc3339(),
                    "duration_seconds": duration_seconds,
                    "status": STATUS_COMPLETED,
                })),
            )
            .await?;

        let row = updated
            .into_iter()
            .next()
            .ok_or_else(|| IngestError::SessionNotFound(session_id.to_string()))?;

        info!(
            "Ended session {}: duration={}s, status=completed",
            session_id, duration_seconds
        );
        VrSession::from_row(row)
    }

    pub async fn get_session(&self, session_id: &str) -> Result<Option<VrSession>, IngestError> {
        let rows = self
            .store
            .select(Table::VrSessions, &Query::new().eq("id", session_id).limit(1))
            .await?;

        match rows.into_iter().next() {
            Some(row) => {
                debug!("Retrieved session {}", session_id);
                VrSession::from_row(row).map(Some)
            }
            None => {
                warn!("Session not found: {}", session_id);
                Ok(None)
            }
        }
    }

    /// Status report; unknown sessions are reported, not treated as errors.
    pub async fn session_status(
        &self,
        session_id: &str,
    ) -> Result<SessionStatusResponse, IngestError> {
        let Some(session) = self.get_session(session_id).await? else {
            return Ok(SessionStatusResponse {
                session_id: session_id.to_string(),
                status: "not_found".to_string(),
                started_at: None,
                duration_so_far: None,
                ended_at: None,
                duration_seconds: None,
            });
        };

        let duration_so_far = session
            .is_active()
            .then(|| (Utc::now() - session.started_at).num_seconds());

        let (ended_at, duration_seconds) = match session.ended_at {
            Some(ended_at) => (Some(ended_at.to_rfc3339()), session.duration_seconds),
            None => (None, None),
        };

        Ok(SessionStatusResponse {
            session_id: session.id,
            status: session.status,
            started_at: Some(session.started_at.to_rfc3339()),
            duration_so_far,
            ended_at,
            duration_seconds,
        })
    }

    pub async fn heartbeat(&self, session_id: &str) -> Result<HeartbeatResponse, IngestError> {
        debug!("Heartbeat received for session {}", session_id);
        if self.get_session(session_id).await?.is_none() {
            return Err(IngestError::SessionNotFound(session_id.to_string()));
        }

        Ok(HeartbeatResponse {
            status: "alive".to_string(),
            session_id: session_id.to_string(),
            timestamp: Utc::now().to_rfc3339(),
        })
    }
}

fn session_row(value: Value) -> Row {
    match value {
        Value::Object(row) => row,
        _ => Row::new(),
    }
}
