use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use chrono::Utc;
use nexero_core::error_builder::bad_request;
use nexero_core::problemdetails::Problem;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::{ingest_problem, json_problem, rejection_problem, AppState};
use crate::classify::{Payload, Rejection, TrackingBatch, TrackingEvent};
use crate::normalize::parse_timestamp;
use crate::types::{
    EndSessionRequest, FlexibleEventRequest, FlexibleEventResponse, HeartbeatResponse,
    IngestResponse, SessionEventsQuery, SessionEventsResponse, SessionResponse,
    SessionStatusResponse, StartSessionRequest, TrackingBatchRequest, TrackingBatchResponse,
    TrackingEventRequest, TrackingEventResponse,
};

/// Universal endpoint: sessions, POI visits and view changes
///
/// The payload kind is inferred from its keys. Sessions need
/// `session_start` and `session_end`, POI visits `Parent` and
/// `POI_Duration`, view changes `View` and `TotalDuration`.
#[utoipa::path(
    post,
    path = "/api/v1/unreal/session",
    request_body(content = Object, description = "Session, POI or view payload", example = json!({
        "Parent": "Unit_A",
        "POI": "Kitchen",
        "POI_Duration": "0:45"
    })),
    responses(
        (status = 201, description = "Payload classified and stored", body = IngestResponse),
        (status = 400, description = "Unknown data type or invalid field", body = nexero_core::ProblemDetails),
        (status = 422, description = "Body is not a JSON object", body = nexero_core::ProblemDetails),
        (status = 500, description = "Session could not be stored", body = nexero_core::ProblemDetails)
    ),
    tag = "Unreal"
)]
pub async fn ingest_payload(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<Payload>, JsonRejection>,
) -> Result<(StatusCode, Json<IngestResponse>), Problem> {
    let Json(payload) = payload.map_err(json_problem)?;

    let response = state
        .ingest_service
        .ingest(&payload)
        .await
        .map_err(ingest_problem)?;

    Ok((StatusCode::CREATED, Json(response)))
}

/// Record a single tracking event
///
/// Storage failures are logged and the event is still reported as received.
#[utoipa::path(
    post,
    path = "/api/v1/unreal/tracking/event",
    request_body = TrackingEventRequest,
    responses(
        (status = 202, description = "Event received", body = TrackingEventResponse),
        (status = 400, description = "session_id is missing", body = nexero_core::ProblemDetails),
        (status = 422, description = "Malformed event", body = nexero_core::ProblemDetails)
    ),
    tag = "Unreal"
)]
pub async fn record_tracking_event(
    State(state): State<Arc<AppState>>,
    request: Result<Json<TrackingEventRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<TrackingEventResponse>), Problem> {
    let Json(request) = request.map_err(json_problem)?;
    match TrackingEvent::from_request(request, None) {
        Ok(event) => {
            state.tracking_service.log_event(&event).await;
        }
        // an event whose timestamp cannot be stored is dropped like any other storage failure
        Err(Rejection::InvalidField { field, .. }) if field == "timestamp" => {
            warn!("Dropping tracking event with unparseable timestamp");
        }
        Err(rejection) => return Err(rejection_problem(rejection)),
    }

    Ok((
        StatusCode::ACCEPTED,
        Json(TrackingEventResponse {
            status: "received".to_string(),
            timestamp: Utc::now().to_rfc3339(),
        }),
    ))
}

/// Record a batch of tracking events
///
/// Entries are stored independently. Malformed or unstorable entries are
/// counted as failed and never fail the batch.
#[utoipa::path(
    post,
    path = "/api/v1/unreal/tracking/batch",
    request_body = TrackingBatchRequest,
    responses(
        (status = 202, description = "Batch processed", body = TrackingBatchResponse),
        (status = 400, description = "session_id is missing", body = nexero_core::ProblemDetails),
        (status = 422, description = "Malformed batch", body = nexero_core::ProblemDetails)
    ),
    tag = "Unreal"
)]
pub async fn record_tracking_batch(
    State(state): State<Arc<AppState>>,
    request: Result<Json<TrackingBatchRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<TrackingBatchResponse>), Problem> {
    let Json(request) = request.map_err(json_problem)?;
    let batch = TrackingBatch::from_request(request).map_err(rejection_problem)?;

    let outcome = state.tracking_service.log_batch(&batch).await;

    Ok((
        StatusCode::ACCEPTED,
        Json(TrackingBatchResponse {
            status: "received".to_string(),
            total_events: outcome.total,
            processed: outcome.processed,
            failed: outcome.failed,
            success_rate: outcome.success_rate,
            timestamp: Utc::now().to_rfc3339(),
        }),
    ))
}

/// Record any event carrying an `event_type`
#[utoipa::path(
    post,
    path = "/api/v1/unreal/event",
    request_body = FlexibleEventRequest,
    responses(
        (status = 201, description = "Event received", body = FlexibleEventResponse),
        (status = 422, description = "event_type is missing", body = nexero_core::ProblemDetails)
    ),
    tag = "Unreal"
)]
pub async fn record_flexible_event(
    State(state): State<Arc<AppState>>,
    request: Result<Json<FlexibleEventRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<FlexibleEventResponse>), Problem> {
    let Json(request) = request.map_err(json_problem)?;
    info!("Flexible event received: {}", request.event_type);

    let response = state.ingest_service.record_flexible_event(request).await;

    Ok((StatusCode::CREATED, Json(response)))
}

/// Open an active session
#[utoipa::path(
    post,
    path = "/api/v1/unreal/session/start",
    request_body(content = StartSessionRequest, description = "Optional customer and property"),
    responses(
        (status = 201, description = "Session started", body = SessionResponse),
        (status = 500, description = "Session could not be stored", body = nexero_core::ProblemDetails)
    ),
    tag = "Sessions"
)]
pub async fn start_session(
    State(state): State<Arc<AppState>>,
    request: Option<Json<StartSessionRequest>>,
) -> Result<(StatusCode, Json<SessionResponse>), Problem> {
    let request = request.map(|Json(request)| request).unwrap_or_default();

    let session = state
        .session_service
        .start_session(request.customer_id, request.property_id)
        .await
        .map_err(ingest_problem)?;

    Ok((StatusCode::CREATED, Json(session.into())))
}

/// Complete a session and compute its duration
#[utoipa::path(
    post,
    path = "/api/v1/unreal/session/{session_id}/end",
    params(
        ("session_id" = String, Path, description = "Session ID")
    ),
    request_body(content = EndSessionRequest, description = "Optional end time"),
    responses(
        (status = 200, description = "Session completed", body = SessionResponse),
        (status = 400, description = "ended_at is not a timestamp", body = nexero_core::ProblemDetails),
        (status = 404, description = "Session not found", body = nexero_core::ProblemDetails),
        (status = 500, description = "Internal server error", body = nexero_core::ProblemDetails)
    ),
    tag = "Sessions"
)]
pub async fn end_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    request: Option<Json<EndSessionRequest>>,
) -> Result<Json<SessionResponse>, Problem> {
    let request = request.map(|Json(request)| request).unwrap_or_default();

    let ended_at = match request.ended_at {
        None | Some(Value::Null) => None,
        Some(value) => Some(parse_timestamp(&value).ok_or_else(|| {
            bad_request()
                .title("Invalid data format")
                .detail("ended_at must be epoch seconds or an ISO 8601 timestamp")
                .value("field", "ended_at")
                .build()
        })?),
    };

    let session = state
        .session_service
        .end_session(&session_id, ended_at)
        .await
        .map_err(ingest_problem)?;

    Ok(Json(session.into()))
}

/// Report whether a session is active, completed or unknown
#[utoipa::path(
    get,
    path = "/api/v1/unreal/session/{session_id}/status",
    params(
        ("session_id" = String, Path, description = "Session ID")
    ),
    responses(
        (status = 200, description = "Session status", body = SessionStatusResponse),
        (status = 500, description = "Internal server error", body = nexero_core::ProblemDetails)
    ),
    tag = "Sessions"
)]
pub async fn get_session_status(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<Json<SessionStatusResponse>, Problem> {
    let status = state
        .session_service
        .session_status(&session_id)
        .await
        .map_err(ingest_problem)?;

    Ok(Json(status))
}

#[utoipa::path(
    post,
    path = "/api/v1/unreal/session/{session_id}/heartbeat",
    params(
        ("session_id" = String, Path, description = "Session ID")
    ),
    responses(
        (status = 200, description = "Session is known", body = HeartbeatResponse),
        (status = 404, description = "Session not found", body = nexero_core::ProblemDetails),
        (status = 500, description = "Internal server error", body = nexero_core::ProblemDetails)
    ),
    tag = "Sessions"
)]
pub async fn session_heartbeat(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<Json<HeartbeatResponse>, Problem> {
    let heartbeat = state
        .session_service
        .heartbeat(&session_id)
        .await
        .map_err(ingest_problem)?;

    Ok(Json(heartbeat))
}

/// List a session's tracking events ordered by timestamp
#[utoipa::path(
    get,
    path = "/api/v1/unreal/session/{session_id}/events",
    params(
        ("session_id" = String, Path, description = "Session ID"),
        ("event_type" = Option<String>, Query, description = "Only events of this type"),
        ("zone_name" = Option<String>, Query, description = "Only events in this zone")
    ),
    responses(
        (status = 200, description = "Tracking events of the session", body = SessionEventsResponse),
        (status = 500, description = "Internal server error", body = nexero_core::ProblemDetails)
    ),
    tag = "Sessions"
)]
pub async fn get_session_events(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    Query(query): Query<SessionEventsQuery>,
) -> Result<Json<SessionEventsResponse>, Problem> {
    let rows = state
        .tracking_service
        .session_events(
            &session_id,
            query.event_type.as_deref(),
            query.zone_name.as_deref(),
        )
        .await
        .map_err(ingest_problem)?;

    debug!("Found {} events for session {}", rows.len(), session_id);
    let events: Vec<Value> = rows.into_iter().map(Value::Object).collect();

    Ok(Json(SessionEventsResponse {
        session_id,
        count: events.len(),
        events,
    }))
}

pub fn configure_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/v1/unreal/session", post(ingest_payload))
        .route("/v1/unreal/session/start", post(start_session))
        .route("/v1/unreal/session/{session_id}/end", post(end_session))
        .route(
            "/v1/unreal/session/{session_id}/status",
            get(get_session_status),
        )
        .route(
            "/v1/unreal/session/{session_id}/heartbeat",
            post(session_heartbeat),
        )
        .route(
            "/v1/unreal/session/{session_id}/events",
            get(get_session_events),
        )
        .route("/v1/unreal/tracking/event", post(record_tracking_event))
        .route("/v1/unreal/tracking/batch", post(record_tracking_batch))
        .route("/v1/unreal/event", post(record_flexible_event))
}
