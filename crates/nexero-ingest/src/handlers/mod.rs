mod health_handler;
mod unreal_handler;

pub use health_handler::{configure_root_routes, get_health, get_service_info};
pub use unreal_handler::{
    configure_routes, end_session, get_session_events, get_session_status, ingest_payload,
    record_flexible_event, record_tracking_batch, record_tracking_event, session_heartbeat,
    start_session,
};

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use nexero_core::error_builder::{bad_request, internal_server_error, not_found, ErrorBuilder};
use nexero_core::problemdetails::Problem;
use tracing::{error, warn};

use crate::classify::{Rejection, UNKNOWN_SHAPE_DETAIL};
use crate::services::{IngestError, IngestService, SessionService, TrackingService};
use crate::store::RecordStore;
use crate::types::*;

pub struct AppState {
    pub ingest_service: Arc<IngestService>,
    pub session_service: Arc<SessionService>,
    pub tracking_service: Arc<TrackingService>,
    pub store: Arc<dyn RecordStore>,
    pub environment: String,
}

/// Problem document for a failed service call
pub(crate) fn ingest_problem(err: IngestError) -> Problem {
    match err {
        IngestError::Rejected(rejection) => rejection_problem(rejection),
        IngestError::SessionNotFound(session_id) => not_found()
            .title("Session not found")
            .detail(format!("No session with id {}", session_id))
            .value("session_id", session_id)
            .build(),
        IngestError::Validation(message) => bad_request()
            .title("Invalid data format")
            .detail(message)
            .build(),
        e @ (IngestError::Store(_) | IngestError::Decode(_)) => {
            error!("Request failed: {}", e);
            internal_server_error()
                .detail(format!("Error: {}", e))
                .build()
        }
    }
}

pub(crate) fn rejection_problem(rejection: Rejection) -> Problem {
    match rejection {
        Rejection::UnknownShape { received_keys } => bad_request()
            .title("Unknown data type")
            .detail(UNKNOWN_SHAPE_DETAIL)
            .value("received_keys", received_keys)
            .build(),
        Rejection::InvalidField { ref field, .. } => bad_request()
            .title("Invalid data format")
            .detail(rejection.to_string())
            .value("field", field)
            .build(),
        Rejection::MissingField { field } => bad_request()
            .title(format!("{} is required", field))
            .detail(rejection.to_string())
            .value("field", field)
            .build(),
    }
}

/// Mirror the JSON extractor's status in a problem document
pub(crate) fn json_problem(rejection: JsonRejection) -> Problem {
    warn!("Malformed request body: {}", rejection.body_text());
    let status = rejection.status();
    let title = if status == StatusCode::UNPROCESSABLE_ENTITY {
        "Invalid data format"
    } else {
        "Malformed request body"
    };
    ErrorBuilder::new(status)
        .type_("/probs/malformed-body")
        .title(title)
        .detail(rejection.body_text())
        .build()
}

#[derive(utoipa::OpenApi)]
#[openapi(
    paths(
        unreal_handler::ingest_payload,
        unreal_handler::record_tracking_event,
        unreal_handler::record_tracking_batch,
        unreal_handler::record_flexible_event,
        unreal_handler::start_session,
        unreal_handler::end_session,
        unreal_handler::get_session_status,
        unreal_handler::session_heartbeat,
        unreal_handler::get_session_events,
        health_handler::get_health,
        health_handler::get_service_info,
    ),
    components(
        schemas(
            Position,
            Rotation,
            TrackingEventRequest,
            TrackingBatchRequest,
            FlexibleEventRequest,
            StartSessionRequest,
            EndSessionRequest,
            IngestResponse,
            TrackingEventResponse,
            TrackingBatchResponse,
            FlexibleEventResponse,
            SessionResponse,
            SessionStatusResponse,
            HeartbeatResponse,
            SessionEventsResponse,
            HealthResponse,
            ServiceInfoResponse,
            nexero_core::ProblemDetails,
        )
    ),
    tags(
        (name = "Unreal", description = "Data sent by Unreal Engine VR tours"),
        (name = "Sessions", description = "VR session lifecycle"),
        (name = "Health", description = "Service health and information")
    )
)]
pub struct IngestApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    fn body(problem: &Problem) -> &std::collections::BTreeMap<String, serde_json::Value> {
        &problem.body
    }

    #[test]
    fn test_unknown_shape_problem() {
        let problem = rejection_problem(Rejection::UnknownShape {
            received_keys: vec!["random_field".to_string()],
        });

        assert_eq!(problem.status_code, StatusCode::BAD_REQUEST);
        assert_eq!(body(&problem)["title"], "Unknown data type");
        assert_eq!(body(&problem)["detail"], UNKNOWN_SHAPE_DETAIL);
        assert_eq!(
            body(&problem)["received_keys"],
            serde_json::json!(["random_field"])
        );
        assert!(body(&problem).contains_key("timestamp"));
    }

    #[test]
    fn test_missing_field_problem() {
        let problem = rejection_problem(Rejection::MissingField { field: "session_id" });
        assert_eq!(problem.status_code, StatusCode::BAD_REQUEST);
        assert_eq!(body(&problem)["title"], "session_id is required");
    }

    #[test]
    fn test_service_errors_map_to_statuses() {
        let not_found = ingest_problem(IngestError::SessionNotFound("s-1".to_string()));
        assert_eq!(not_found.status_code, StatusCode::NOT_FOUND);

        let decode = ingest_problem(IngestError::Decode("bad row".to_string()));
        assert_eq!(decode.status_code, StatusCode::INTERNAL_SERVER_ERROR);
    }
}
