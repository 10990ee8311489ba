use std::sync::Arc;

use axum::{extract::State, response::Json, routing::get, Router};
use chrono::Utc;
use tracing::warn;

use super::AppState;
use crate::store::{Query, Table};
use crate::types::{HealthResponse, ServiceInfoResponse};

const SERVICE_NAME: &str = "Nexero VR Backend";

/// Health report including a database round trip
///
/// Always answers 200; a failing database shows up as `database: "error"`.
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service health", body = HealthResponse)
    ),
    tag = "Health"
)]
pub async fn get_health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let database = match state
        .store
        .select(Table::VrSessions, &Query::new().limit(1))
        .await
    {
        Ok(_) => "connected",
        Err(e) => {
            warn!("Health check database query failed: {}", e);
            "error"
        }
    };

    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: Utc::now().to_rfc3339(),
        environment: state.environment.clone(),
        database: database.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

#[utoipa::path(
    get,
    path = "/",
    responses(
        (status = 200, description = "Service information", body = ServiceInfoResponse)
    ),
    tag = "Health"
)]
pub async fn get_service_info() -> Json<ServiceInfoResponse> {
    Json(ServiceInfoResponse {
        service: SERVICE_NAME.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        status: "running".to_string(),
        docs: "/docs".to_string(),
        health: "/health".to_string(),
    })
}

pub fn configure_root_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(get_service_info))
        .route("/health", get(get_health))
}
