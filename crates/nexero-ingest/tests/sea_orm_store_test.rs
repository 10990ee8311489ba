use std::sync::Arc;

use axum::body::Body;
use axum::http::{header::CONTENT_TYPE, Request, StatusCode};
use axum::Router;
use chrono::{DateTime, Utc};
use http_body_util::BodyExt;
use nexero_core::plugin::PluginManager;
use nexero_database::test_utils::TestDatabase;
use nexero_ingest::store::{Query, Row, SortOrder, StoreError};
use nexero_ingest::{IngestPlugin, RecordStore, SeaOrmRecordStore, Table};
use serde_json::{json, Value};
use tower::ServiceExt;

fn row(value: Value) -> Row {
    value.as_object().cloned().unwrap()
}

fn instant(value: &Value) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value.as_str().unwrap())
        .unwrap()
        .with_timezone(&Utc)
}

async fn app(test_db: &TestDatabase) -> Router {
    let mut manager = PluginManager::new();
    manager
        .service_context()
        .register_service(test_db.connection());
    manager.register_plugin(Box::new(IngestPlugin::default()));
    manager.initialize_plugins().await.unwrap();
    manager.build_application().unwrap()
}

async fn post(app: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header(CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn test_insert_select_and_update() -> anyhow::Result<()> {
    let test_db = TestDatabase::new().await?;
    let store = SeaOrmRecordStore::new(test_db.connection());

    let inserted = store
        .insert(
            Table::PoiVisits,
            vec![
                row(json!({
                    "poi_name": "Kitchen",
                    "parent_zone": "Unit_A",
                    "duration_string": "0:45",
                    "duration_seconds": 45,
                    "received_at": "2024-01-15T14:30:00+00:00"
                })),
                row(json!({
                    "poi_name": "Bedroom",
                    "parent_zone": "Unit_A",
                    "duration_string": "1:10",
                    "duration_seconds": 70,
                    "received_at": "2024-01-15T14:31:00+00:00"
                })),
            ],
        )
        .await?;
    assert_eq!(inserted.len(), 2);
    assert_ne!(inserted[0]["id"], inserted[1]["id"]);

    let longest = store
        .select(
            Table::PoiVisits,
            &Query::new()
                .eq("parent_zone", "Unit_A")
                .order_by("duration_seconds", SortOrder::Desc)
                .limit(1),
        )
        .await?;
    assert_eq!(longest.len(), 1);
    assert_eq!(longest[0]["poi_name"], "Bedroom");

    let updated = store
        .update(
            Table::PoiVisits,
            &Query::new().eq("poi_name", "Kitchen"),
            row(json!({"duration_seconds": 50, "duration_string": "0:50"})),
        )
        .await?;
    assert_eq!(updated.len(), 1);
    assert_eq!(updated[0]["duration_seconds"], 50);
    assert_eq!(updated[0]["id"], inserted[0]["id"]);

    Ok(())
}

#[tokio::test]
async fn test_text_keyed_sessions() -> anyhow::Result<()> {
    let test_db = TestDatabase::new().await?;
    let store = SeaOrmRecordStore::new(test_db.connection());

    store
        .insert_one(
            Table::VrSessions,
            row(json!({
                "id": "session-1",
                "started_at": "2023-11-14T22:13:20+00:00",
                "status": "active"
            })),
        )
        .await?;

    let updated = store
        .update(
            Table::VrSessions,
            &Query::new().eq("id", "session-1"),
            row(json!({
                "ended_at": "2023-11-14T22:18:20+00:00",
                "duration_seconds": 300,
                "status": "completed"
            })),
        )
        .await?;

    assert_eq!(updated[0]["status"], "completed");
    assert_eq!(updated[0]["duration_seconds"], 300);
    assert_eq!(
        instant(&updated[0]["ended_at"]),
        instant(&json!("2023-11-14T22:18:20+00:00"))
    );

    let active = store
        .select(Table::VrSessions, &Query::new().eq("status", "active"))
        .await?;
    assert!(active.is_empty());

    Ok(())
}

#[tokio::test]
async fn test_bulk_insert_is_atomic() -> anyhow::Result<()> {
    let test_db = TestDatabase::new().await?;
    let store = SeaOrmRecordStore::new(test_db.connection());

    let result = store
        .insert(
            Table::SimpleEvents,
            vec![
                row(json!({"event_type": "ok", "received_at": "2024-01-15T14:30:00Z"})),
                row(json!({"event_type": "broken", "received_at": "not a time"})),
            ],
        )
        .await;
    assert!(result.is_err());

    let rows = store.select(Table::SimpleEvents, &Query::new()).await?;
    assert!(rows.is_empty());

    Ok(())
}

#[tokio::test]
async fn test_unknown_column() -> anyhow::Result<()> {
    let test_db = TestDatabase::new().await?;
    let store = SeaOrmRecordStore::new(test_db.connection());

    let err = store
        .select(Table::ViewEvents, &Query::new().eq("colour", "red"))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::UnknownColumn { ref column, .. } if column == "colour"));

    Ok(())
}

#[tokio::test]
async fn test_universal_endpoint_against_sqlite() -> anyhow::Result<()> {
    let test_db = TestDatabase::new().await?;
    let app = app(&test_db).await;

    let (status, body) = post(
        &app,
        "/api/v1/unreal/session",
        json!({"session_start": 1700000000, "session_end": 1700000300, "customer_id": "c1"}),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let store = SeaOrmRecordStore::new(test_db.connection());
    let sessions = store
        .select(
            Table::VrSessions,
            &Query::new().eq("id", body["session_id"].clone()),
        )
        .await?;
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0]["duration_seconds"], 300);
    assert_eq!(sessions[0]["status"], "completed");
    assert_eq!(
        instant(&sessions[0]["started_at"]),
        instant(&json!("2023-11-14T22:13:20+00:00"))
    );

    let (status, _) = post(
        &app,
        "/api/v1/unreal/session",
        json!({"View": "Balcony", "TotalDuration": "2:05"}),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let views = store.select(Table::ViewEvents, &Query::new()).await?;
    assert_eq!(views[0]["duration_seconds"], 125);

    Ok(())
}

#[tokio::test]
async fn test_poi_falls_back_when_table_is_missing() -> anyhow::Result<()> {
    let test_db = TestDatabase::new().await?;
    let app = app(&test_db).await;
    test_db.drop_table("poi_visits").await?;

    let (status, body) = post(
        &app,
        "/api/v1/unreal/session",
        json!({"Parent": "Unit_A", "POI": "Kitchen", "POI_Duration": "0:45"}),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["duration_seconds"], 45);

    let store = SeaOrmRecordStore::new(test_db.connection());
    let fallback = store
        .select(
            Table::SimpleEvents,
            &Query::new().eq("event_type", "POI_Visit"),
        )
        .await?;
    assert_eq!(fallback.len(), 1);
    assert_eq!(fallback[0]["data"]["poi_name"], "Kitchen");
    assert_eq!(fallback[0]["data"]["duration_seconds"], 45);

    Ok(())
}

#[tokio::test]
async fn test_batch_skips_event_with_unparseable_timestamp() -> anyhow::Result<()> {
    let test_db = TestDatabase::new().await?;
    let app = app(&test_db).await;

    let (status, body) = post(
        &app,
        "/api/v1/unreal/tracking/batch",
        json!({
            "session_id": "s-1",
            "events": [
                {"event_type": "gaze", "timestamp": 1700000000, "gaze_target": "Fireplace"},
                {"event_type": "gaze", "timestamp": "yesterday"},
                {"event_type": "zone_enter", "timestamp": "2023-11-14T22:15:00Z", "zone_name": "Kitchen"}
            ]
        }),
    )
    .await;

    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["total_events"], 3);
    assert_eq!(body["processed"], 2);
    assert_eq!(body["failed"], 1);

    let store = SeaOrmRecordStore::new(test_db.connection());
    let events = store
        .select(
            Table::TrackingEvents,
            &Query::new()
                .eq("session_id", "s-1")
                .order_by("timestamp", SortOrder::Asc),
        )
        .await?;
    assert_eq!(events.len(), 2);
    assert_eq!(events[0]["gaze_target"], "Fireplace");
    assert_eq!(events[1]["zone_name"], "Kitchen");

    Ok(())
}
