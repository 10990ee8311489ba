use std::any::Any;
use std::sync::Arc;
use std::time::Duration;

use axum::http::Method;
use axum::response::{IntoResponse, Response};
use axum::Router;
use nexero_config::ServerConfig;
use nexero_core::error_builder::internal_server_error;
use nexero_core::plugin::PluginManager;
use nexero_database::DbConnection;
use nexero_ingest::{ClassificationPolicy, IngestPlugin, IngestSettings};
use tokio::net::TcpListener;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{AllowOrigin, Any as AnyHeaders, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info};
use utoipa_swagger_ui::SwaggerUi;

use super::shutdown::ShutdownSignal;

const CLEANUP_TIMEOUT: Duration = Duration::from_secs(10);

fn create_swagger_router(plugin_manager: &PluginManager) -> anyhow::Result<Router> {
    let api_doc = plugin_manager
        .get_unified_openapi()
        .map_err(|e| anyhow::anyhow!("Failed to build unified OpenAPI schema: {}", e))?;
    Ok(Router::new().merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", api_doc)))
}

fn build_cors_layer(config: &ServerConfig) -> CorsLayer {
    let allow_origin = if config.allows_any_origin() {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(
            config
                .cors_origins
                .iter()
                .filter_map(|origin| origin.parse().ok()),
        )
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(AnyHeaders)
        .max_age(Duration::from_secs(3600))
}

/// Panics inside handlers become a 500 problem document
fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(message) = err.downcast_ref::<String>() {
        message.clone()
    } else if let Some(message) = err.downcast_ref::<&str>() {
        message.to_string()
    } else {
        "unknown panic".to_string()
    };
    error!("Request handler panicked: {}", detail);

    internal_server_error().build().into_response()
}

/// Register plugins and assemble the full application router
async fn build_app(
    db: Arc<DbConnection>,
    config: &ServerConfig,
    policy: ClassificationPolicy,
) -> anyhow::Result<Router> {
    let mut plugin_manager = PluginManager::new();
    plugin_manager.service_context().register_service(db);

    debug!("Registering IngestPlugin");
    plugin_manager.register_plugin(Box::new(IngestPlugin::new(IngestSettings {
        policy,
        environment: config.environment.clone(),
    })));

    plugin_manager
        .initialize_plugins()
        .await
        .map_err(|e| anyhow::anyhow!("Plugin initialization failed: {}", e))?;
    debug!("All plugins initialized successfully");

    let app = plugin_manager
        .build_application()
        .map_err(|e| anyhow::anyhow!("Failed to build application: {}", e))?
        .merge(create_swagger_router(&plugin_manager)?)
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(TraceLayer::new_for_http())
        .layer(build_cors_layer(config));

    Ok(app)
}

pub async fn start_api_server(
    db: Arc<DbConnection>,
    config: Arc<ServerConfig>,
    policy: ClassificationPolicy,
) -> anyhow::Result<()> {
    let app = build_app(db.clone(), &config, policy).await?;
    let shutdown = ShutdownSignal::new(CLEANUP_TIMEOUT, db);

    let listener = TcpListener::bind(config.address).await?;
    info!("API server listening on {}", config.address);
    info!("API docs available at http://{}/docs", config.address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.wait_for_signal())
        .await?;
    info!("API server exited");

    shutdown.cleanup_resources().await;
    Ok(())
}
