use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use nexero_core::plugin::{
    NexeroPlugin, PluginContext, PluginError, PluginRoutes, ServiceRegistrationContext,
};
use tracing::debug;

use crate::classify::ClassificationPolicy;
use crate::handlers::AppState;
use crate::services::{IngestService, SessionService, TrackingService};
use crate::store::{RecordStore, SeaOrmRecordStore};

/// Settings the ingest plugin is built with
#[derive(Debug, Clone)]
pub struct IngestSettings {
    pub policy: ClassificationPolicy,
    pub environment: String,
}

impl Default for IngestSettings {
    fn default() -> Self {
        Self {
            policy: ClassificationPolicy::default(),
            environment: "development".to_string(),
        }
    }
}

/// Unreal ingest endpoints plus health and service info
///
/// Uses an already registered `dyn RecordStore` when present, otherwise
/// builds a [`SeaOrmRecordStore`] over the registered database connection.
pub struct IngestPlugin {
    settings: IngestSettings,
}

impl IngestPlugin {
    pub fn new(settings: IngestSettings) -> Self {
        Self { settings }
    }
}

impl Default for IngestPlugin {
    fn default() -> Self {
        Self::new(IngestSettings::default())
    }
}

impl IngestPlugin {
    fn app_state(&self, context: &PluginContext) -> Option<Arc<AppState>> {
        Some(Arc::new(AppState {
            ingest_service: context.get_service::<IngestService>()?,
            session_service: context.get_service::<SessionService>()?,
            tracking_service: context.get_service::<TrackingService>()?,
            store: context.get_service::<dyn RecordStore>()?,
            environment: self.settings.environment.clone(),
        }))
    }
}

impl NexeroPlugin for IngestPlugin {
    fn name(&self) -> &'static str {
        "unreal-ingest"
    }

    fn register_services<'a>(
        &'a self,
        context: &'a ServiceRegistrationContext,
    ) -> Pin<Box<dyn Future<Output = Result<(), PluginError>> + Send + 'a>> {
        Box::pin(async move {
            let store = match context.get_service::<dyn RecordStore>() {
                Some(store) => store,
                None => {
                    let db = context.require_service::<sea_orm::DatabaseConnection>()?;
                    let store: Arc<dyn RecordStore> = Arc::new(SeaOrmRecordStore::new(db));
                    context.register_service(store.clone());
                    store
                }
            };

            let session_service = Arc::new(SessionService::new(store.clone()));
            let tracking_service = Arc::new(TrackingService::new(store.clone()));
            let ingest_service = Arc::new(IngestService::new(
                store,
                session_service.clone(),
                self.settings.policy,
            ));

            context.register_service(session_service);
            context.register_service(tracking_service);
            context.register_service(ingest_service);

            debug!(
                "Ingest services registered with {} classification",
                self.settings.policy
            );
            Ok(())
        })
    }

    fn configure_routes(&self, context: &PluginContext) -> Option<PluginRoutes> {
        let state = self.app_state(context)?;
        Some(PluginRoutes::new(
            crate::handlers::configure_routes().with_state(state),
        ))
    }

    fn configure_root_routes(&self, context: &PluginContext) -> Option<PluginRoutes> {
        let state = self.app_state(context)?;
        Some(PluginRoutes::new(
            crate::handlers::configure_root_routes().with_state(state),
        ))
    }

    fn openapi_schema(&self) -> Option<utoipa::openapi::OpenApi> {
        Some(<crate::handlers::IngestApiDoc as utoipa::OpenApi>::openapi())
    }
}
