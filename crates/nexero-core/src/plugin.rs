//! Plugin system for service registration and route configuration
//!
//! Each feature crate ships a [`NexeroPlugin`] that registers its services
//! into a shared, type-keyed registry and contributes routes plus an OpenAPI
//! document. [`PluginManager`] wires them together in registration order.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use axum::Router;
use thiserror::Error;
use tracing::debug;
use utoipa::openapi::{ComponentsBuilder, OpenApi};

// Re-export for plugin implementations
pub use axum;
pub use utoipa;

/// Errors that can occur during plugin operations
#[derive(Error, Debug)]
pub enum PluginError {
    #[error("Plugin registration failed for '{plugin_name}': {error}")]
    PluginRegistrationFailed { plugin_name: String, error: String },

    #[error("Service '{service_type}' is required but not registered")]
    ServiceNotFound { service_type: String },

    #[error("OpenAPI schema merge failed: {0}")]
    OpenApiMergeFailed(String),
}

/// Core plugin trait that defines the plugin interface
pub trait NexeroPlugin: Send + Sync {
    /// Unique identifier for this plugin
    fn name(&self) -> &'static str;

    /// Register services that this plugin provides
    ///
    /// Use `context.require_service::<T>()` to get dependencies.
    /// Use `context.register_service(service)` to provide services for other plugins.
    fn register_services<'a>(
        &'a self,
        context: &'a ServiceRegistrationContext,
    ) -> Pin<Box<dyn Future<Output = Result<(), PluginError>> + Send + 'a>>;

    /// Routes mounted under `/api`
    fn configure_routes(&self, _context: &PluginContext) -> Option<PluginRoutes> {
        None
    }

    /// Routes mounted at the server root, outside `/api`
    fn configure_root_routes(&self, _context: &PluginContext) -> Option<PluginRoutes> {
        None
    }

    /// OpenAPI document for this plugin's endpoints
    fn openapi_schema(&self) -> Option<OpenApi> {
        None
    }
}

/// Route configuration returned by plugins
pub struct PluginRoutes {
    pub router: Router,
}

impl PluginRoutes {
    pub fn new(router: Router) -> Self {
        Self { router }
    }
}

/// Type-safe service registry for dependency injection
pub struct ServiceRegistry {
    services: Mutex<HashMap<TypeId, Box<dyn Any + Send + Sync>>>,
}

impl Default for ServiceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self {
            services: Mutex::new(HashMap::new()),
        }
    }

    fn services(&self) -> MutexGuard<'_, HashMap<TypeId, Box<dyn Any + Send + Sync>>> {
        self.services.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a service for other plugins to use
    pub fn register<T: Send + Sync + 'static + ?Sized>(&self, service: Arc<T>) {
        debug!("Registering service: {}", std::any::type_name::<T>());
        self.services()
            .insert(TypeId::of::<T>(), Box::new(service));
    }

    /// Get a service if it's registered
    pub fn get<T: Send + Sync + 'static + ?Sized>(&self) -> Option<Arc<T>> {
        self.services()
            .get(&TypeId::of::<T>())
            .and_then(|any| any.downcast_ref::<Arc<T>>())
            .cloned()
    }

    /// Get a service, failing with [`PluginError::ServiceNotFound`] when absent
    pub fn require<T: Send + Sync + 'static + ?Sized>(&self) -> Result<Arc<T>, PluginError> {
        self.get::<T>().ok_or_else(|| PluginError::ServiceNotFound {
            service_type: std::any::type_name::<T>().to_string(),
        })
    }
}

/// Read-only context handed to plugins while routes are built
pub struct PluginContext {
    service_registry: Arc<ServiceRegistry>,
}

impl PluginContext {
    pub fn new(registry: Arc<ServiceRegistry>) -> Self {
        Self {
            service_registry: registry,
        }
    }

    pub fn get_service<T: Send + Sync + 'static + ?Sized>(&self) -> Option<Arc<T>> {
        self.service_registry.get::<T>()
    }

    pub fn require_service<T: Send + Sync + 'static + ?Sized>(
        &self,
    ) -> Result<Arc<T>, PluginError> {
        self.service_registry.require::<T>()
    }
}

/// Context used during service registration
pub struct ServiceRegistrationContext {
    service_registry: Arc<ServiceRegistry>,
}

impl Default for ServiceRegistrationContext {
    fn default() -> Self {
        Self::new()
    }
}

impl ServiceRegistrationContext {
    pub fn new() -> Self {
        Self {
            service_registry: Arc::new(ServiceRegistry::new()),
        }
    }

    pub fn register_service<T: Send + Sync + 'static + ?Sized>(&self, service: Arc<T>) {
        self.service_registry.register(service);
    }

    pub fn get_service<T: Send + Sync + 'static + ?Sized>(&self) -> Option<Arc<T>> {
        self.service_registry.get::<T>()
    }

    pub fn require_service<T: Send + Sync + 'static + ?Sized>(
        &self,
    ) -> Result<Arc<T>, PluginError> {
        self.service_registry.require::<T>()
    }

    /// Create a read-only context for route configuration
    pub fn create_plugin_context(&self) -> PluginContext {
        PluginContext::new(self.service_registry.clone())
    }
}

/// Registers plugins, initializes them in order and assembles the application
pub struct PluginManager {
    plugins: Vec<Box<dyn NexeroPlugin>>,
    context: ServiceRegistrationContext,
}

impl Default for PluginManager {
    fn default() -> Self {
        Self::new()
    }
}

impl PluginManager {
    pub fn new() -> Self {
        Self {
            plugins: Vec::new(),
            context: ServiceRegistrationContext::new(),
        }
    }

    /// Register a plugin (order matters for dependencies)
    pub fn register_plugin(&mut self, plugin: Box<dyn NexeroPlugin>) {
        debug!("Registering plugin: {}", plugin.name());
        self.plugins.push(plugin);
    }

    /// Initialize all plugins in registration order
    pub async fn initialize_plugins(&mut self) -> Result<(), PluginError> {
        debug!("Initializing {} plugins", self.plugins.len());

        for plugin in &self.plugins {
            plugin.register_services(&self.context).await.map_err(|e| {
                PluginError::PluginRegistrationFailed {
                    plugin_name: plugin.name().to_string(),
                    error: e.to_string(),
                }
            })?;

            debug!("Successfully initialized plugin: {}", plugin.name());
        }

        Ok(())
    }

    /// Build the router: plugin API routes nested under `/api`, root routes merged as-is
    pub fn build_application(&self) -> Result<Router, PluginError> {
        debug!("Building application with {} plugins", self.plugins.len());

        let plugin_context = self.context.create_plugin_context();
        let mut api_router = Router::new();
        let mut root_router = Router::new();

        for plugin in &self.plugins {
            if let Some(plugin_routes) = plugin.configure_routes(&plugin_context) {
                debug!("Adding routes for plugin: {}", plugin.name());
                api_router = api_router.merge(plugin_routes.router);
            }
            if let Some(plugin_routes) = plugin.configure_root_routes(&plugin_context) {
                debug!("Adding root routes for plugin: {}", plugin.name());
                root_router = root_router.merge(plugin_routes.router);
            }
        }

        Ok(Router::new().nest("/api", api_router).merge(root_router))
    }

    /// Get the unified OpenAPI schema from all plugins
    pub fn get_unified_openapi(&self) -> Result<OpenApi, PluginError> {
        use utoipa::openapi::*;

        let mut combined_openapi = OpenApiBuilder::new()
            .info(
                InfoBuilder::new()
                    .title("Nexero VR Backend")
                    .description(Some(
                        "Receives tracking data from Unreal Engine VR tours and stores it for analytics",
                    ))
                    .version(env!("CARGO_PKG_VERSION"))
                    .build(),
            )
            .components(Some(ComponentsBuilder::new().build()))
            .build();

        for plugin in &self.plugins {
            if let Some(plugin_openapi) = plugin.openapi_schema() {
                debug!("Merging OpenAPI schema for plugin: {}", plugin.name());
                combined_openapi = merge_openapi_schemas(combined_openapi, plugin_openapi)?;
            }
        }

        Ok(combined_openapi)
    }

    /// Access to the registration context, used to seed core services before initialization
    pub fn service_context(&self) -> &ServiceRegistrationContext {
        &self.context
    }
}

fn merge_openapi_schemas(mut base: OpenApi, plugin_schema: OpenApi) -> Result<OpenApi, PluginError> {
    for (path, path_item) in plugin_schema.paths.paths {
        if base.paths.paths.contains_key(&path) {
            return Err(PluginError::OpenApiMergeFailed(format!(
                "path '{}' is documented by more than one plugin",
                path
            )));
        }
        base.paths.paths.insert(path, path_item);
    }

    if let Some(plugin_components) = plugin_schema.components {
        let base_components = base
            .components
            .get_or_insert_with(|| ComponentsBuilder::new().build());

        for (name, schema) in plugin_components.schemas {
            base_components.schemas.insert(name, schema);
        }

        for (name, response) in plugin_components.responses {
            base_components.responses.insert(name, response);
        }
    }

    if let Some(plugin_tags) = plugin_schema.tags {
        let base_tags = base.tags.get_or_insert_with(Vec::new);
        base_tags.extend(plugin_tags);
    }

    Ok(base)
}
