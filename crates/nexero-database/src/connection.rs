//! Database connection management

use nexero_core::{redact_url_password, DatabaseConfig, ServiceError, ServiceResult};
use nexero_migrations::{Migrator, MigratorTrait};
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use std::sync::Arc;
use tracing::{debug, info};

pub type DbConnection = DatabaseConnection;

/// Open the connection pool and bring the schema up to date.
pub async fn establish_connection(config: &DatabaseConfig) -> ServiceResult<Arc<DbConnection>> {
    let mut opt = ConnectOptions::new(config.url.clone());
    if config.is_sqlite_memory() {
        // every pooled connection would otherwise see its own empty database
        opt.max_connections(1).min_connections(1);
    } else {
        opt.max_connections(config.max_connections)
            .min_connections(config.min_connections);
    }
    opt.connect_timeout(config.connect_timeout())
        .sqlx_logging(false);

    debug!(
        "Connecting to database {}",
        redact_url_password(&config.url)
    );
    let db = Database::connect(opt)
        .await
        .map_err(|e| ServiceError::Database(e.to_string()))?;

    Migrator::up(&db, None)
        .await
        .map_err(|e| ServiceError::Database(e.to_string()))?;
    info!("Database schema is up to date");

    Ok(Arc::new(db))
}
