//! Test utilities for database-backed tests
//!
//! Every [`TestDatabase`] is a private in-memory SQLite database with the
//! full migration set applied, so tests never share rows.

use crate::DbConnection;
use nexero_migrations::Migrator;
use sea_orm::{ConnectOptions, ConnectionTrait, Database};
use sea_orm_migration::MigratorTrait;
use std::sync::Arc;

pub struct TestDatabase {
    pub db: Arc<DbConnection>,
}

impl TestDatabase {
    pub async fn new() -> anyhow::Result<Self> {
        let mut opt = ConnectOptions::new("sqlite::memory:");
        opt.max_connections(1).min_connections(1).sqlx_logging(false);

        let db = Database::connect(opt).await?;
        Migrator::up(&db, None).await?;

        Ok(Self { db: Arc::new(db) })
    }

    /// Drop a table so writes to it fail, for exercising fallback paths.
    pub async fn drop_table(&self, table: &str) -> anyhow::Result<()> {
        self.db
            .execute_unprepared(&format!("DROP TABLE {}", table))
            .await?;
        Ok(())
    }

    pub fn connection(&self) -> Arc<DbConnection> {
        self.db.clone()
    }
}
