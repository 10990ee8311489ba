//! Database migrations for the Nexero ingest schema

pub use sea_orm_migration::prelude::*;

mod migration;

pub use migration::Migrator;
