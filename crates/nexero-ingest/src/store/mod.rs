//! Record storage
//!
//! Services talk to storage through [`RecordStore`]: rows are JSON objects
//! addressed by a closed set of [`Table`]s, read and updated with equality
//! filters. [`SeaOrmRecordStore`] backs it with the database and
//! [`MemoryRecordStore`] keeps rows in process.

mod memory;
mod orm;

use std::cmp::Ordering;
use std::fmt;

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

pub use memory::MemoryRecordStore;
pub use orm::SeaOrmRecordStore;

/// One stored row, keyed by column name
pub type Row = Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    VrSessions,
    PoiVisits,
    ViewEvents,
    SimpleEvents,
    TrackingEvents,
}

impl Table {
    pub const ALL: [Table; 5] = [
        Table::VrSessions,
        Table::PoiVisits,
        Table::ViewEvents,
        Table::SimpleEvents,
        Table::TrackingEvents,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Table::VrSessions => "vr_sessions",
            Table::PoiVisits => "poi_visits",
            Table::ViewEvents => "view_events",
            Table::SimpleEvents => "simple_events",
            Table::TrackingEvents => "tracking_events",
        }
    }

    pub fn columns(&self) -> &'static [&'static str] {
        match self {
            Table::VrSessions => &[
                "id",
                "started_at",
                "ended_at",
                "duration_seconds",
                "status",
                "customer_id",
                "property_id",
            ],
            Table::PoiVisits => &[
                "id",
                "poi_name",
                "parent_zone",
                "duration_string",
                "duration_seconds",
                "received_at",
            ],
            Table::ViewEvents => &[
                "id",
                "view_name",
                "duration_string",
                "duration_seconds",
                "received_at",
            ],
            Table::SimpleEvents => &["id", "event_type", "session_id", "received_at", "data"],
            Table::TrackingEvents => &[
                "id",
                "session_id",
                "event_type",
                "timestamp",
                "zone_name",
                "object_name",
                "gaze_target",
                "interaction_type",
                "dwell_time_ms",
                "position_x",
                "position_y",
                "position_z",
                "rotation_pitch",
                "rotation_yaw",
                "rotation_roll",
                "metadata",
                "received_at",
            ],
        }
    }

    /// Text primary key supplied by the caller; other tables number their rows
    pub fn has_text_id(&self) -> bool {
        matches!(self, Table::VrSessions)
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("Unknown column '{column}' in {table}")]
    UnknownColumn { table: Table, column: String },

    #[error("Unsupported filter value for {table}.{column}: {value}")]
    UnsupportedFilter {
        table: Table,
        column: String,
        value: Value,
    },

    #[error("Invalid row for {table}: {reason}")]
    InvalidRow { table: Table, reason: String },

    #[error("Insert into {table} returned no row")]
    NoRowReturned { table: Table },

    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

/// Equality filters with optional ordering and limit
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub filters: Vec<(String, Value)>,
    pub order_by: Option<(String, SortOrder)>,
    pub limit: Option<u64>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    /// `column = value`; a `null` value matches missing values
    pub fn eq(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.filters.push((column.to_string(), value.into()));
        self
    }

    pub fn order_by(mut self, column: &str, order: SortOrder) -> Self {
        self.order_by = Some((column.to_string(), order));
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.filters
            .iter()
            .map(|(column, _)| column.as_str())
            .chain(self.order_by.iter().map(|(column, _)| column.as_str()))
    }

    pub fn matches(&self, row: &Row) -> bool {
        self.filters
            .iter()
            .all(|(column, expected)| row.get(column).unwrap_or(&Value::Null) == expected)
    }

    pub(crate) fn compare(&self, a: &Row, b: &Row) -> Ordering {
        match &self.order_by {
            Some((column, order)) => {
                let ordering = compare_values(
                    a.get(column).unwrap_or(&Value::Null),
                    b.get(column).unwrap_or(&Value::Null),
                );
                match order {
                    SortOrder::Asc => ordering,
                    SortOrder::Desc => ordering.reverse(),
                }
            }
            None => Ordering::Equal,
        }
    }
}

/// Nulls first, numbers numerically, everything else by its text.
fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Less,
        (_, Value::Null) => Ordering::Greater,
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (x, y) => x.to_string().cmp(&y.to_string()),
    }
}

/// Storage collaborator used by the ingest services
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Insert all rows or none, returning them as stored
    async fn insert(&self, table: Table, rows: Vec<Row>) -> Result<Vec<Row>, StoreError>;

    async fn select(&self, table: Table, query: &Query) -> Result<Vec<Row>, StoreError>;

    /// Apply `changes` to every row the query's filters match
    async fn update(
        &self,
        table: Table,
        query: &Query,
        changes: Row,
    ) -> Result<Vec<Row>, StoreError>;

    async fn insert_one(&self, table: Table, row: Row) -> Result<Row, StoreError> {
        self.insert(table, vec![row])
            .await?
            .into_iter()
            .next()
            .ok_or(StoreError::NoRowReturned { table })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: Value) -> Row {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_query_matches_equality_and_null() {
        let query = Query::new().eq("session_id", "s-1").eq("zone_name", Value::Null);

        assert!(query.matches(&row(json!({"session_id": "s-1"}))));
        assert!(query.matches(&row(json!({"session_id": "s-1", "zone_name": null}))));
        assert!(!query.matches(&row(json!({"session_id": "s-1", "zone_name": "kitchen"}))));
        assert!(!query.matches(&row(json!({"session_id": "s-2"}))));
    }

    #[test]
    fn test_query_compare_orders_nulls_first() {
        let query = Query::new().order_by("timestamp", SortOrder::Asc);
        let mut rows = vec![
            row(json!({"timestamp": "2024-01-02T00:00:00+00:00"})),
            row(json!({"timestamp": null})),
            row(json!({"timestamp": "2024-01-01T00:00:00+00:00"})),
        ];
        rows.sort_by(|a, b| query.compare(a, b));

        assert_eq!(rows[0]["timestamp"], Value::Null);
        assert_eq!(rows[1]["timestamp"], json!("2024-01-01T00:00:00+00:00"));

        let desc = Query::new().order_by("n", SortOrder::Desc);
        assert_eq!(
            desc.compare(&row(json!({"n": 2})), &row(json!({"n": 10}))),
            Ordering::Greater
        );
    }

    #[test]
    fn test_table_names() {
        let names: Vec<&str> = Table::ALL.iter().map(Table::as_str).collect();
        assert_eq!(
            names,
            vec!["vr_sessions", "poi_visits", "view_events", "simple_events", "tracking_events"]
        );
        assert!(Table::ALL.iter().all(|table| table.columns().contains(&"id")));
    }
}
