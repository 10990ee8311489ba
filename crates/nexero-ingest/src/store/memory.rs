use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use serde_json::Value;

use super::{Query, RecordStore, Row, StoreError, Table};

type RowFilter = Box<dyn Fn(Table, &Row) -> bool + Send + Sync>;

#[derive(Default)]
struct MemoryState {
    tables: HashMap<Table, Vec<Row>>,
    next_id: HashMap<Table, i64>,
    insert_sizes: HashMap<Table, Vec<usize>>,
}

/// In-process [`RecordStore`] with failure injection
///
/// Inserts are atomic per call like the database store: when any row of a
/// call is rejected, none of them are kept.
#[derive(Default)]
pub struct MemoryRecordStore {
    state: Mutex<MemoryState>,
    unavailable: HashSet<Table>,
    rejects: Option<RowFilter>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every operation on these tables fails
    pub fn failing_on(mut self, tables: &[Table]) -> Self {
        self.unavailable.extend(tables.iter().copied());
        self
    }

    /// Inserts containing a row matching `predicate` fail as a whole
    pub fn rejecting_rows<F>(mut self, predicate: F) -> Self
    where
        F: Fn(Table, &Row) -> bool + Send + Sync + 'static,
    {
        self.rejects = Some(Box::new(predicate));
        self
    }

    pub fn rows(&self, table: Table) -> Vec<Row> {
        self.state().tables.get(&table).cloned().unwrap_or_default()
    }

    /// Row counts of every insert call made against `table`, successful or not
    pub fn insert_sizes(&self, table: Table) -> Vec<usize> {
        self.state()
            .insert_sizes
            .get(&table)
            .cloned()
            .unwrap_or_default()
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check_available(&self, table: Table) -> Result<(), StoreError> {
        if self.unavailable.contains(&table) {
            return Err(StoreError::Unavailable(format!("{} is unavailable", table)));
        }
        Ok(())
    }

    fn check_columns<'a>(
        table: Table,
        mut columns: impl Iterator<Item = &'a str>,
    ) -> Result<(), StoreError> {
        match columns.find(|column| !table.columns().iter().any(|known| known == column)) {
            Some(column) => Err(StoreError::UnknownColumn {
                table,
                column: column.to_string(),
            }),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn insert(&self, table: Table, rows: Vec<Row>) -> Result<Vec<Row>, StoreError> {
        let mut state = self.state();
        state
            .insert_sizes
            .entry(table)
            .or_default()
            .push(rows.len());

        self.check_available(table)?;
        for row in &rows {
            Self::check_columns(table, row.keys().map(String::as_str))?;
            if self.rejects.as_ref().is_some_and(|rejects| rejects(table, row)) {
                return Err(StoreError::InvalidRow {
                    table,
                    reason: "row rejected".to_string(),
                });
            }
        }

        let mut stored = Vec::with_capacity(rows.len());
        for mut row in rows {
            if !table.has_text_id() && !row.contains_key("id") {
                let next_id = state.next_id.entry(table).or_insert(0);
                *next_id += 1;
                row.insert("id".to_string(), Value::from(*next_id));
            }
            for column in table.columns() {
                row.entry(column.to_string()).or_insert(Value::Null);
            }
            stored.push(row);
        }

        state
            .tables
            .entry(table)
            .or_default()
            .extend(stored.iter().cloned());

        Ok(stored)
    }

    async fn select(&self, table: Table, query: &Query) -> Result<Vec<Row>, StoreError> {
        self.check_available(table)?;
        Self::check_columns(table, query.columns())?;

        let mut rows: Vec<Row> = self
            .state()
            .tables
            .get(&table)
            .map(|rows| rows.iter().filter(|row| query.matches(row)).cloned().collect())
            .unwrap_or_default();

        rows.sort_by(|a, b| query.compare(a, b));
        if let Some(limit) = query.limit {
            rows.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        }

        Ok(rows)
    }

    async fn update(
        &self,
        table: Table,
        query: &Query,
        changes: Row,
    ) -> Result<Vec<Row>, StoreError> {
        self.check_available(table)?;
        Self::check_columns(table, query.columns().chain(changes.keys().map(String::as_str)))?;

        let mut state = self.state();
        let mut updated = Vec::new();
        for row in state.tables.entry(table).or_default().iter_mut() {
            if !query.matches(row) {
                continue;
            }
            for (column, value) in &changes {
                if column != "id" {
                    row.insert(column.clone(), value.clone());
                }
            }
            updated.push(row.clone());
        }

        Ok(updated)
    }
}
