use std::sync::Arc;

use async_trait::async_trait;
use nexero_entities::{poi_visits, simple_events, tracking_events, view_events, vr_sessions};
use sea_orm::{
    ActiveModelBehavior, ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait,
    IdenStatic, IntoActiveModel, Iterable, PrimaryKeyToColumn, QueryFilter, QueryOrder,
    QuerySelect, Select, TransactionTrait, TryIntoModel,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use super::{Query, RecordStore, Row, SortOrder, StoreError, Table};

/// [`RecordStore`] over the sea-orm entities
pub struct SeaOrmRecordStore {
    db: Arc<DatabaseConnection>,
}

impl SeaOrmRecordStore {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

macro_rules! with_active_model {
    ($table:expr, $func:ident ( $($arg:expr),* )) => {
        match $table {
            Table::VrSessions => $func::<vr_sessions::ActiveModel>($($arg),*).await,
            Table::PoiVisits => $func::<poi_visits::ActiveModel>($($arg),*).await,
            Table::ViewEvents => $func::<view_events::ActiveModel>($($arg),*).await,
            Table::SimpleEvents => $func::<simple_events::ActiveModel>($($arg),*).await,
            Table::TrackingEvents => $func::<tracking_events::ActiveModel>($($arg),*).await,
        }
    };
}

#[async_trait]
impl RecordStore for SeaOrmRecordStore {
    async fn insert(&self, table: Table, rows: Vec<Row>) -> Result<Vec<Row>, StoreError> {
        debug!("Inserting {} row(s) into {}", rows.len(), table);
        with_active_model!(table, insert_rows(self.db.as_ref(), table, rows))
    }

    async fn select(&self, table: Table, query: &Query) -> Result<Vec<Row>, StoreError> {
        with_active_model!(table, select_rows(self.db.as_ref(), table, query))
    }

    async fn update(
        &self,
        table: Table,
        query: &Query,
        changes: Row,
    ) -> Result<Vec<Row>, StoreError> {
        with_active_model!(table, update_rows(self.db.as_ref(), table, query, changes))
    }
}

type ModelOf<A> = <<A as ActiveModelTrait>::Entity as EntityTrait>::Model;
type ColumnOf<A> = <<A as ActiveModelTrait>::Entity as EntityTrait>::Column;

async fn insert_rows<A>(
    db: &DatabaseConnection,
    table: Table,
    rows: Vec<Row>,
) -> Result<Vec<Row>, StoreError>
where
    A: ActiveModelTrait + ActiveModelBehavior + TryIntoModel<ModelOf<A>> + Send + 'static,
    ModelOf<A>: IntoActiveModel<A> + Serialize + for<'de> Deserialize<'de>,
{
    let mut models = Vec::with_capacity(rows.len());
    for row in rows {
        for key in row.keys() {
            column::<A>(table, key)?;
        }
        models.push(A::from_json(Value::Object(row))?);
    }

    if models.is_empty() {
        return Ok(Vec::new());
    }

    // All rows land or none do
    let txn = db.begin().await?;
    let mut inserted = Vec::with_capacity(models.len());
    for active in models {
        let model = active.insert(&txn).await?;
        inserted.push(to_row(table, &model)?);
    }
    txn.commit().await?;

    Ok(inserted)
}

async fn select_rows<A>(
    db: &DatabaseConnection,
    table: Table,
    query: &Query,
) -> Result<Vec<Row>, StoreError>
where
    A: ActiveModelTrait + Send + 'static,
    ModelOf<A>: Serialize,
{
    let models = build_select::<A>(table, query)?.all(db).await?;
    models.iter().map(|model| to_row(table, model)).collect()
}

async fn update_rows<A>(
    db: &DatabaseConnection,
    table: Table,
    query: &Query,
    changes: Row,
) -> Result<Vec<Row>, StoreError>
where
    A: ActiveModelTrait + ActiveModelBehavior + TryIntoModel<ModelOf<A>> + Send + 'static,
    ModelOf<A>: IntoActiveModel<A> + Serialize + for<'de> Deserialize<'de>,
{
    let mut changed_columns = Vec::with_capacity(changes.len());
    for key in changes.keys() {
        let column = column::<A>(table, key)?;
        let is_primary_key = <<A::Entity as EntityTrait>::PrimaryKey as Iterable>::iter()
            .any(|pk| pk.into_column().as_str() == column.as_str());
        if !is_primary_key {
            changed_columns.push(column);
        }
    }

    let models = build_select::<A>(table, query)?.all(db).await?;
    let mut updated = Vec::with_capacity(models.len());

    for model in models {
        // Typed values for the changed columns, decoded through the model
        let mut merged = to_row(table, &model)?;
        merged.extend(changes.clone());
        let patched = A::from_json(Value::Object(merged))?;

        let mut active: A = model.into_active_model();
        for column in &changed_columns {
            if let Some(value) = patched.get(*column).into_value() {
                active.set(*column, value);
            }
        }

        let saved = active.update(db).await?;
        updated.push(to_row(table, &saved)?);
    }

    Ok(updated)
}

fn build_select<A>(table: Table, query: &Query) -> Result<Select<A::Entity>, StoreError>
where
    A: ActiveModelTrait,
{
    let mut select = <A::Entity as EntityTrait>::find();

    for (name, value) in &query.filters {
        let column = column::<A>(table, name)?;
        select = match value {
            Value::Null => select.filter(column.is_null()),
            Value::String(text) => select.filter(column.eq(text.clone())),
            Value::Bool(flag) => select.filter(column.eq(*flag)),
            Value::Number(number) => match (number.as_i64(), number.as_f64()) {
                (Some(integer), _) => select.filter(column.eq(integer)),
                (None, Some(float)) => select.filter(column.eq(float)),
                (None, None) => return Err(unsupported_filter(table, name, value)),
            },
            other => return Err(unsupported_filter(table, name, other)),
        };
    }

    if let Some((name, order)) = &query.order_by {
        let column = column::<A>(table, name)?;
        select = match order {
            SortOrder::Asc => select.order_by_asc(column),
            SortOrder::Desc => select.order_by_desc(column),
        };
    }

    if let Some(limit) = query.limit {
        select = select.limit(limit);
    }

    Ok(select)
}

fn column<A: ActiveModelTrait>(table: Table, name: &str) -> Result<ColumnOf<A>, StoreError> {
    <ColumnOf<A> as Iterable>::iter()
        .find(|column| column.as_str() == name)
        .ok_or_else(|| StoreError::UnknownColumn {
            table,
            column: name.to_string(),
        })
}

fn unsupported_filter(table: Table, column: &str, value: &Value) -> StoreError {
    StoreError::UnsupportedFilter {
        table,
        column: column.to_string(),
        value: value.clone(),
    }
}

fn to_row<M: Serialize>(table: Table, model: &M) -> Result<Row, StoreError> {
    match serde_json::to_value(model) {
        Ok(Value::Object(row)) => Ok(row),
        Ok(other) => Err(StoreError::InvalidRow {
            table,
            reason: format!("model serialized to {}", other),
        }),
        Err(e) => Err(StoreError::InvalidRow {
            table,
            reason: e.to_string(),
        }),
    }
}
