//! Row backend abstraction and the in-process implementation.

use std::cmp::Ordering;
use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::Result;

/// One table row as a JSON object.
pub type Row = Map<String, Value>;

/// Column equality conditions, all of which must hold.
pub type Filter = Map<String, Value>;

// == Select Query ==
/// Parameters of a list read. Serialized into the cache key.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SelectQuery {
    pub eq: Filter,
    pub order: Option<OrderBy>,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderBy {
    pub column: String,
    pub ascending: bool,
}

impl SelectQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.eq.insert(column.into(), value.into());
        self
    }

    pub fn order(mut self, column: impl Into<String>, ascending: bool) -> Self {
        self.order = Some(OrderBy {
            column: column.into(),
            ascending,
        });
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Builds a single-column equality filter.
pub fn filter_eq(column: &str, value: impl Into<Value>) -> Filter {
    let mut filter = Filter::new();
    filter.insert(column.to_string(), value.into());
    filter
}

// == Backend Trait ==
/// The relational store the handlers persist to.
#[async_trait]
pub trait Backend: Send + Sync {
    async fn select(&self, table: &str, query: &SelectQuery) -> Result<Vec<Row>>;

    /// Inserts `row`, returning it with generated columns filled in.
    async fn insert(&self, table: &str, row: Row) -> Result<Row>;

    /// Inserts every row in order. Backends with a batch insert should
    /// override this so a failure leaves none of the rows behind.
    async fn insert_many(&self, table: &str, rows: Vec<Row>) -> Result<Vec<Row>> {
        let mut inserted = Vec::with_capacity(rows.len());
        for row in rows {
            inserted.push(self.insert(table, row).await?);
        }
        Ok(inserted)
    }

    /// Applies `changes` to every matching row; returns the updated rows.
    async fn update(&self, table: &str, filter: &Filter, changes: Row) -> Result<Vec<Row>>;

    /// Deletes matching rows; returns how many were removed.
    async fn delete(&self, table: &str, filter: &Filter) -> Result<usize>;
}

// == Memory Backend ==
/// Tables held in process memory. Generates `id`, `created_at` and
/// `updated_at` like the hosted store's column defaults.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    tables: RwLock<HashMap<String, Vec<Row>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn with_generated_columns(mut row: Row, now: &str) -> Row {
    row.entry("id")
        .or_insert_with(|| Value::String(Uuid::new_v4().to_string()));
    row.entry("created_at")
        .or_insert_with(|| Value::String(now.to_string()));
    row.insert("updated_at".to_string(), Value::String(now.to_string()));
    row
}

fn matches(row: &Row, filter: &Filter) -> bool {
    filter.iter().all(|(column, expected)| {
        row.get(column)
            .is_some_and(|actual| loosely_equal(actual, expected))
    })
}

/// Path ids arrive as strings, so `"3"` matches a numeric `3` column.
fn loosely_equal(actual: &Value, expected: &Value) -> bool {
    match (actual, expected) {
        (Value::Number(n), Value::String(s)) | (Value::String(s), Value::Number(n)) => {
            n.to_string() == *s
        }
        _ => actual == expected,
    }
}

fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (Some(Value::Null) | None, Some(Value::Null) | None) => Ordering::Equal,
        (Some(Value::Null) | None, _) => Ordering::Less,
        (_, Some(Value::Null) | None) => Ordering::Greater,
        _ => Ordering::Equal,
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    async fn select(&self, table: &str, query: &SelectQuery) -> Result<Vec<Row>> {
        let tables = self.tables.read().await;
        let mut rows: Vec<Row> = tables
            .get(table)
            .map(|rows| {
                rows.iter()
                    .filter(|row| matches(row, &query.eq))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        if let Some(order) = &query.order {
            rows.sort_by(|a, b| {
                let ord = compare_values(a.get(&order.column), b.get(&order.column));
                if order.ascending {
                    ord
                } else {
                    ord.reverse()
                }
            });
        }
        if let Some(limit) = query.limit {
            rows.truncate(limit);
        }
        Ok(rows)
    }

    async fn insert(&self, table: &str, row: Row) -> Result<Row> {
        let row = with_generated_columns(row, &now_timestamp());
        let mut tables = self.tables.write().await;
        tables.entry(table.to_string()).or_default().push(row.clone());
        Ok(row)
    }

    async fn insert_many(&self, table: &str, rows: Vec<Row>) -> Result<Vec<Row>> {
        let now = now_timestamp();
        let rows: Vec<Row> = rows
            .into_iter()
            .map(|row| with_generated_columns(row, &now))
            .collect();
        let mut tables = self.tables.write().await;
        tables
            .entry(table.to_string())
            .or_default()
            .extend(rows.iter().cloned());
        Ok(rows)
    }

    async fn update(&self, table: &str, filter: &Filter, changes: Row) -> Result<Vec<Row>> {
        let now = now_timestamp();
        let mut tables = self.tables.write().await;
        let Some(rows) = tables.get_mut(table) else {
            return Ok(Vec::new());
        };

        let mut updated = Vec::new();
        for row in rows.iter_mut().filter(|row| matches(row, filter)) {
            for (column, value) in &changes {
                row.insert(column.clone(), value.clone());
            }
            row.insert("updated_at".to_string(), Value::String(now.clone()));
            updated.push(row.clone());
        }
        Ok(updated)
    }

    async fn delete(&self, table: &str, filter: &Filter) -> Result<usize> {
        let mut tables = self.tables.write().await;
        let Some(rows) = tables.get_mut(table) else {
            return Ok(0);
        };
        let before = rows.len();
        rows.retain(|row| !matches(row, filter));
        Ok(before - rows.len())
    }
}
