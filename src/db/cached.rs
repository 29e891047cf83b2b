//! Cached table client.
//!
//! Reads go through the coalescing cache under canonical keys; writes go
//! straight to the backend and then invalidate every cached read of the
//! table they touched.

use std::sync::Arc;

use serde_json::{json, Value};
use tracing::debug;

use crate::cache::{generate_key, table_prefix, CacheStats, Coalescer, KeyPattern};
use crate::db::{Backend, Filter, Row, SelectQuery};
use crate::error::{AppError, Result};

/// Cache shared by every table; values are the JSON the backend returned.
pub type QueryCache = Coalescer<Value, AppError>;

// == Cached Db ==
#[derive(Clone)]
pub struct CachedDb {
    backend: Arc<dyn Backend>,
    cache: QueryCache,
}

impl CachedDb {
    pub fn new(backend: Arc<dyn Backend>, cache: QueryCache) -> Self {
        Self { backend, cache }
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    pub fn stats(&self) -> CacheStats {
        self.cache.stats()
    }

    // == Select ==
    /// Cached list read.
    pub async fn select(&self, table: &str, query: SelectQuery) -> Result<Vec<Value>> {
        let key = generate_key(
            table,
            "select",
            &json!({
                "select": "*",
                "eq": query.eq,
                "order": query.order,
                "limit": query.limit,
            }),
        );

        let backend = Arc::clone(&self.backend);
        let table = table.to_owned();
        let loader = move || async move {
            let rows = backend.select(&table, &query).await?;
            Ok::<_, AppError>(Value::Array(rows.into_iter().map(Value::Object).collect()))
        };

        match self.cache.read(&key, loader, None).await? {
            Value::Array(rows) => Ok(rows),
            other => Ok(vec![other]),
        }
    }

    // == Select Single ==
    /// Cached read of exactly one row; `NotFound` when nothing matches.
    pub async fn select_single(&self, table: &str, filter: Filter) -> Result<Value> {
        let key = generate_key(
            table,
            "selectSingle",
            &json!({ "select": "*", "eq": filter }),
        );

        let backend = Arc::clone(&self.backend);
        let table = table.to_owned();
        let loader = move || async move {
            let query = SelectQuery {
                eq: filter,
                ..SelectQuery::default()
            };
            let mut rows = backend.select(&table, &query).await?;
            match rows.len() {
                1 => Ok(Value::Object(rows.remove(0))),
                0 => Err(AppError::NotFound(format!("No {table} row matches"))),
                n => Err(AppError::Backend(format!(
                    "Expected a single {table} row, found {n}"
                ))),
            }
        };

        self.cache.read(&key, loader, None).await
    }

    // == Insert ==
    pub async fn insert(&self, table: &str, row: Row) -> Result<Value> {
        let inserted = self.backend.insert(table, row).await;
        self.invalidate_table(table);
        inserted.map(Value::Object)
    }

    /// Batch insert; the table's cached reads are invalidated once.
    pub async fn insert_many(&self, table: &str, rows: Vec<Row>) -> Result<Vec<Value>> {
        let inserted = self.backend.insert_many(table, rows).await;
        self.invalidate_table(table);
        Ok(inserted?.into_iter().map(Value::Object).collect())
    }

    // == Update ==
    /// Updates matching rows; `NotFound` when nothing matched.
    pub async fn update(&self, table: &str, filter: Filter, changes: Row) -> Result<Value> {
        let updated = self.backend.update(table, &filter, changes).await;
        self.invalidate_table(table);
        updated?
            .into_iter()
            .next()
            .map(Value::Object)
            .ok_or_else(|| AppError::NotFound(format!("No {table} row matches")))
    }

    // == Delete ==
    pub async fn delete(&self, table: &str, filter: Filter) -> Result<usize> {
        let deleted = self.backend.delete(table, &filter).await;
        self.invalidate_table(table);
        deleted
    }

    fn invalidate_table(&self, table: &str) {
        let removed = self.cache.invalidate(KeyPattern::prefix(table_prefix(table)));
        debug!(table, removed, "Invalidated cached reads after write");
    }
}
