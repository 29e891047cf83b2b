//! Cache key construction.
//!
//! Keys look like `table:operation:{json}` where the JSON object has its
//! members sorted at every nesting level, so logically equal queries built
//! with different insertion orders land on the same key.

use serde_json::{Map, Value};

/// Builds the cache key for a read against `table`.
///
/// `params` should be a JSON object; `Value::Null` is treated as `{}`.
pub fn generate_key(table: &str, operation: &str, params: &Value) -> String {
    let canonical = match params {
        Value::Null => Value::Object(Map::new()),
        other => canonicalize(other),
    };
    format!("{table}:{operation}:{canonical}")
}

/// Prefix covering every key of `table`, used to invalidate after writes.
pub fn table_prefix(table: &str) -> String {
    format!("{table}:")
}

fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut members: Vec<(&String, &Value)> = map.iter().collect();
            members.sort_by(|a, b| a.0.cmp(b.0));
            // serde_json's Map keeps insertion order only with the
            // `preserve_order` feature; inserting sorted keeps both cases equal.
            let mut sorted = Map::new();
            for (key, inner) in members {
                sorted.insert(key.clone(), canonicalize(inner));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}
