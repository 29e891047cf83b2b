//! Property-Based Tests for Cache Module
//!
//! Uses proptest to check the store and coalescer against arbitrary inputs.

use proptest::prelude::*;
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::cache::{generate_key, CacheStore, Coalescer, KeyPattern};
use crate::error::AppError;

// == Test Configuration ==
const TEST_TTL: Duration = Duration::from_secs(300);

// == Strategies ==
fn valid_key_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9_]{1,32}"
}

fn table_strategy() -> impl Strategy<Value = String> {
    prop::sample::select(vec!["projects", "stakeholders", "users", "communication_plans"])
        .prop_map(str::to_string)
}

#[derive(Debug, Clone)]
enum StoreOp {
    Set(String),
    Get(String),
    Delete(String),
}

fn store_op_strategy() -> impl Strategy<Value = StoreOp> {
    prop_oneof![
        valid_key_strategy().prop_map(StoreOp::Set),
        valid_key_strategy().prop_map(StoreOp::Get),
        valid_key_strategy().prop_map(StoreOp::Delete),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    // Any sequence of operations keeps the store within capacity, and the
    // LRU tracker in step with the entries.
    #[test]
    fn prop_capacity_enforcement(
        capacity in 1usize..20,
        ops in prop::collection::vec(store_op_strategy(), 1..200)
    ) {
        let mut store = CacheStore::new(capacity, TEST_TTL, false).unwrap();

        for op in ops {
            match op {
                StoreOp::Set(key) => { store.set(key.clone(), key, None); }
                StoreOp::Get(key) => { store.get(&key); }
                StoreOp::Delete(key) => { store.delete(&key); }
            }
            prop_assert!(store.len() <= capacity);
            prop_assert_eq!(store.keys().count(), store.len());
        }
    }

    // Filling to capacity and inserting one more key evicts exactly the
    // first inserted key when nothing was read in between.
    #[test]
    fn prop_lru_eviction_order(
        keys in prop::collection::hash_set(valid_key_strategy(), 2..10),
        new_key in valid_key_strategy()
    ) {
        prop_assume!(!keys.contains(&new_key));
        let keys: Vec<String> = keys.into_iter().collect();
        let mut store = CacheStore::new(keys.len(), TEST_TTL, false).unwrap();

        for key in &keys {
            store.set(key.clone(), format!("value_{key}"), None);
        }
        let evicted = store.set(new_key.clone(), "new".to_string(), None);

        prop_assert_eq!(evicted.as_ref(), Some(&keys[0]));
        prop_assert!(store.get(&keys[0]).is_none());
        prop_assert!(store.get(&new_key).is_some());
        for key in keys.iter().skip(1) {
            prop_assert!(store.get(key).is_some(), "Key '{}' should survive", key);
        }
    }

    // Parameter insertion order never changes the generated key.
    #[test]
    fn prop_key_canonicalization(
        table in table_strategy(),
        params in prop::collection::btree_map(valid_key_strategy(), any::<i64>(), 0..8)
    ) {
        let forward: Map<String, Value> =
            params.iter().map(|(k, v)| (k.clone(), Value::from(*v))).collect();
        let reversed: Map<String, Value> =
            params.iter().rev().map(|(k, v)| (k.clone(), Value::from(*v))).collect();

        prop_assert_eq!(
            generate_key(&table, "select", &Value::Object(forward)),
            generate_key(&table, "select", &Value::Object(reversed))
        );
    }

    // Prefix invalidation removes exactly the keys under the prefix.
    #[test]
    fn prop_prefix_invalidation(
        entries in prop::collection::vec((table_strategy(), valid_key_strategy()), 1..30),
        target in table_strategy()
    ) {
        let cache = Coalescer::<String, AppError>::new(1000, TEST_TTL, false).unwrap();
        let keys: HashSet<String> = entries
            .iter()
            .map(|(table, id)| format!("{table}:select:{id}"))
            .collect();

        tokio_test::block_on(async {
            for key in &keys {
                let value = key.clone();
                cache.read(key, move || async move { Ok(value) }, None).await.unwrap();
            }
        });

        let prefix = format!("{target}:");
        let expected_removed = keys.iter().filter(|k| k.starts_with(&prefix)).count();
        let removed = cache.invalidate(KeyPattern::prefix(prefix));

        prop_assert_eq!(removed, expected_removed);
        prop_assert_eq!(cache.stats().entry_count, keys.len() - expected_removed);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(20))]

    // Any burst of concurrent reads of one key runs the loader once and
    // hands every caller the same value. Once the load settles, callers not
    // yet polled find the stored value instead of joining, so every read
    // past the first is either a join or a hit.
    #[test]
    fn prop_single_flight(burst in 1usize..32) {
        let cache = Coalescer::<String, AppError>::new(10, TEST_TTL, false).unwrap();
        let calls = Arc::new(AtomicUsize::new(0));

        let results = tokio_test::block_on(async {
            let reads = (0..burst).map(|_| {
                let calls = Arc::clone(&calls);
                cache.read(
                    "projects:select:{}",
                    move || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::task::yield_now().await;
                        Ok("rows".to_string())
                    },
                    None,
                )
            });
            futures::future::join_all(reads).await
        });

        prop_assert_eq!(calls.load(Ordering::SeqCst), 1);
        prop_assert!(results.iter().all(|r| r.as_deref() == Ok("rows")));
        let stats = cache.stats();
        prop_assert_eq!(stats.loads, 1);
        prop_assert_eq!(stats.coalesced + stats.hits, burst as u64 - 1);
        prop_assert_eq!(stats.in_flight_count, 0);
    }
}
