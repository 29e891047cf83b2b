//! Cache Store Module
//!
//! Bounded TTL store: HashMap storage with LRU tracking and per-entry TTL.

use std::collections::HashMap;
use std::time::Duration;

use crate::cache::{CacheEntry, LruTracker};
use crate::error::{AppError, Result};

// == Cache Store ==
/// Holds the latest loader result per key, bounded by `capacity`.
///
/// Expiry is enforced lazily on `get`. With `allow_stale` set, an expired
/// entry is still served until it is evicted, swept, or invalidated.
#[derive(Debug)]
pub struct CacheStore<V> {
    entries: HashMap<String, CacheEntry<V>>,
    lru: LruTracker,
    capacity: usize,
    default_ttl: Duration,
    allow_stale: bool,
    hits: u64,
    misses: u64,
    evictions: u64,
}

impl<V: Clone> CacheStore<V> {
    // == Constructor ==
    /// Creates a store, rejecting a zero capacity or a zero default TTL.
    pub fn new(capacity: usize, default_ttl: Duration, allow_stale: bool) -> Result<Self> {
        if capacity == 0 {
            return Err(AppError::InvalidConfig(
                "cache capacity must be greater than zero".to_string(),
            ));
        }
        if default_ttl.is_zero() {
            return Err(AppError::InvalidConfig(
                "default TTL must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            entries: HashMap::with_capacity(capacity),
            lru: LruTracker::new(),
            capacity,
            default_ttl,
            allow_stale,
            hits: 0,
            misses: 0,
            evictions: 0,
        })
    }

    // == Get ==
    /// Returns the value for `key`, touching its recency on a hit.
    pub fn get(&mut self, key: &str) -> Option<V> {
        let expired = match self.entries.get(key) {
            Some(entry) => entry.is_expired(),
            None => {
                self.misses += 1;
                return None;
            }
        };

        if expired && !self.allow_stale {
            self.entries.remove(key);
            self.lru.remove(key);
            self.misses += 1;
            return None;
        }

        self.hits += 1;
        self.lru.touch(key);
        self.entries.get(key).map(|entry| entry.value.clone())
    }

    // == Set ==
    /// Inserts or replaces `key`. Inserting a new key at capacity evicts the
    /// least recently used entry first; the evicted key is returned.
    pub fn set(&mut self, key: String, value: V, ttl: Option<Duration>) -> Option<String> {
        let mut evicted = None;
        if !self.entries.contains_key(&key) && self.entries.len() >= self.capacity {
            if let Some(oldest) = self.lru.evict_oldest() {
                self.entries.remove(&oldest);
                self.evictions += 1;
                evicted = Some(oldest);
            }
        }

        let entry = CacheEntry::new(value, ttl.unwrap_or(self.default_ttl));
        self.lru.touch(&key);
        self.entries.insert(key, entry);
        evicted
    }

    // == Delete ==
    /// Removes `key`; returns whether anything was removed.
    pub fn delete(&mut self, key: &str) -> bool {
        if self.entries.remove(key).is_some() {
            self.lru.remove(key);
            true
        } else {
            false
        }
    }

    // == Keys ==
    /// Snapshot of held keys, most recently used first.
    ///
    /// Each call takes a fresh snapshot, so callers may delete while iterating.
    pub fn keys(&self) -> std::vec::IntoIter<String> {
        self.lru.iter().map(str::to_owned).collect::<Vec<_>>().into_iter()
    }

    // == Cleanup Expired ==
    /// Removes every expired entry regardless of `allow_stale`.
    pub fn cleanup_expired(&mut self) -> usize {
        let expired: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired())
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            self.entries.remove(key);
            self.lru.remove(key);
        }
        expired.len()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.lru.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Whether `key` holds an entry, expired or not. Leaves recency and
    /// counters untouched.
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }

    pub fn evictions(&self) -> u64 {
        self.evictions
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    const TTL: Duration = Duration::from_secs(300);

    fn store(capacity: usize) -> CacheStore<String> {
        CacheStore::new(capacity, TTL, false).unwrap()
    }

    #[test]
    fn test_store_rejects_invalid_construction() {
        assert!(matches!(
            CacheStore::<String>::new(0, TTL, true),
            Err(AppError::InvalidConfig(_))
        ));
        assert!(matches!(
            CacheStore::<String>::new(10, Duration::ZERO, true),
            Err(AppError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_store_set_and_get() {
        let mut store = store(100);

        store.set("key1".to_string(), "value1".to_string(), None);

        assert_eq!(store.get("key1"), Some("value1".to_string()));
        assert_eq!(store.len(), 1);
        assert_eq!(store.capacity(), 100);
    }

    #[test]
    fn test_store_get_absent() {
        let mut store = store(100);
        assert_eq!(store.get("nonexistent"), None);
        assert_eq!(store.misses(), 1);
    }

    #[test]
    fn test_store_delete_is_noop_when_absent() {
        let mut store = store(100);

        store.set("key1".to_string(), "value1".to_string(), None);
        assert!(store.delete("key1"));
        assert!(!store.delete("key1"));
        assert!(store.is_empty());
    }

    #[test]
    fn test_store_overwrite() {
        let mut store = store(100);

        store.set("key1".to_string(), "value1".to_string(), None);
        store.set("key1".to_string(), "value2".to_string(), None);

        assert_eq!(store.get("key1"), Some("value2".to_string()));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_store_evicts_least_recently_used() {
        let mut store = store(2);

        store.set("A".to_string(), "a".to_string(), None);
        store.set("B".to_string(), "b".to_string(), None);
        let evicted = store.set("C".to_string(), "c".to_string(), None);

        assert_eq!(evicted, Some("A".to_string()));
        assert_eq!(store.get("A"), None);
        assert_eq!(store.get("B"), Some("b".to_string()));
        assert_eq!(store.get("C"), Some("c".to_string()));
        assert_eq!(store.evictions(), 1);
    }

    #[test]
    fn test_store_get_refreshes_recency() {
        let mut store = store(2);

        store.set("A".to_string(), "a".to_string(), None);
        store.set("B".to_string(), "b".to_string(), None);
        store.get("A");
        store.set("C".to_string(), "c".to_string(), None);

        assert_eq!(store.get("A"), Some("a".to_string()));
        assert_eq!(store.get("B"), None);
    }

    #[test]
    fn test_store_expired_entry_absent_without_stale_reads() {
        let mut store = store(10);

        store.set("k".to_string(), "v".to_string(), Some(Duration::from_millis(20)));
        sleep(Duration::from_millis(40));

        assert_eq!(store.get("k"), None);
        assert!(store.is_empty(), "expired entry should be removed lazily");
    }

    #[test]
    fn test_store_serves_stale_when_allowed() {
        let mut store = CacheStore::new(10, TTL, true).unwrap();

        store.set("k".to_string(), "v".to_string(), Some(Duration::from_millis(20)));
        sleep(Duration::from_millis(40));

        assert_eq!(store.get("k"), Some("v".to_string()));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_store_keys_snapshot() {
        let mut store = store(10);

        store.set("users:1".to_string(), "a".to_string(), None);
        store.set("users:2".to_string(), "b".to_string(), None);

        for key in store.keys() {
            store.delete(&key);
        }
        assert!(store.is_empty());
        assert_eq!(store.keys().count(), 0);
    }

    #[test]
    fn test_store_cleanup_expired() {
        let mut store = CacheStore::new(10, TTL, true).unwrap();

        store.set("short".to_string(), "a".to_string(), Some(Duration::from_millis(20)));
        store.set("long".to_string(), "b".to_string(), None);
        sleep(Duration::from_millis(40));

        assert_eq!(store.cleanup_expired(), 1);
        assert_eq!(store.len(), 1);
        assert_eq!(store.get("long"), Some("b".to_string()));
    }

    #[test]
    fn test_store_contains_leaves_counters_alone() {
        let mut store = store(10);
        store.set("k".to_string(), "v".to_string(), Some(Duration::from_millis(10)));
        sleep(Duration::from_millis(20));

        assert!(store.contains("k"));
        assert!(!store.contains("missing"));
        assert_eq!(store.hits(), 0);
        assert_eq!(store.misses(), 0);
    }
}
