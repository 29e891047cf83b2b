//! Cache Entry Module
//!
//! Defines a single stored result together with its insertion time and TTL.

use std::time::{Duration, Instant};

// == Cache Entry ==
/// A cached loader result with freshness metadata.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    /// The stored value
    pub value: V,
    /// When the entry was inserted
    pub inserted_at: Instant,
    /// How long the entry stays fresh
    pub ttl: Duration,
}

impl<V> CacheEntry<V> {
    // == Constructor ==
    /// Creates an entry inserted now.
    pub fn new(value: V, ttl: Duration) -> Self {
        Self {
            value,
            inserted_at: Instant::now(),
            ttl,
        }
    }

    // == Is Expired ==
    /// Checks if the entry has outlived its TTL.
    ///
    /// An entry is expired once the elapsed time is greater than or equal to
    /// its TTL, so a zero TTL is expired immediately.
    pub fn is_expired(&self) -> bool {
        self.inserted_at.elapsed() >= self.ttl
    }
}
