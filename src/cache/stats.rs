//! Cache Statistics Module
//!
//! Point-in-time view of the coalescing cache.

use serde::Serialize;

// == Cache Stats ==
/// Snapshot returned by [`Coalescer::stats`](crate::cache::Coalescer::stats).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CacheStats {
    /// Entries currently held by the store
    pub entry_count: usize,
    /// Maximum entries before LRU eviction
    pub capacity: usize,
    /// Loads currently pending
    pub in_flight_count: usize,
    /// Reads answered from the store
    pub hits: u64,
    /// Reads that found no usable entry
    pub misses: u64,
    /// Entries dropped by the capacity limit
    pub evictions: u64,
    /// Loader executions started
    pub loads: u64,
    /// Reads that joined a pending load instead of starting one
    pub coalesced: u64,
    /// Loader executions that returned an error
    pub load_failures: u64,
}

impl CacheStats {
    // == Hit Rate ==
    /// hits / (hits + misses), or 0.0 before any read.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}
