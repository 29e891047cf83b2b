//! Cache Module
//!
//! Request-coalescing read cache: a bounded TTL/LRU store fronted by a
//! single-flight coalescer, plus key construction and invalidation patterns.

mod coalescer;
mod entry;
mod key;
mod lru;
mod pattern;
mod stats;
mod store;

#[cfg(test)]
mod property_tests;

pub use coalescer::Coalescer;
pub use entry::CacheEntry;
pub use key::{generate_key, table_prefix};
pub use lru::LruTracker;
pub use pattern::KeyPattern;
pub use stats::CacheStats;
pub use store::CacheStore;
