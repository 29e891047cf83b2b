//! Database Module
//!
//! Row backend trait, the in-memory backend, and the cached client the
//! request handlers read and write through.

mod backend;
mod cached;

pub use backend::{filter_eq, Backend, Filter, MemoryBackend, OrderBy, Row, SelectQuery};
pub use cached::{CachedDb, QueryCache};
