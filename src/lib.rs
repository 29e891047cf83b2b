//! Plan Cache - communication-plan API with a request-coalescing read cache
//!
//! Concurrent identical reads share one backend query; writes invalidate
//! the cached reads of the table they touch.

pub mod api;
pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod tasks;

pub use api::AppState;
pub use cache::{generate_key, CacheStats, Coalescer, KeyPattern};
pub use config::Config;
pub use error::AppError;
pub use tasks::spawn_cleanup_task;
