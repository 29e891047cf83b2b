//! Expiry Sweep Task
//!
//! Background task that periodically removes expired cache entries. With
//! stale reads enabled this bounds how long an expired result is served.

use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::db::QueryCache;

/// Spawns a task that sweeps expired entries every `cleanup_interval_secs`.
///
/// The returned handle is aborted during graceful shutdown.
pub fn spawn_cleanup_task(cache: QueryCache, cleanup_interval_secs: u64) -> JoinHandle<()> {
    let interval = Duration::from_secs(cleanup_interval_secs.max(1));

    tokio::spawn(async move {
        info!(
            "Starting cache expiry sweep with interval of {} seconds",
            interval.as_secs()
        );

        loop {
            tokio::time::sleep(interval).await;

            let removed = cache.cleanup_expired();
            if removed > 0 {
                info!("Cache sweep: removed {} expired entries", removed);
            } else {
                debug!("Cache sweep: no expired entries found");
            }
        }
    })
}
