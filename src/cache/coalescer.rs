//! Request Coalescer
//!
//! Read-through front for the [`CacheStore`]: concurrent reads of the same
//! key share one loader execution, successful results are stored, failures
//! are handed to every waiter and then forgotten.
//!
//! The store and the in-flight map sit behind one mutex. Every
//! check-then-act step (miss check and marker registration, marker removal
//! and store population) runs inside a single critical section, and the lock
//! is never held across an `.await`.

use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use tracing::{debug, warn};

use crate::cache::{CacheStats, CacheStore, KeyPattern};
use crate::error::Result;

type SharedLoad<V, E> = Shared<BoxFuture<'static, std::result::Result<V, E>>>;

// == In-Flight Marker ==
struct InFlight<V, E> {
    /// Distinguishes a re-registered key from the load that was invalidated
    generation: u64,
    pending: SharedLoad<V, E>,
}

struct Inner<V, E> {
    store: CacheStore<V>,
    in_flight: HashMap<String, InFlight<V, E>>,
    next_generation: u64,
    loads: u64,
    coalesced: u64,
    load_failures: u64,
}

// == Coalescer ==
/// Process-wide single-flight read cache.
///
/// Cloning is cheap and every clone observes the same store and in-flight
/// map, so one instance is built at startup and handed to collaborators.
pub struct Coalescer<V, E> {
    inner: Arc<Mutex<Inner<V, E>>>,
}

impl<V, E> Clone for Coalescer<V, E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<V, E> Coalescer<V, E>
where
    V: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    // == Constructor ==
    /// Builds a coalescer over a fresh store.
    ///
    /// Fails with `InvalidConfig` for a zero capacity or zero default TTL.
    pub fn new(capacity: usize, default_ttl: Duration, allow_stale: bool) -> Result<Self> {
        Ok(Self::with_store(CacheStore::new(
            capacity,
            default_ttl,
            allow_stale,
        )?))
    }

    pub fn with_store(store: CacheStore<V>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                store,
                in_flight: HashMap::new(),
                next_generation: 0,
                loads: 0,
                coalesced: 0,
                load_failures: 0,
            })),
        }
    }

    // == Read ==
    /// Returns the cached value for `key`, joining a pending load or starting
    /// one with `loader` when there is neither.
    ///
    /// `ttl` overrides the store's default TTL for the stored result. The
    /// loader runs on its own task, so dropping this future does not cancel
    /// the load for other waiters.
    ///
    /// # Panics
    ///
    /// Panics if the load this call shares panicked. The key is cold again
    /// afterwards.
    ///
    /// Starting a load spawns a task, so this panics when polled outside a
    /// tokio runtime.
    pub async fn read<F, Fut>(
        &self,
        key: &str,
        loader: F,
        ttl: Option<Duration>,
    ) -> std::result::Result<V, E>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = std::result::Result<V, E>> + Send + 'static,
    {
        let pending = {
            let mut inner = lock(&self.inner);

            if let Some(value) = inner.store.get(key) {
                return Ok(value);
            }

            if let Some(flight) = inner.in_flight.get(key) {
                let pending = flight.pending.clone();
                inner.coalesced += 1;
                debug!(key, "Joining in-flight load");
                pending
            } else {
                let generation = inner.next_generation;
                inner.next_generation += 1;
                inner.loads += 1;

                let pending = settle(
                    Arc::downgrade(&self.inner),
                    key.to_owned(),
                    generation,
                    ttl,
                    async move { loader().await },
                )
                .boxed()
                .shared();

                inner.in_flight.insert(
                    key.to_owned(),
                    InFlight {
                        generation,
                        pending: pending.clone(),
                    },
                );
                debug!(key, generation, "Starting load");

                tokio::spawn(pending.clone());
                pending
            }
        };

        pending.await
    }

    // == Invalidate ==
    /// Drops matching entries and in-flight markers; returns how many store
    /// entries were removed.
    ///
    /// Pending loads keep running. A load that settles after this call still
    /// stores its result, unless a newer load for the key has registered or
    /// stored one in the meantime.
    pub fn invalidate(&self, pattern: impl Into<KeyPattern>) -> usize {
        let pattern = pattern.into();
        let mut guard = lock(&self.inner);
        let inner = &mut *guard;

        let removed = match &pattern {
            KeyPattern::Exact(key) => {
                inner.in_flight.remove(key);
                usize::from(inner.store.delete(key))
            }
            _ => {
                let mut removed = 0;
                for key in inner.store.keys() {
                    if pattern.matches(&key) && inner.store.delete(&key) {
                        removed += 1;
                    }
                }
                inner.in_flight.retain(|key, _| !pattern.matches(key));
                removed
            }
        };

        debug!(?pattern, removed, "Invalidated cache entries");
        removed
    }

    // == Clear ==
    pub fn clear(&self) {
        let mut inner = lock(&self.inner);
        inner.store.clear();
        inner.in_flight.clear();
    }

    // == Stats ==
    pub fn stats(&self) -> CacheStats {
        let inner = lock(&self.inner);
        CacheStats {
            entry_count: inner.store.len(),
            capacity: inner.store.capacity(),
            in_flight_count: inner.in_flight.len(),
            hits: inner.store.hits(),
            misses: inner.store.misses(),
            evictions: inner.store.evictions(),
            loads: inner.loads,
            coalesced: inner.coalesced,
            load_failures: inner.load_failures,
        }
    }

    // == Cleanup Expired ==
    /// Sweeps expired entries out of the store.
    pub fn cleanup_expired(&self) -> usize {
        lock(&self.inner).store.cleanup_expired()
    }
}

/// Runs the loader, then clears its marker and stores a successful result in
/// one critical section.
///
/// A load whose marker was dropped by an invalidation is superseded once a
/// newer generation is in flight or has already stored a value, and then
/// leaves the store alone.
async fn settle<V, E, Fut>(
    inner: Weak<Mutex<Inner<V, E>>>,
    key: String,
    generation: u64,
    ttl: Option<Duration>,
    load: Fut,
) -> std::result::Result<V, E>
where
    V: Clone,
    Fut: Future<Output = std::result::Result<V, E>>,
{
    let outcome = AssertUnwindSafe(load).catch_unwind().await;

    let Some(inner) = inner.upgrade() else {
        return outcome.unwrap_or_else(|panic| std::panic::resume_unwind(panic));
    };

    {
        let mut guard = lock(&inner);
        let state = &mut *guard;

        let registered = state.in_flight.get(&key).map(|flight| flight.generation);
        let superseded = match registered {
            Some(current) if current == generation => {
                state.in_flight.remove(&key);
                false
            }
            Some(_) => true,
            None => state.store.contains(&key),
        };

        match &outcome {
            Ok(Ok(_)) if superseded => {
                debug!(key = %key, generation, "Superseded load settled, result dropped");
            }
            Ok(Ok(value)) => {
                if let Some(evicted) = state.store.set(key.clone(), value.clone(), ttl) {
                    debug!(evicted = %evicted, "Evicted least recently used entry");
                }
            }
            Ok(Err(_)) => {
                state.load_failures += 1;
                debug!(key = %key, generation, "Load failed, nothing cached");
            }
            Err(_) => {
                state.load_failures += 1;
                warn!(key = %key, generation, "Loader panicked");
            }
        }
    }

    outcome.unwrap_or_else(|panic| std::panic::resume_unwind(panic))
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
