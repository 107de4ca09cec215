//! Time-bucketed memoization.
//!
//! Entries carry the bucket they were computed in. A lookup with a different
//! bucket recomputes, so staleness is bounded by one period without any
//! background expiry. [`TtlCache::invalidate`] is the only way to force a
//! recomputation inside a period.

use std::{
    future::Future,
    hash::Hash,
    sync::Arc,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use moka::{future::Cache, policy::EvictionPolicy};

/// Same value for every instant inside one `period`.
///
/// A zero period never memoizes: each nanosecond is its own bucket.
pub fn ttl_bucket(now: SystemTime, period: Duration) -> u64 {
    let since_epoch = now.duration_since(UNIX_EPOCH).unwrap_or_default();
    if period.is_zero() {
        return since_epoch.as_nanos() as u64;
    }
    (since_epoch.as_secs_f64() / period.as_secs_f64()).round() as u64
}

/// Bucket for the current wall-clock time.
pub fn current_bucket(period: Duration) -> u64 {
    ttl_bucket(SystemTime::now(), period)
}

#[derive(Clone)]
struct Stamped<V> {
    bucket: u64,
    value: V,
}

/// Bounded LRU cache keyed by `K`, valid for one bucket at a time.
pub struct TtlCache<K, V> {
    inner: Cache<K, Stamped<V>>,
}

impl<K, V> Clone for TtlCache<K, V> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<K, V> std::fmt::Debug for TtlCache<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TtlCache")
            .field("entries", &self.inner.entry_count())
            .finish()
    }
}

impl<K, V> TtlCache<K, V>
where
    K: Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub fn new(capacity: u64) -> Self {
        debug_assert!(capacity > 0);
        let inner = Cache::builder()
            .max_capacity(capacity.max(1))
            .eviction_policy(EvictionPolicy::lru())
            .build();
        Self { inner }
    }

    /// Returns the value cached for `key` in `bucket`, computing it on a miss.
    ///
    /// Concurrent misses for the same key share one `compute`. Failures are
    /// not cached.
    pub async fn get_or_compute<F, Fut, E>(&self, key: K, bucket: u64, compute: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
        E: Clone + Send + Sync + 'static,
    {
        if let Some(hit) = self.inner.get(&key).await {
            if hit.bucket == bucket {
                return Ok(hit.value);
            }
            self.inner.invalidate(&key).await;
        }

        let loader = async move {
            let value = compute().await?;
            Ok::<Stamped<V>, E>(Stamped { bucket, value })
        };

        match self.inner.try_get_with(key, loader).await {
            Ok(stamped) => Ok(stamped.value),
            Err(error) => Err(Arc::try_unwrap(error).unwrap_or_else(|arc| arc.as_ref().clone())),
        }
    }

    /// Drops the entry for `key` regardless of its bucket.
    pub async fn invalidate(&self, key: &K) {
        self.inner.invalidate(key).await;
    }

    pub async fn contains(&self, key: &K) -> bool {
        self.inner.get(key).await.is_some()
    }
}
