//! Response cache for upstream JSON documents.
//!
//! [`ResponseCache`] holds decoded upstream bodies keyed by the canonical
//! request key from [`cache_key`](crate::types::params::cache_key). Entries
//! expire a fixed TTL after insertion; at capacity the least-recently-used
//! entry is evicted to admit a new one.
//!
//! # Architecture
//!
//! The cache sits in [`Fetcher`](crate::Fetcher) in front of the
//! concurrency gate. A hit bypasses the gate, the retry loop and the
//! network entirely. Hit/miss metrics are emitted here, not by the fetcher.
//!
//! Backed by moka's async cache with the LRU eviction policy. moka applies
//! evictions in batched maintenance passes, so `entry_count()` can briefly
//! lag; call [`ResponseCache::run_pending_tasks`] to settle it.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use moka::policy::EvictionPolicy;
use serde_json::Value;

use crate::telemetry;

/// Configuration for the response cache.
///
/// ```rust
/// # use inatproxy::CacheConfig;
/// # use std::time::Duration;
/// let config = CacheConfig::new()
///     .max_entries(256)
///     .ttl(Duration::from_secs(10));
/// ```
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum number of cached entries. Default: 1,024.
    pub max_entries: u64,
    /// Time-to-live, measured from insertion. Default: 30s.
    pub ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 1_024,
            ttl: Duration::from_secs(30),
        }
    }
}

impl CacheConfig {
    /// Create a new config with the default capacity and TTL.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum number of cached entries.
    pub fn max_entries(mut self, n: u64) -> Self {
        self.max_entries = n;
        self
    }

    /// Set the time-to-live for cached entries.
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }
}

/// In-memory TTL + LRU cache of upstream JSON bodies.
///
/// Cheap to clone; clones share the same storage.
#[derive(Clone)]
pub struct ResponseCache {
    cache: Cache<String, Value>,
}

impl ResponseCache {
    /// Create a new response cache with the given configuration.
    pub fn new(config: &CacheConfig) -> Self {
        let cache = Cache::builder()
            .max_capacity(config.max_entries)
            .time_to_live(config.ttl)
            .eviction_policy(EvictionPolicy::lru())
            .build();
        Self { cache }
    }

    /// Look up a cached body.
    ///
    /// Returns `None` on miss or once the entry's TTL has elapsed.
    pub async fn get(&self, key: &str) -> Option<Value> {
        match self.cache.get(key).await {
            Some(value) => {
                metrics::counter!(telemetry::CACHE_HITS_TOTAL).increment(1);
                Some(value)
            }
            None => {
                metrics::counter!(telemetry::CACHE_MISSES_TOTAL).increment(1);
                None
            }
        }
    }

    /// Insert (or overwrite) a body. May silently evict another entry.
    pub async fn insert(&self, key: String, value: Value) {
        self.cache.insert(key, value).await;
    }

    /// Resolve `key` through `init`, letting concurrent callers for the
    /// same key share a single `init` run. Errors are returned to every
    /// waiter and never cached.
    pub(crate) async fn get_or_try_insert_with<F, E>(
        &self,
        key: String,
        init: F,
    ) -> std::result::Result<Value, Arc<E>>
    where
        F: Future<Output = std::result::Result<Value, E>>,
        E: Send + Sync + 'static,
    {
        self.cache.try_get_with(key, init).await
    }

    /// Number of entries currently held (may lag until maintenance runs).
    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }

    /// Run pending eviction and expiry maintenance.
    pub async fn run_pending_tasks(&self) {
        self.cache.run_pending_tasks().await;
    }

    /// Evict all entries.
    pub fn invalidate_all(&self) {
        self.cache.invalidate_all();
    }
}
