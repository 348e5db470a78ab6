//! Tests for [`ResponseCache`] — TTL expiry, LRU capacity, and concurrent use.

use std::time::Duration;

use inatproxy::cache::{CacheConfig, ResponseCache};
use serde_json::json;

// =========================================================================
// CacheConfig
// =========================================================================

#[test]
fn cache_config_builder() {
    let config = CacheConfig::new()
        .max_entries(500)
        .ttl(Duration::from_secs(60));
    assert_eq!(config.max_entries, 500);
    assert_eq!(config.ttl, Duration::from_secs(60));
}

// =========================================================================
// TTL
// =========================================================================

#[tokio::test]
async fn entry_hits_before_ttl_and_misses_after() {
    let cache = ResponseCache::new(&CacheConfig::new().ttl(Duration::from_millis(200)));
    cache.insert("k".into(), json!({"page": 1})).await;

    assert_eq!(cache.get("k").await, Some(json!({"page": 1})));

    // moka keeps its own clock, so this must be a real sleep
    tokio::time::sleep(Duration::from_millis(400)).await;
    assert!(cache.get("k").await.is_none());
}

#[tokio::test]
async fn overwrite_restarts_ttl() {
    let cache = ResponseCache::new(&CacheConfig::new().ttl(Duration::from_millis(300)));
    cache.insert("k".into(), json!(1)).await;
    tokio::time::sleep(Duration::from_millis(200)).await;
    cache.insert("k".into(), json!(2)).await;
    tokio::time::sleep(Duration::from_millis(200)).await;

    assert_eq!(cache.get("k").await, Some(json!(2)));
}

// =========================================================================
// Capacity
// =========================================================================

#[tokio::test]
async fn over_capacity_evicts_least_recently_used() {
    let cache = ResponseCache::new(&CacheConfig::new().max_entries(3));

    for key in ["a", "b", "c"] {
        cache.insert(key.into(), json!(key)).await;
        cache.run_pending_tasks().await;
    }

    // touch "a" so "b" becomes the least recently used
    assert!(cache.get("a").await.is_some());
    cache.run_pending_tasks().await;

    cache.insert("d".into(), json!("d")).await;
    cache.run_pending_tasks().await;

    assert_eq!(cache.entry_count(), 3);
    assert!(cache.get("b").await.is_none(), "LRU entry should be evicted");
    for key in ["a", "c", "d"] {
        assert!(cache.get(key).await.is_some(), "{key} should survive");
    }
}

#[tokio::test]
async fn eviction_is_silent() {
    let cache = ResponseCache::new(&CacheConfig::new().max_entries(1));
    cache.insert("first".into(), json!(1)).await;
    cache.run_pending_tasks().await;
    cache.insert("second".into(), json!(2)).await;
    cache.run_pending_tasks().await;

    assert_eq!(cache.entry_count(), 1);
    assert_eq!(cache.get("second").await, Some(json!(2)));
}

// =========================================================================
// Concurrency
// =========================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_inserts_respect_capacity() {
    let cache = ResponseCache::new(&CacheConfig::new().max_entries(16));

    let mut handles = Vec::new();
    for worker in 0..8 {
        let cache = cache.clone();
        handles.push(tokio::spawn(async move {
            for i in 0..50 {
                let key = format!("w{worker}-{i}");
                cache.insert(key.clone(), json!(i)).await;
                if let Some(value) = cache.get(&key).await {
                    assert_eq!(value, json!(i));
                }
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    cache.run_pending_tasks().await;
    assert!(cache.entry_count() <= 16);
}
