// ABOUTME: Process-local primary+stale credential cache, LRU by insertion order
// ABOUTME: No network calls; every operation completes synchronously under a mutex
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

use super::{
    violates_pollution_guard, CacheStats, CacheStrategy, CredentialCache, CredentialCacheExt,
    OperationCounters,
};
use crate::logging::AppLogger;
use async_trait::async_trait;
use lru::LruCache;
use serde_json::Value;
use std::num::NonZeroUsize;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    created_at: Instant,
    expires: Instant,
}

impl Entry {
    fn new(value: Value, ttl: Duration) -> Self {
        let created_at = Instant::now();
        Self {
            value,
            created_at,
            expires: created_at + ttl,
        }
    }

    fn is_expired(&self) -> bool {
        Instant::now() >= self.expires
    }
}

/// The local in-process cache (C5). Bounded by `max_entries` for the primary namespace
/// and `2 * max_entries` for the stale namespace; eviction is oldest-by-insertion since
/// reads use `peek` (never promoting an entry's position).
pub struct LocalCache {
    primary: Mutex<LruCache<String, Entry>>,
    stale: Mutex<LruCache<String, Entry>>,
    primary_ttl: Duration,
    stale_ttl: Duration,
    counters: OperationCounters,
}

impl LocalCache {
    /// Construct a new local cache with the configured primary TTL and capacity. The
    /// stale TTL is `primary_ttl * LOCAL_STALE_TTL_MULTIPLIER` and stale capacity is
    /// `2 * max_entries`, per the component design.
    #[must_use]
    pub fn new(max_entries: usize, primary_ttl: Duration) -> Self {
        let primary_capacity = NonZeroUsize::new(max_entries.max(1))
            .unwrap_or_else(|| NonZeroUsize::new(crate::constants::cache::DEFAULT_MAX_ENTRIES).unwrap_or(NonZeroUsize::MIN));
        let stale_capacity = NonZeroUsize::new(
            max_entries
                .max(1)
                .saturating_mul(crate::constants::cache::LOCAL_STALE_CAPACITY_MULTIPLIER),
        )
        .unwrap_or(primary_capacity);

        Self {
            primary: Mutex::new(LruCache::new(primary_capacity)),
            stale: Mutex::new(LruCache::new(stale_capacity)),
            primary_ttl,
            stale_ttl: primary_ttl * u32::try_from(crate::constants::cache::LOCAL_STALE_TTL_MULTIPLIER).unwrap_or(24),
            counters: OperationCounters::new(),
        }
    }
}

#[async_trait]
impl CredentialCache for LocalCache {
    async fn get(&self, key: &str) -> Option<Value> {
        let started = Instant::now();
        let mut store = self.primary.lock().await;
        let result = match store.peek(key) {
            Some(entry) if entry.is_expired() => {
                store.pop(key);
                None
            }
            Some(entry) => Some(entry.value.clone()),
            None => None,
        };
        drop(store);
        self.counters.record(result.is_some(), started.elapsed());
        result
    }

    async fn set(&self, key: &str, value: Value) {
        self.set_with_ttl(key, value, self.primary_ttl).await;
    }

    async fn delete(&self, key: &str) {
        self.primary.lock().await.pop(key);
    }

    async fn clear(&self) {
        self.primary.lock().await.clear();
    }

    async fn get_stale(&self, key: &str) -> Option<Value> {
        let started = Instant::now();
        let mut store = self.stale.lock().await;
        let result = match store.peek(key) {
            Some(entry) if entry.is_expired() => {
                store.pop(key);
                None
            }
            Some(entry) => Some(entry.value.clone()),
            None => None,
        };
        drop(store);
        self.counters.record(result.is_some(), started.elapsed());
        result
    }

    async fn set_stale(&self, key: &str, value: Value) {
        let entry = Entry::new(value, self.stale_ttl);
        self.stale.lock().await.push(key.to_owned(), entry);
    }

    async fn delete_stale(&self, key: &str) {
        self.stale.lock().await.pop(key);
    }

    async fn clear_stale(&self) {
        self.stale.lock().await.clear();
    }

    async fn get_stats(&self) -> CacheStats {
        let primary = self.primary.lock().await;
        let active_entries = primary.iter().filter(|(_, e)| !e.is_expired()).count();
        let primary_entries = primary.len();
        drop(primary);
        let stale_entries = self.stale.lock().await.len();

        CacheStats {
            strategy: CacheStrategy::LocalMemory,
            primary_entries,
            active_entries,
            stale_entries,
            hit_rate: self.counters.hit_rate(),
            avg_latency_ms: self.counters.avg_latency_ms(),
            server_type: None,
        }
    }
}

#[async_trait]
impl CredentialCacheExt for LocalCache {
    async fn set_with_ttl(&self, key: &str, value: Value, ttl: Duration) {
        if violates_pollution_guard(key, &value) {
            let expected = key.strip_prefix(super::CONSUMER_SECRET_KEY_PREFIX).unwrap_or(key);
            let actual = value
                .get("consumer")
                .and_then(|c| c.get("id"))
                .and_then(Value::as_str)
                .unwrap_or("<missing>");
            AppLogger::log_pollution_prevention(key, expected, actual);
            return;
        }

        let entry = Entry::new(value.clone(), ttl);
        self.primary.lock().await.push(key.to_owned(), entry);
        self.set_stale(key, value).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn cache() -> LocalCache {
        LocalCache::new(10, Duration::from_millis(50))
    }

    #[tokio::test]
    async fn set_then_get_round_trips_within_ttl() {
        let cache = cache();
        let value = json!({"id": "j1", "key": "k1", "secret": "s1", "consumer": {"id": "c1"}});
        cache.set("consumer_secret:c1", value.clone()).await;
        assert_eq!(cache.get("consumer_secret:c1").await, Some(value));
    }

    #[tokio::test]
    async fn get_returns_none_after_expiry() {
        let cache = cache();
        cache.set("k", json!({"v": 1})).await;
        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(cache.get("k").await, None);
    }

    #[tokio::test]
    async fn delete_removes_primary_but_not_stale() {
        let cache = cache();
        let value = json!({"id": "j1", "key": "k1", "secret": "s1", "consumer": {"id": "c1"}});
        cache.set("consumer_secret:c1", value.clone()).await;
        cache.delete("consumer_secret:c1").await;
        assert_eq!(cache.get("consumer_secret:c1").await, None);
        assert_eq!(cache.get_stale("consumer_secret:c1").await, Some(value));
    }

    #[tokio::test]
    async fn delete_stale_removes_only_the_named_key() {
        let cache = cache();
        let value = json!({"id": "j1", "key": "k1", "secret": "s1", "consumer": {"id": "c1"}});
        cache.set("consumer_secret:c1", value.clone()).await;
        cache.delete_stale("consumer_secret:c1").await;
        assert_eq!(cache.get_stale("consumer_secret:c1").await, None);
    }

    #[tokio::test]
    async fn clear_empties_primary_but_leaves_stale() {
        let cache = cache();
        let value = json!({"id": "j1", "key": "k1", "secret": "s1", "consumer": {"id": "c1"}});
        cache.set("consumer_secret:c1", value.clone()).await;
        cache.clear().await;
        let stats = cache.get_stats().await;
        assert_eq!(stats.primary_entries, 0);
        assert_eq!(cache.get_stale("consumer_secret:c1").await, Some(value));
    }

    #[tokio::test]
    async fn pollution_guard_rejects_mismatched_write() {
        let cache = cache();
        let value = json!({"id": "jx", "key": "kx", "secret": "sx", "consumer": {"id": "bob"}});
        cache.set("consumer_secret:alice", value).await;
        assert_eq!(cache.get("consumer_secret:alice").await, None);
    }

    #[tokio::test]
    async fn eviction_drops_oldest_entry_once_over_capacity() {
        let cache = LocalCache::new(2, Duration::from_secs(60));
        cache.set("a", json!({"v": 1})).await;
        cache.set("b", json!({"v": 2})).await;
        cache.set("c", json!({"v": 3})).await;

        let stats = cache.get_stats().await;
        assert_eq!(stats.primary_entries, 2);
        assert_eq!(cache.get("a").await, None);
        assert!(cache.get("c").await.is_some());
    }

    #[tokio::test]
    async fn hit_rate_is_zero_with_no_operations() {
        let cache = cache();
        let stats = cache.get_stats().await;
        assert_eq!(stats.hit_rate, "0.00");
    }

    #[tokio::test]
    async fn hit_rate_tracks_hits_and_misses() {
        let cache = cache();
        cache.set("k", json!({"v": 1})).await;
        cache.get("k").await;
        cache.get("missing").await;
        let stats = cache.get_stats().await;
        assert_eq!(stats.hit_rate, "50.00");
    }
}
