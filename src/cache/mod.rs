// ABOUTME: Two-tier credential cache abstraction: primary + stale namespaces over a pluggable backend
// ABOUTME: get/set/delete/clear/getStats/getStale/setStale/clearStale, generic over a JSON payload
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

/// Cache backend selection (local in-process vs shared Redis/Valkey).
pub mod factory;
/// Local in-process primary+stale cache with LRU-by-insertion eviction.
pub mod memory;
/// Shared Redis/Valkey backend with connection lifecycle, timeouts, and SCAN-based cleanup.
pub mod redis;
/// Cursor-based SCAN iteration with per-call timeout and bounded retries.
pub mod scan;

use async_trait::async_trait;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Prefix applied to credential cache keys before the consumer id, e.g. `consumer_secret:c1`.
pub const CONSUMER_SECRET_KEY_PREFIX: &str = crate::constants::cache::CONSUMER_SECRET_KEY_PREFIX;

/// Build the canonical cache key for a consumer's credential.
#[must_use]
pub fn consumer_secret_key(consumer_id: &str) -> String {
    format!("{CONSUMER_SECRET_KEY_PREFIX}{consumer_id}")
}

/// Which backend strategy a cache instance is using, reported by `getStats`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStrategy {
    /// Process-local in-memory cache.
    LocalMemory,
    /// Shared Redis/Valkey backend.
    SharedRedis,
}

impl CacheStrategy {
    /// The strategy tag as reported by `getStats`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::LocalMemory => "local-memory",
            Self::SharedRedis => "shared-redis",
        }
    }
}

/// The underlying server a shared backend is talking to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerType {
    /// Redis.
    Redis,
    /// Valkey (Redis-protocol-compatible fork).
    Valkey,
}

impl ServerType {
    /// The server type tag as reported by `getStats`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Redis => "redis",
            Self::Valkey => "valkey",
        }
    }
}

/// Snapshot of cache usage and performance, as returned by `getStats`.
#[derive(Debug, Clone)]
pub struct CacheStats {
    /// Which backend is serving requests.
    pub strategy: CacheStrategy,
    /// Number of entries currently in the primary namespace.
    pub primary_entries: usize,
    /// Estimated number of primary entries that have not yet expired.
    pub active_entries: usize,
    /// Number of entries currently in the stale namespace.
    pub stale_entries: usize,
    /// `hits / (hits + misses) * 100`, formatted to two decimals (`"0.00"` when no samples).
    pub hit_rate: String,
    /// Average operation latency, in milliseconds.
    pub avg_latency_ms: f64,
    /// The underlying server type, when the backend is shared.
    pub server_type: Option<ServerType>,
}

/// Format a hit/miss count pair as the fixed-point hit-rate percentage `getStats` reports.
#[must_use]
pub fn format_hit_rate(hits: u64, misses: u64) -> String {
    let total = hits + misses;
    if total == 0 {
        return "0.00".to_owned();
    }
    format!("{:.2}", (hits as f64 / total as f64) * 100.0)
}

/// Whether writing `value` under `key` would violate the pollution guard: a credential
/// entry's `consumer.id` field must match the consumer id embedded in its own key.
///
/// Keys outside the `consumer_secret:` namespace, and payloads without a `consumer.id`
/// field, are never considered polluting (the guard only protects credential entries).
#[must_use]
pub fn violates_pollution_guard(key: &str, value: &Value) -> bool {
    let Some(expected_id) = key.strip_prefix(CONSUMER_SECRET_KEY_PREFIX) else {
        return false;
    };
    let Some(actual_id) = value.get("consumer").and_then(|c| c.get("id")).and_then(Value::as_str)
    else {
        return false;
    };
    actual_id != expected_id
}

/// Two-tier (primary + stale) credential cache, backed by either the local in-process
/// store or a shared Redis/Valkey connection.
///
/// Every method is infallible from the caller's perspective: misses, expired entries,
/// and backend errors all collapse to `None` / a no-op, per the "MUST NOT raise"
/// guarantee in the component design. Implementations record a hit/miss/latency sample
/// for every `get`/`get_stale` call regardless of outcome.
#[async_trait]
pub trait CredentialCache: Send + Sync {
    /// Fetch a primary entry. Returns `None` on miss, expiry, or backend error.
    async fn get(&self, key: &str) -> Option<Value>;

    /// Store a primary entry (and its stale shadow) with the cache's configured TTLs.
    /// Silently refuses the write (recording a `cache_pollution_prevention` event) if
    /// the pollution guard fires.
    async fn set(&self, key: &str, value: Value);

    /// Remove a primary entry. The stale shadow is left untouched.
    async fn delete(&self, key: &str);

    /// Remove every primary entry.
    async fn clear(&self);

    /// Fetch a stale entry. Returns `None` on miss, expiry, or backend error.
    async fn get_stale(&self, key: &str) -> Option<Value>;

    /// Store a stale entry directly, bypassing the primary namespace.
    async fn set_stale(&self, key: &str, value: Value);

    /// Remove a single stale entry.
    async fn delete_stale(&self, key: &str);

    /// Remove every stale entry.
    async fn clear_stale(&self);

    /// Snapshot current usage and performance counters.
    async fn get_stats(&self) -> CacheStats;
}

/// Extension point for backends that expose a tunable TTL per write (the local cache and
/// the Redis cache both default to the configured primary TTL when `None` is passed).
#[async_trait]
pub trait CredentialCacheExt: CredentialCache {
    /// Store a primary entry with an explicit TTL override.
    async fn set_with_ttl(&self, key: &str, value: Value, ttl: Duration);
}

/// Hit/miss/latency bookkeeping shared by the local and Redis backends' `getStats`.
pub(crate) struct OperationCounters {
    hits: AtomicU64,
    misses: AtomicU64,
    latency_sum_micros: AtomicU64,
    latency_samples: AtomicU64,
}

impl OperationCounters {
    pub(crate) fn new() -> Self {
        Self {
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            latency_sum_micros: AtomicU64::new(0),
            latency_samples: AtomicU64::new(0),
        }
    }

    pub(crate) fn record(&self, hit: bool, elapsed: Duration) {
        if hit {
            self.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }
        self.latency_sum_micros
            .fetch_add(elapsed.as_micros() as u64, Ordering::Relaxed);
        self.latency_samples.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn hit_rate(&self) -> String {
        format_hit_rate(self.hits.load(Ordering::Relaxed), self.misses.load(Ordering::Relaxed))
    }

    pub(crate) fn avg_latency_ms(&self) -> f64 {
        let samples = self.latency_samples.load(Ordering::Relaxed);
        if samples == 0 {
            return 0.0;
        }
        let sum_micros = self.latency_sum_micros.load(Ordering::Relaxed);
        (sum_micros as f64 / samples as f64) / 1000.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn consumer_secret_key_matches_canonical_form() {
        assert_eq!(consumer_secret_key("c1"), "consumer_secret:c1");
    }

    #[test]
    fn pollution_guard_rejects_mismatched_consumer_id() {
        let value = json!({"id": "jx", "key": "kx", "secret": "sx", "consumer": {"id": "bob"}});
        assert!(violates_pollution_guard("consumer_secret:alice", &value));
    }

    #[test]
    fn pollution_guard_allows_matching_consumer_id() {
        let value = json!({"id": "j1", "key": "k1", "secret": "s1", "consumer": {"id": "alice"}});
        assert!(!violates_pollution_guard("consumer_secret:alice", &value));
    }

    #[test]
    fn pollution_guard_ignores_keys_outside_credential_namespace() {
        let value = json!({"consumer": {"id": "bob"}});
        assert!(!violates_pollution_guard("some_other_key", &value));
    }

    #[test]
    fn hit_rate_formats_to_two_decimals() {
        assert_eq!(format_hit_rate(0, 0), "0.00");
        assert_eq!(format_hit_rate(1, 1), "50.00");
        assert_eq!(format_hit_rate(1, 2), "33.33");
    }
}
