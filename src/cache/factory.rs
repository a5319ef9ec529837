// ABOUTME: Cache backend selection: local in-process vs shared Redis/Valkey (C4)
// ABOUTME: Picks the backend from CachingConfig.high_availability, never mixing the two
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

use super::memory::LocalCache;
use super::redis::RedisCache;
use super::{CredentialCache, CredentialCacheExt};
use crate::config::cache::CachingConfig;
use crate::errors::AppResult;
use crate::resilience::CircuitBreaker;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// The two-tier credential cache (C4), backed by whichever strategy
/// `CachingConfig.high_availability` selects.
pub enum Cache {
    /// Process-local in-memory backend (C5).
    Local(LocalCache),
    /// Shared Redis/Valkey backend (C6).
    Shared(RedisCache),
}

impl Cache {
    /// Build the configured backend. `high_availability = true` selects the shared Redis
    /// backend and requires `redis_url`; otherwise the local in-process cache is used.
    ///
    /// # Errors
    ///
    /// Returns an error if the shared backend is selected but the initial connection
    /// cannot be established within the configured reconnect policy.
    pub async fn new(config: &CachingConfig) -> AppResult<Self> {
        if config.high_availability {
            Ok(Self::Shared(RedisCache::new(config).await?))
        } else {
            Ok(Self::Local(LocalCache::new(config.max_entries, config.primary_ttl())))
        }
    }

    /// The cache circuit breaker (C8), when the shared backend is in use. The local
    /// backend makes no network calls and has no breaker to trip.
    #[must_use]
    pub fn breaker(&self) -> Option<Arc<CircuitBreaker>> {
        match self {
            Self::Local(_) => None,
            Self::Shared(redis) => Some(redis.breaker()),
        }
    }

    /// Issue a health-monitor `PING`. Always healthy for the local backend.
    pub async fn ping(&self) -> bool {
        match self {
            Self::Local(_) => true,
            Self::Shared(redis) => redis.ping().await,
        }
    }

    /// Which strategy is currently active.
    #[must_use]
    pub const fn strategy(&self) -> super::CacheStrategy {
        match self {
            Self::Local(_) => super::CacheStrategy::LocalMemory,
            Self::Shared(_) => super::CacheStrategy::SharedRedis,
        }
    }
}

#[async_trait]
impl CredentialCache for Cache {
    async fn get(&self, key: &str) -> Option<Value> {
        match self {
            Self::Local(cache) => cache.get(key).await,
            Self::Shared(cache) => cache.get(key).await,
        }
    }

    async fn set(&self, key: &str, value: Value) {
        match self {
            Self::Local(cache) => cache.set(key, value).await,
            Self::Shared(cache) => cache.set(key, value).await,
        }
    }

    async fn delete(&self, key: &str) {
        match self {
            Self::Local(cache) => cache.delete(key).await,
            Self::Shared(cache) => cache.delete(key).await,
        }
    }

    async fn clear(&self) {
        match self {
            Self::Local(cache) => cache.clear().await,
            Self::Shared(cache) => cache.clear().await,
        }
    }

    async fn get_stale(&self, key: &str) -> Option<Value> {
        match self {
            Self::Local(cache) => cache.get_stale(key).await,
            Self::Shared(cache) => cache.get_stale(key).await,
        }
    }

    async fn set_stale(&self, key: &str, value: Value) {
        match self {
            Self::Local(cache) => cache.set_stale(key, value).await,
            Self::Shared(cache) => cache.set_stale(key, value).await,
        }
    }

    async fn delete_stale(&self, key: &str) {
        match self {
            Self::Local(cache) => cache.delete_stale(key).await,
            Self::Shared(cache) => cache.delete_stale(key).await,
        }
    }

    async fn clear_stale(&self) {
        match self {
            Self::Local(cache) => cache.clear_stale().await,
            Self::Shared(cache) => cache.clear_stale().await,
        }
    }

    async fn get_stats(&self) -> super::CacheStats {
        match self {
            Self::Local(cache) => cache.get_stats().await,
            Self::Shared(cache) => cache.get_stats().await,
        }
    }
}

#[async_trait]
impl CredentialCacheExt for Cache {
    async fn set_with_ttl(&self, key: &str, value: Value, ttl: Duration) {
        match self {
            Self::Local(cache) => cache.set_with_ttl(key, value, ttl).await,
            Self::Shared(cache) => cache.set_with_ttl(key, value, ttl).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn local_strategy_is_selected_by_default() {
        let config = CachingConfig::default();
        let cache = Cache::new(&config).await.expect("local cache never fails to construct");
        assert_eq!(cache.strategy(), super::super::CacheStrategy::LocalMemory);
        assert!(cache.breaker().is_none());
    }

    #[tokio::test]
    async fn high_availability_without_redis_url_is_rejected() {
        let mut config = CachingConfig::default();
        config.high_availability = true;
        config.redis_url = None;
        let result = Cache::new(&config).await;
        assert!(result.is_err());
    }
}
