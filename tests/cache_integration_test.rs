// ABOUTME: Black-box integration tests for the two-tier credential cache facade (C4)
// ABOUTME: Exercises the public `Cache` enum the way a consumer crate would, local backend only
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

use kong_credential_cache::cache::factory::Cache;
use kong_credential_cache::cache::{consumer_secret_key, CacheStrategy, CredentialCache, CredentialCacheExt};
use kong_credential_cache::config::CachingConfig;
use serde_json::json;
use std::time::Duration;

fn local_config() -> CachingConfig {
    CachingConfig {
        max_entries: 10,
        ..CachingConfig::default()
    }
}

#[tokio::test]
async fn default_config_selects_the_local_backend() {
    let cache = Cache::new(&local_config()).await.expect("local cache builds without a connection");
    assert_eq!(cache.strategy(), CacheStrategy::LocalMemory);
    assert!(cache.breaker().is_none());
    assert!(cache.ping().await);
}

#[tokio::test]
async fn set_then_get_round_trips_through_the_facade() {
    let cache = Cache::new(&local_config()).await.expect("builds");
    let key = consumer_secret_key("c1");
    let value = json!({"id": "j1", "key": "k1", "secret": "s1", "consumer": {"id": "c1"}});

    cache.set(&key, value.clone()).await;
    assert_eq!(cache.get(&key).await, Some(value));
}

#[tokio::test]
async fn delete_clears_primary_but_leaves_the_stale_entry_for_fallback() {
    let cache = Cache::new(&local_config()).await.expect("builds");
    let key = consumer_secret_key("c1");
    let value = json!({"id": "j1", "key": "k1", "secret": "s1", "consumer": {"id": "c1"}});

    cache.set(&key, value.clone()).await;
    cache.delete(&key).await;

    assert_eq!(cache.get(&key).await, None);
    assert_eq!(cache.get_stale(&key).await, Some(value));
}

#[tokio::test]
async fn delete_stale_removes_only_the_named_stale_entry() {
    let cache = Cache::new(&local_config()).await.expect("builds");
    let key_a = consumer_secret_key("a");
    let key_b = consumer_secret_key("b");
    let value_a = json!({"id": "ja", "key": "ka", "secret": "sa", "consumer": {"id": "a"}});
    let value_b = json!({"id": "jb", "key": "kb", "secret": "sb", "consumer": {"id": "b"}});

    cache.set(&key_a, value_a).await;
    cache.set(&key_b, value_b.clone()).await;
    cache.delete_stale(&key_a).await;

    assert_eq!(cache.get_stale(&key_a).await, None);
    assert_eq!(cache.get_stale(&key_b).await, Some(value_b));
}

#[tokio::test]
async fn clear_empties_every_primary_entry() {
    let cache = Cache::new(&local_config()).await.expect("builds");
    for i in 0..5 {
        cache.set(&consumer_secret_key(&i.to_string()), json!({"v": i})).await;
    }
    cache.clear().await;

    let stats = cache.get_stats().await;
    assert_eq!(stats.primary_entries, 0);
    assert_eq!(stats.strategy, CacheStrategy::LocalMemory);
}

#[tokio::test]
async fn pollution_guard_rejects_a_credential_cached_under_the_wrong_consumer_id() {
    let cache = Cache::new(&local_config()).await.expect("builds");
    let key = consumer_secret_key("alice");
    let value = json!({"id": "j1", "key": "k1", "secret": "s1", "consumer": {"id": "mallory"}});

    cache.set_with_ttl(&key, value, Duration::from_secs(60)).await;
    assert_eq!(cache.get(&key).await, None);
}

#[tokio::test]
async fn high_availability_without_a_redis_url_fails_construction() {
    let mut config = local_config();
    config.high_availability = true;
    config.redis_url = None;
    assert!(Cache::new(&config).await.is_err());
}
