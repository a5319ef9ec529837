// ABOUTME: Shared Redis/Valkey credential cache backend (C6): breaker-gated, manually reconnected
// ABOUTME: Auto-reconnect on the underlying client is intentionally disabled; C7 owns recovery
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

use super::scan::{ScanConfig, ScanIterator};
use super::{
    violates_pollution_guard, CacheStats, CacheStrategy, CredentialCache, CredentialCacheExt,
    OperationCounters, ServerType,
};
use crate::config::cache::{CachingConfig, OperationTimeoutsConfig};
use crate::constants::cache as cache_constants;
use crate::errors::{AppError, AppResult, ErrorCode};
use crate::logging::AppLogger;
use crate::resilience::classify::ErrorCategory;
use crate::resilience::{classify_error, with_timeout, CircuitBreaker, ReconnectManager};
use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

fn primary_key(key: &str) -> String {
    format!("{}{key}", cache_constants::PRIMARY_KEY_PREFIX)
}

fn stale_key(key: &str) -> String {
    format!("{}{key}", cache_constants::STALE_KEY_PREFIX)
}

const fn category_label(category: ErrorCategory) -> &'static str {
    match category {
        ErrorCategory::Infrastructure => "infrastructure",
        ErrorCategory::Business => "business",
        ErrorCategory::Connection => "connection",
    }
}

/// The shared Redis/Valkey credential cache (C6). Holds a single multiplexed connection
/// behind a mutex, established and re-established manually via `ReconnectManager` (C7) —
/// the redis crate's own `ConnectionManager` auto-reconnect is never used, so a broken
/// connection is a visible, breaker-observed failure rather than silent offline queueing.
pub struct RedisCache {
    client: redis::Client,
    conn: Mutex<Option<MultiplexedConnection>>,
    breaker: Arc<CircuitBreaker>,
    reconnect: ReconnectManager,
    timeouts: OperationTimeoutsConfig,
    primary_ttl: Duration,
    stale_ttl: Duration,
    db: i64,
    password: Option<String>,
    counters: OperationCounters,
}

impl RedisCache {
    /// Open a client for `config.redis_url` and establish the initial connection.
    ///
    /// # Errors
    ///
    /// Returns an error if `redis_url` is absent, malformed, or the initial connection
    /// attempt does not succeed within the configured reconnect policy.
    pub async fn new(config: &CachingConfig) -> AppResult<Self> {
        let url = config
            .redis_url
            .clone()
            .ok_or_else(|| AppError::config_invalid("redis_url is required for the shared cache backend"))?;
        let client = redis::Client::open(url.as_str()).map_err(AppError::from)?;

        let cache = Self {
            client,
            conn: Mutex::new(None),
            breaker: Arc::new(CircuitBreaker::new(
                "cache",
                config.resilience.circuit_breaker.clone(),
            )),
            reconnect: ReconnectManager::new(config.resilience.reconnect.clone()),
            timeouts: config.resilience.operation_timeouts.clone(),
            primary_ttl: config.primary_ttl(),
            stale_ttl: config.stale_tolerance(),
            db: config.redis_db,
            password: config.redis_password.clone(),
            counters: OperationCounters::new(),
        };

        cache.ensure_connected().await?;
        Ok(cache)
    }

    /// The cache circuit breaker (C8), shared with the health monitor (C9) so a failing
    /// PING probe can trip it even without any in-flight cache operation.
    #[must_use]
    pub fn breaker(&self) -> Arc<CircuitBreaker> {
        self.breaker.clone()
    }

    /// Issue a `PING` through the health-monitor path: bypasses the breaker gate (the
    /// breaker is what the probe result feeds into) but still uses the managed connection.
    pub async fn ping(&self) -> bool {
        if self.ensure_connected().await.is_err() {
            return false;
        }
        let mut guard = self.conn.lock().await;
        let Some(conn) = guard.as_mut() else {
            return false;
        };
        let timeout = Duration::from_millis(self.timeouts.ping_ms);
        let result = with_timeout("ping", timeout, async {
            redis::cmd("PING")
                .query_async::<String>(conn)
                .await
                .map_err(AppError::from)
        })
        .await;
        drop(guard);
        match result {
            Ok(response) => response.eq_ignore_ascii_case("PONG"),
            Err(_) => {
                *self.conn.lock().await = None;
                false
            }
        }
    }

    /// Identify the connected server as Redis or Valkey via `INFO server`.
    pub async fn get_server_type(&self) -> Option<ServerType> {
        let result = self
            .with_connection("info", move |conn| {
                Box::pin(async move {
                    redis::cmd("INFO")
                        .arg("server")
                        .query_async::<String>(conn)
                        .await
                        .map_err(AppError::from)
                })
            })
            .await;

        result.ok().map(|info| {
            if info.to_lowercase().contains("valkey") {
                ServerType::Valkey
            } else {
                ServerType::Redis
            }
        })
    }

    async fn connect_once(&self) -> AppResult<()> {
        let timeout = Duration::from_millis(self.timeouts.connect_ms);
        let mut conn = with_timeout("connect", timeout, async {
            self.client
                .get_multiplexed_async_connection()
                .await
                .map_err(AppError::from)
        })
        .await?;

        if let Some(password) = self.password.as_ref().filter(|p| !p.is_empty()) {
            redis::cmd("AUTH")
                .arg(password)
                .query_async::<()>(&mut conn)
                .await
                .map_err(AppError::from)?;
        }
        if self.db > 0 {
            redis::cmd("SELECT")
                .arg(self.db)
                .query_async::<()>(&mut conn)
                .await
                .map_err(AppError::from)?;
        }

        let pong = with_timeout("connect", timeout, async {
            redis::cmd("PING")
                .query_async::<String>(&mut conn)
                .await
                .map_err(AppError::from)
        })
        .await?;
        if !pong.eq_ignore_ascii_case("PONG") {
            return Err(AppError::connection_lost(format!("unexpected PING reply: {pong}")));
        }

        *self.conn.lock().await = Some(conn);
        Ok(())
    }

    async fn ensure_connected(&self) -> AppResult<()> {
        if self.conn.lock().await.is_some() {
            return Ok(());
        }
        let stats = self.reconnect.execute_reconnect(|| self.connect_once()).await;
        if stats.success {
            Ok(())
        } else {
            Err(AppError::connection_lost(
                stats.error.unwrap_or_else(|| "reconnect attempts exhausted".to_owned()),
            ))
        }
    }

    /// Check the breaker, ensure a live connection, and hand it to `action` — but apply
    /// no per-call timeout of its own. Used by multi-call aggregate operations (`clear`,
    /// `getStats`) that manage their own timeouts internally (each `SCAN` call already
    /// carries one via `ScanConfig`).
    async fn with_connection<T, F>(&self, operation: &str, action: F) -> AppResult<T>
    where
        F: for<'c> FnOnce(&'c mut MultiplexedConnection) -> Pin<Box<dyn Future<Output = AppResult<T>> + Send + 'c>>,
    {
        if !self.breaker.can_execute().await {
            return Err(AppError::upstream_unavailable("cache circuit breaker open"));
        }

        if let Err(err) = self.ensure_connected().await {
            self.breaker.record_failure().await;
            return Err(err);
        }

        let mut guard = self.conn.lock().await;
        let Some(conn) = guard.as_mut() else {
            drop(guard);
            let err = AppError::connection_lost("no active redis connection");
            self.handle_failure(operation, &err).await;
            return Err(err);
        };

        let result = action(conn).await;
        drop(guard);

        match &result {
            Ok(_) => self.breaker.record_success().await,
            Err(err) => self.handle_failure(operation, err).await,
        }

        result
    }

    /// As `with_connection`, but additionally races the action against `timeout_ms` — the
    /// contract for single-call operations (`get`, `set`, `delete`).
    async fn execute<T, F>(&self, operation: &'static str, timeout_ms: u64, action: F) -> AppResult<T>
    where
        T: Send + 'static,
        F: for<'c> FnOnce(&'c mut MultiplexedConnection) -> Pin<Box<dyn Future<Output = AppResult<T>> + Send + 'c>>
            + Send
            + 'static,
    {
        let timeout = Duration::from_millis(timeout_ms);
        self.with_connection(operation, move |conn| {
            Box::pin(with_timeout(operation, timeout, action(conn)))
        })
        .await
    }

    async fn handle_failure(&self, operation: &str, err: &AppError) {
        let is_timeout = err.code == ErrorCode::TimeoutExceeded;
        let classification = classify_error(None, &err.message);

        if is_timeout {
            self.breaker.record_timeout().await;
        } else if classification.trips_breaker() {
            self.breaker.record_failure().await;
        }

        if is_timeout || classification.should_reconnect || err.code == ErrorCode::ConnectionLost {
            *self.conn.lock().await = None;
        }

        AppLogger::log_cache_op(
            operation,
            category_label(classification.category),
            classification.is_recoverable,
            &err.message,
        );
    }

    async fn get_namespaced(&self, operation: &'static str, timeout_ms: u64, key: String) -> Option<Value> {
        let started = Instant::now();
        let result = self
            .execute(operation, timeout_ms, move |conn| {
                Box::pin(async move {
                    let raw: Option<String> = conn.get(&key).await.map_err(AppError::from)?;
                    match raw {
                        Some(data) => serde_json::from_str(&data).map(Some).map_err(AppError::from),
                        None => Ok(None),
                    }
                })
            })
            .await;

        let value = result.unwrap_or(None);
        self.counters.record(value.is_some(), started.elapsed());
        value
    }

    async fn set_namespaced(
        &self,
        operation: &'static str,
        timeout_ms: u64,
        key: String,
        value: &Value,
        ttl: Duration,
    ) -> bool {
        let Ok(serialized) = serde_json::to_string(value) else {
            return false;
        };
        let ttl_secs = ttl.as_secs().max(1);

        self.execute(operation, timeout_ms, move |conn| {
            Box::pin(async move {
                conn.set_ex::<_, _, ()>(&key, serialized, ttl_secs)
                    .await
                    .map_err(AppError::from)
            })
        })
        .await
        .is_ok()
    }
}

#[async_trait]
impl CredentialCache for RedisCache {
    async fn get(&self, key: &str) -> Option<Value> {
        self.get_namespaced("get", self.timeouts.get_ms, primary_key(key)).await
    }

    async fn set(&self, key: &str, value: Value) {
        self.set_with_ttl(key, value, self.primary_ttl).await;
    }

    async fn delete(&self, key: &str) {
        let full_key = primary_key(key);
        let _ = self
            .execute("delete", self.timeouts.delete_ms, move |conn| {
                Box::pin(async move { conn.del::<_, ()>(&full_key).await.map_err(AppError::from) })
            })
            .await;
    }

    async fn clear(&self) {
        let pattern = format!("{}*", cache_constants::PRIMARY_KEY_PREFIX);
        let scan_timeout = Duration::from_millis(self.timeouts.scan_ms);
        let _ = self
            .with_connection("clear", move |conn| {
                Box::pin(async move {
                    let config = ScanConfig::new(pattern, scan_timeout);
                    let mut iterator = ScanIterator::new(conn, config);
                    let stats = iterator.delete_all().await;
                    stats
                        .error
                        .map_or(Ok(()), |error| Err(AppError::internal(format!("scan clear incomplete: {error}"))))
                })
            })
            .await;
    }

    async fn get_stale(&self, key: &str) -> Option<Value> {
        self.get_namespaced("get_stale", self.timeouts.get_ms, stale_key(key)).await
    }

    async fn set_stale(&self, key: &str, value: Value) {
        self.set_namespaced("set_stale", self.timeouts.set_ms, stale_key(key), &value, self.stale_ttl)
            .await;
    }

    async fn delete_stale(&self, key: &str) {
        let full_key = stale_key(key);
        let _ = self
            .execute("delete_stale", self.timeouts.delete_ms, move |conn| {
                Box::pin(async move { conn.del::<_, ()>(&full_key).await.map_err(AppError::from) })
            })
            .await;
    }

    async fn clear_stale(&self) {
        let pattern = format!("{}*", cache_constants::STALE_KEY_PREFIX);
        let scan_timeout = Duration::from_millis(self.timeouts.scan_ms);
        let _ = self
            .with_connection("clear_stale", move |conn| {
                Box::pin(async move {
                    let config = ScanConfig::new(pattern, scan_timeout);
                    let mut iterator = ScanIterator::new(conn, config);
                    let stats = iterator.delete_all().await;
                    stats.error.map_or(Ok(()), |error| {
                        Err(AppError::internal(format!("scan clear_stale incomplete: {error}")))
                    })
                })
            })
            .await;
    }

    async fn get_stats(&self) -> CacheStats {
        let scan_timeout = Duration::from_millis(self.timeouts.scan_ms);

        let primary_pattern = format!("{}*", cache_constants::PRIMARY_KEY_PREFIX);
        let primary_entries = self
            .with_connection("stats_count_primary", move |conn| {
                Box::pin(async move {
                    let config = ScanConfig::new(primary_pattern, scan_timeout);
                    Ok(ScanIterator::new(conn, config).count().await)
                })
            })
            .await
            .unwrap_or(0);

        let stale_pattern = format!("{}*", cache_constants::STALE_KEY_PREFIX);
        let stale_entries = self
            .with_connection("stats_count_stale", move |conn| {
                Box::pin(async move {
                    let config = ScanConfig::new(stale_pattern, scan_timeout);
                    Ok(ScanIterator::new(conn, config).count().await)
                })
            })
            .await
            .unwrap_or(0);

        let active_ratio = self
            .with_connection("stats_sample_ttl", move |conn| {
                Box::pin(async move {
                    let pattern = format!("{}*", cache_constants::PRIMARY_KEY_PREFIX);
                    let (_cursor, mut keys): (u64, Vec<String>) = redis::cmd("SCAN")
                        .arg(0)
                        .arg("MATCH")
                        .arg(&pattern)
                        .arg("COUNT")
                        .arg(cache_constants::STATS_TTL_SAMPLE_CAP)
                        .query_async(conn)
                        .await
                        .map_err(AppError::from)?;
                    // SCAN's COUNT is a hint, not a hard cap — a single batch can return more.
                    keys.truncate(cache_constants::STATS_TTL_SAMPLE_CAP);

                    if keys.is_empty() {
                        return Ok(1.0);
                    }
                    let mut active = 0usize;
                    let mut ttl_errors = 0usize;
                    for sampled_key in &keys {
                        match AsyncCommands::ttl::<_, i64>(conn, sampled_key).await {
                            Ok(ttl) if ttl > 0 => active += 1,
                            Ok(_) => {}
                            Err(_) => ttl_errors += 1,
                        }
                    }
                    let sampled = keys.len() - ttl_errors;
                    if sampled == 0 {
                        return Ok(1.0);
                    }
                    Ok(active as f64 / sampled as f64)
                })
            })
            .await
            .unwrap_or(1.0);

        let server_type = self.get_server_type().await;

        CacheStats {
            strategy: CacheStrategy::SharedRedis,
            primary_entries,
            active_entries: (primary_entries as f64 * active_ratio).round() as usize,
            stale_entries,
            hit_rate: self.counters.hit_rate(),
            avg_latency_ms: self.counters.avg_latency_ms(),
            server_type,
        }
    }
}

#[async_trait]
impl CredentialCacheExt for RedisCache {
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

        let full_key = primary_key(key);
        if self
            .set_namespaced("set", self.timeouts.set_ms, full_key, &value, ttl)
            .await
        {
            self.set_stale(key, value).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primary_key_adds_the_primary_namespace_prefix() {
        assert_eq!(primary_key("consumer_secret:c1"), "auth_service:consumer_secret:c1");
    }

    #[test]
    fn stale_key_adds_the_stale_namespace_prefix() {
        assert_eq!(stale_key("consumer_secret:c1"), "auth_service_stale:consumer_secret:c1");
    }

    #[test]
    fn primary_and_stale_keys_for_the_same_key_never_collide() {
        let key = "consumer_secret:c1";
        assert_ne!(primary_key(key), stale_key(key));
    }

    #[test]
    fn category_label_names_match_classification_variants() {
        assert_eq!(category_label(ErrorCategory::Infrastructure), "infrastructure");
        assert_eq!(category_label(ErrorCategory::Business), "business");
        assert_eq!(category_label(ErrorCategory::Connection), "connection");
    }

    #[test]
    fn set_with_ttl_rejects_a_pollution_attempt_before_touching_redis() {
        // RedisCache::new requires a live connection, so set_with_ttl's guard against
        // cross-consumer pollution is exercised directly through the shared predicate
        // it delegates to; `cache::tests` covers the predicate's own truth table.
        let value = serde_json::json!({"id": "j1", "key": "k1", "secret": "s1", "consumer": {"id": "mallory"}});
        assert!(violates_pollution_guard("consumer_secret:alice", &value));
    }
}
