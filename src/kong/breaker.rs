// ABOUTME: Kong circuit breaker (C11): wraps admin calls, classifies failures, serves stale fallback
// ABOUTME: Local-mode fallback uses an in-memory map; shared-mode fallback reads the cache's own stale tier

use crate::cache::factory::Cache;
use crate::cache::{consumer_secret_key, CredentialCache};
use crate::constants::kong as kong_constants;
use crate::errors::{AppError, AppResult, ErrorCode};
use crate::logging::AppLogger;
use crate::resilience::{with_timeout, BreakerStats, CircuitBreaker, CircuitBreakerConfig};
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Where a value returned by `wrap_consumer_operation` came from. The facade must only
/// re-prime the primary cache from `Fetched`; a `StaleFallback` re-written to primary would
/// let a single breaker-open window keep serving stale data as a primary hit long after the
/// breaker closes and Kong recovers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialOutcome {
    /// A fresh value returned by the wrapped action.
    Fetched(Value),
    /// A stale value served while the breaker was open.
    StaleFallback(Value),
}

impl CredentialOutcome {
    /// Unwrap to the underlying value, discarding its source.
    #[must_use]
    pub fn into_value(self) -> Value {
        match self {
            Self::Fetched(value) | Self::StaleFallback(value) => value,
        }
    }
}

/// Wraps Kong Admin API calls in a shared rolling-window breaker (C11), invalidating or
/// serving stale cached credentials around the `open` state per the component design.
pub struct KongCircuitBreaker {
    engine: Arc<CircuitBreaker>,
    cache: Arc<Cache>,
    local_stale: Mutex<HashMap<String, (Value, Instant)>>,
    stale_tolerance: Duration,
    timeout: Duration,
}

impl KongCircuitBreaker {
    /// Construct the breaker. `stale_tolerance` bounds how old a local in-memory fallback
    /// entry may be before it is treated as a miss; the shared backend enforces its own
    /// stale TTL on write instead.
    #[must_use]
    pub fn new(config: CircuitBreakerConfig, cache: Arc<Cache>, stale_tolerance: Duration) -> Self {
        let timeout = Duration::from_millis(config.timeout_ms);
        Self {
            engine: Arc::new(CircuitBreaker::new(kong_constants::BREAKER_NAME, config)),
            cache,
            local_stale: Mutex::new(HashMap::new()),
            stale_tolerance,
            timeout,
        }
    }

    /// Run a consumer-scoped Kong operation through the breaker. Never propagates an error:
    /// business failures, infrastructure failures, and breaker rejection all collapse to
    /// `None` (or a served stale payload), matching the facade's "no exception crosses the
    /// boundary" contract. The returned `CredentialOutcome` tells the caller whether the
    /// value is fresh (safe to re-prime the primary cache) or a stale fallback (never
    /// re-prime primary from it — that would keep bypassing the breaker after it closes).
    pub async fn wrap_consumer_operation<F, Fut>(
        &self,
        operation: &'static str,
        consumer_id: &str,
        action: F,
    ) -> Option<CredentialOutcome>
    where
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = AppResult<Option<Value>>> + Send,
    {
        if !self.engine.can_execute().await {
            return self
                .stale_fallback(operation, consumer_id)
                .await
                .map(CredentialOutcome::StaleFallback);
        }

        match with_timeout(operation, self.timeout, action()).await {
            Ok(Some(value)) => {
                self.engine.record_success().await;
                self.remember_stale(operation, consumer_id, &value).await;
                Some(CredentialOutcome::Fetched(value))
            }
            Ok(None) => {
                self.engine.record_success().await;
                self.invalidate_stale(operation, consumer_id).await;
                None
            }
            Err(err) => {
                self.record_failure(&err).await;
                if !err.is_infrastructure() {
                    self.invalidate_stale(operation, consumer_id).await;
                }
                None
            }
        }
    }

    /// Run a non-consumer-scoped Kong operation (the health probe) through the breaker,
    /// without any stale fallback. Propagates the action's error so the facade can report
    /// a specific health message.
    ///
    /// # Errors
    ///
    /// Returns `UpstreamUnavailable` if the breaker is open, or the action's own error.
    pub async fn wrap_operation<F, Fut, T>(&self, operation: &'static str, action: F) -> AppResult<T>
    where
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = AppResult<T>> + Send,
    {
        if !self.engine.can_execute().await {
            return Err(AppError::upstream_unavailable(
                "Circuit breaker open — Kong Admin API unavailable",
            ));
        }

        match with_timeout(operation, self.timeout, action()).await {
            Ok(value) => {
                self.engine.record_success().await;
                Ok(value)
            }
            Err(err) => {
                self.record_failure(&err).await;
                Err(err)
            }
        }
    }

    async fn record_failure(&self, err: &AppError) {
        if err.code == ErrorCode::TimeoutExceeded {
            self.engine.record_timeout().await;
        } else if err.is_infrastructure() {
            self.engine.record_failure().await;
        }
    }

    async fn remember_stale(&self, operation: &str, consumer_id: &str, value: &Value) {
        if matches!(*self.cache, Cache::Shared(_)) {
            return;
        }
        let key = format!("{operation}:{consumer_id}");
        self.local_stale.lock().await.insert(key, (value.clone(), Instant::now()));
    }

    async fn invalidate_stale(&self, operation: &str, consumer_id: &str) {
        if matches!(*self.cache, Cache::Shared(_)) {
            self.cache.delete_stale(&consumer_secret_key(consumer_id)).await;
        } else {
            let key = format!("{operation}:{consumer_id}");
            self.local_stale.lock().await.remove(&key);
        }
    }

    async fn stale_fallback(&self, operation: &str, consumer_id: &str) -> Option<Value> {
        let hit = if matches!(*self.cache, Cache::Shared(_)) {
            self.cache
                .get_stale(&consumer_secret_key(consumer_id))
                .await
                .map(|value| (value, kong_constants::FALLBACK_REDIS_STALE_CACHE))
        } else {
            self.local_stale_hit(operation, consumer_id)
                .await
                .map(|value| (value, kong_constants::FALLBACK_IN_MEMORY_STALE_CACHE))
        };

        match hit {
            Some((value, source)) => {
                self.engine.record_fallback().await;
                AppLogger::log_circuit_breaker_fallback(kong_constants::BREAKER_NAME, source, consumer_id);
                Some(value)
            }
            None => {
                AppLogger::log_circuit_breaker_fallback(
                    kong_constants::BREAKER_NAME,
                    kong_constants::FALLBACK_OPEN,
                    consumer_id,
                );
                None
            }
        }
    }

    async fn local_stale_hit(&self, operation: &str, consumer_id: &str) -> Option<Value> {
        let key = format!("{operation}:{consumer_id}");
        let mut map = self.local_stale.lock().await;
        let (value, recorded_at) = map.get(&key)?.clone();
        if recorded_at.elapsed() > self.stale_tolerance {
            map.remove(&key);
            return None;
        }
        Some(value)
    }

    /// Snapshot the breaker's current state and counters.
    pub async fn stats(&self) -> BreakerStats {
        self.engine.stats().await
    }

    /// Force the breaker closed, clearing its window, counters, and local stale map.
    pub async fn reset(&self) {
        self.engine.reset().await;
        self.local_stale.lock().await.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::cache::CachingConfig;
    use serde_json::json;

    fn breaker_config() -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            timeout_ms: 100,
            error_threshold_percentage: 50.0,
            volume_threshold: 2,
            reset_timeout_ms: 50,
            rolling_count_timeout_ms: 10_000,
            rolling_count_buckets: 10,
            enabled: true,
        }
    }

    async fn local_breaker() -> KongCircuitBreaker {
        let cache = Arc::new(Cache::new(&CachingConfig::default()).await.expect("local cache builds"));
        KongCircuitBreaker::new(breaker_config(), cache, Duration::from_secs(60))
    }

    #[tokio::test]
    async fn successful_action_is_cached_for_local_stale_fallback() {
        let breaker = local_breaker().await;
        let secret = json!({"id": "j1", "key": "k1", "secret": "s1", "consumer": {"id": "c1"}});
        let result = breaker
            .wrap_consumer_operation("getConsumerSecret", "c1", {
                let secret = secret.clone();
                || async move { Ok(Some(secret)) }
            })
            .await;
        assert_eq!(result, Some(CredentialOutcome::Fetched(secret)));
    }

    #[tokio::test]
    async fn business_failure_does_not_trip_breaker() {
        let breaker = local_breaker().await;
        for _ in 0..5 {
            let result = breaker
                .wrap_consumer_operation("getConsumerSecret", "c1", || async {
                    Err(AppError::not_found("consumer"))
                })
                .await;
            assert_eq!(result, None);
        }
        assert_eq!(breaker.stats().await.state, crate::resilience::BreakerState::Closed);
    }

    #[tokio::test]
    async fn infrastructure_failures_open_breaker_and_serve_local_stale_on_next_call() {
        let breaker = local_breaker().await;
        let secret = json!({"id": "j1", "key": "k1", "secret": "s1", "consumer": {"id": "c1"}});
        breaker
            .wrap_consumer_operation("getConsumerSecret", "c1", {
                let secret = secret.clone();
                || async move { Ok(Some(secret)) }
            })
            .await;

        for _ in 0..2 {
            breaker
                .wrap_consumer_operation("getConsumerSecret", "c1", || async {
                    Err(AppError::upstream_unavailable("kong down"))
                })
                .await;
        }
        assert_eq!(breaker.stats().await.state, crate::resilience::BreakerState::Open);

        let fallback = breaker
            .wrap_consumer_operation("getConsumerSecret", "c1", || async { unreachable!("breaker is open") })
            .await;
        assert_eq!(fallback, Some(CredentialOutcome::StaleFallback(secret)));
        assert_eq!(breaker.stats().await.fallbacks, 1);
    }

    #[tokio::test]
    async fn stale_miss_while_open_returns_none() {
        let breaker = local_breaker().await;
        for _ in 0..2 {
            breaker
                .wrap_consumer_operation("getConsumerSecret", "unknown", || async {
                    Err(AppError::upstream_unavailable("kong down"))
                })
                .await;
        }
        let fallback = breaker
            .wrap_consumer_operation("getConsumerSecret", "unknown", || async { unreachable!("breaker is open") })
            .await;
        assert_eq!(fallback, None);
    }

    #[tokio::test]
    async fn reset_force_closes_and_clears_local_stale_map() {
        let breaker = local_breaker().await;
        for _ in 0..2 {
            breaker
                .wrap_consumer_operation("getConsumerSecret", "c1", || async {
                    Err(AppError::upstream_unavailable("kong down"))
                })
                .await;
        }
        assert_eq!(breaker.stats().await.state, crate::resilience::BreakerState::Open);
        breaker.reset().await;
        assert_eq!(breaker.stats().await.state, crate::resilience::BreakerState::Closed);
    }
}
