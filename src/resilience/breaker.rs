// ABOUTME: Rolling-window circuit breaker engine shared by the cache breaker and the Kong breaker
// ABOUTME: Tracks successes/failures/timeouts in fixed-width buckets spanning a configurable window

use crate::logging::AppLogger;
use std::collections::VecDeque;
use std::env;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Circuit breaker lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    /// Actions run normally; failures accumulate in the rolling window.
    Closed,
    /// Actions are rejected without running.
    Open,
    /// A single probe action is admitted to decide whether to close or reopen.
    HalfOpen,
}

impl BreakerState {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Open => "open",
            Self::HalfOpen => "half_open",
        }
    }
}

/// Configuration for a single circuit breaker instance.
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Per-call timeout in milliseconds.
    pub timeout_ms: u64,
    /// Error percentage (0-100) over the rolling window that trips the breaker.
    pub error_threshold_percentage: f64,
    /// Minimum number of samples in the window before tripping is considered.
    pub volume_threshold: u32,
    /// Time to wait in the open state before probing again, in milliseconds.
    pub reset_timeout_ms: u64,
    /// Width of the rolling window, in milliseconds.
    pub rolling_count_timeout_ms: u64,
    /// Number of buckets the rolling window is divided into.
    pub rolling_count_buckets: usize,
    /// Whether the breaker is active at all; when false, `can_execute` always returns true.
    pub enabled: bool,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            timeout_ms: crate::constants::breaker::DEFAULT_TIMEOUT_MS,
            error_threshold_percentage: crate::constants::breaker::DEFAULT_ERROR_THRESHOLD_PERCENTAGE,
            volume_threshold: crate::constants::breaker::DEFAULT_VOLUME_THRESHOLD,
            reset_timeout_ms: crate::constants::breaker::DEFAULT_RESET_TIMEOUT_MS,
            rolling_count_timeout_ms: crate::constants::breaker::DEFAULT_ROLLING_COUNT_TIMEOUT_MS,
            rolling_count_buckets: crate::constants::breaker::DEFAULT_ROLLING_COUNT_BUCKETS,
            enabled: true,
        }
    }
}

impl CircuitBreakerConfig {
    /// Load a circuit breaker configuration from environment variables prefixed with
    /// `prefix` (e.g. `CACHE_BREAKER` or `KONG_BREAKER`), falling back to the shared defaults.
    #[must_use]
    pub fn from_env_with_prefix(prefix: &str) -> Self {
        let defaults = Self::default();
        Self {
            timeout_ms: env_u64(prefix, "TIMEOUT_MS", defaults.timeout_ms),
            error_threshold_percentage: env_f64(
                prefix,
                "ERROR_THRESHOLD_PERCENTAGE",
                defaults.error_threshold_percentage,
            ),
            volume_threshold: env_u32(prefix, "VOLUME_THRESHOLD", defaults.volume_threshold),
            reset_timeout_ms: env_u64(prefix, "RESET_TIMEOUT_MS", defaults.reset_timeout_ms),
            rolling_count_timeout_ms: env_u64(
                prefix,
                "ROLLING_COUNT_TIMEOUT_MS",
                defaults.rolling_count_timeout_ms,
            ),
            rolling_count_buckets: env_usize(
                prefix,
                "ROLLING_COUNT_BUCKETS",
                defaults.rolling_count_buckets,
            ),
            enabled: env::var(format!("{prefix}_ENABLED"))
                .map(|v| v != "false" && v != "0")
                .unwrap_or(defaults.enabled),
        }
    }

    fn bucket_width(&self) -> Duration {
        Duration::from_millis(self.rolling_count_timeout_ms / self.rolling_count_buckets.max(1) as u64)
    }
}

fn env_u64(prefix: &str, suffix: &str, default: u64) -> u64 {
    env::var(format!("{prefix}_{suffix}"))
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

fn env_u32(prefix: &str, suffix: &str, default: u32) -> u32 {
    env::var(format!("{prefix}_{suffix}"))
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

fn env_usize(prefix: &str, suffix: &str, default: usize) -> usize {
    env::var(format!("{prefix}_{suffix}"))
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

fn env_f64(prefix: &str, suffix: &str, default: f64) -> f64 {
    env::var(format!("{prefix}_{suffix}"))
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

#[derive(Debug, Clone, Copy)]
struct Bucket {
    start: Instant,
    successes: u32,
    failures: u32,
}

/// Point-in-time counters exposed by `CircuitBreaker::stats`.
#[derive(Debug, Clone, Copy)]
pub struct BreakerStats {
    /// Current lifecycle state.
    pub state: BreakerState,
    /// Total admitted actions.
    pub fires: u64,
    /// Actions rejected while open.
    pub rejects: u64,
    /// Actions that exceeded the per-call timeout.
    pub timeouts: u64,
    /// Actions that failed for an infrastructure/connection reason.
    pub failures: u64,
    /// Actions that completed successfully.
    pub successes: u64,
    /// Stale-cache fallbacks served while open.
    pub fallbacks: u64,
}

struct Inner {
    state: BreakerState,
    buckets: VecDeque<Bucket>,
    opened_at: Option<Instant>,
    fires: u64,
    rejects: u64,
    timeouts: u64,
    failures: u64,
    successes: u64,
    fallbacks: u64,
}

impl Inner {
    fn new() -> Self {
        Self {
            state: BreakerState::Closed,
            buckets: VecDeque::new(),
            opened_at: None,
            fires: 0,
            rejects: 0,
            timeouts: 0,
            failures: 0,
            successes: 0,
            fallbacks: 0,
        }
    }
}

/// A rolling-window circuit breaker. Shared by the cache breaker (no stale fallback) and
/// the Kong breaker (which layers stale-cache fallback on top via `kong::breaker`).
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    /// Construct a new breaker under the given logical name.
    #[must_use]
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            inner: Mutex::new(Inner::new()),
        }
    }

    /// Whether an action may run right now. Transitions `Open` to `HalfOpen` once
    /// `reset_timeout_ms` has elapsed since the breaker opened.
    pub async fn can_execute(&self) -> bool {
        if !self.config.enabled {
            return true;
        }
        let mut inner = self.inner.lock().await;
        self.rotate_buckets(&mut inner);

        match inner.state {
            BreakerState::Closed => true,
            BreakerState::HalfOpen => true,
            BreakerState::Open => {
                let elapsed = inner.opened_at.is_some_and(|opened_at| {
                    opened_at.elapsed() >= Duration::from_millis(self.config.reset_timeout_ms)
                });
                if elapsed {
                    inner.state = BreakerState::HalfOpen;
                    drop(inner);
                    AppLogger::log_breaker_transition(&self.name, "open", "half_open", "reset_timeout_elapsed");
                    true
                } else {
                    inner.rejects += 1;
                    false
                }
            }
        }
    }

    /// Record a successful action.
    pub async fn record_success(&self) {
        let mut inner = self.inner.lock().await;
        self.rotate_buckets(&mut inner);
        inner.fires += 1;
        inner.successes += 1;
        if let Some(bucket) = inner.buckets.back_mut() {
            bucket.successes += 1;
        }

        if inner.state == BreakerState::HalfOpen {
            inner.state = BreakerState::Closed;
            inner.opened_at = None;
            drop(inner);
            AppLogger::log_breaker_transition(&self.name, "half_open", "closed", "probe_succeeded");
        }
    }

    /// Record a failed action classified as infrastructure or connection (never business).
    pub async fn record_failure(&self) {
        self.record_failure_inner(false).await;
    }

    /// Record an action that exceeded its per-call timeout.
    pub async fn record_timeout(&self) {
        self.record_failure_inner(true).await;
    }

    async fn record_failure_inner(&self, is_timeout: bool) {
        let mut inner = self.inner.lock().await;
        self.rotate_buckets(&mut inner);
        inner.fires += 1;
        inner.failures += 1;
        if is_timeout {
            inner.timeouts += 1;
        }
        if let Some(bucket) = inner.buckets.back_mut() {
            bucket.failures += 1;
        }

        if inner.state == BreakerState::HalfOpen {
            inner.state = BreakerState::Open;
            inner.opened_at = Some(Instant::now());
            drop(inner);
            AppLogger::log_breaker_transition(&self.name, "half_open", "open", "probe_failed");
            return;
        }

        let (total, failure_pct) = self.window_failure_ratio(&inner);
        if inner.state == BreakerState::Closed
            && total >= self.config.volume_threshold
            && failure_pct >= self.config.error_threshold_percentage
        {
            inner.state = BreakerState::Open;
            inner.opened_at = Some(Instant::now());
            drop(inner);
            AppLogger::log_breaker_transition(
                &self.name,
                "closed",
                "open",
                "error_threshold_exceeded",
            );
        }
    }

    /// Record a stale-cache fallback served while the breaker is open.
    pub async fn record_fallback(&self) {
        let mut inner = self.inner.lock().await;
        inner.fallbacks += 1;
    }

    /// Force the breaker closed, clearing its window and counters.
    pub async fn reset(&self) {
        let mut inner = self.inner.lock().await;
        *inner = Inner::new();
    }

    /// Snapshot the breaker's current state and counters.
    pub async fn stats(&self) -> BreakerStats {
        let mut inner = self.inner.lock().await;
        self.rotate_buckets(&mut inner);
        BreakerStats {
            state: inner.state,
            fires: inner.fires,
            rejects: inner.rejects,
            timeouts: inner.timeouts,
            failures: inner.failures,
            successes: inner.successes,
            fallbacks: inner.fallbacks,
        }
    }

    /// The breaker's current lifecycle state.
    pub async fn state(&self) -> BreakerState {
        let mut inner = self.inner.lock().await;
        self.rotate_buckets(&mut inner);
        inner.state
    }

    fn rotate_buckets(&self, inner: &mut Inner) {
        let width = self.config.bucket_width();
        let now = Instant::now();

        let needs_new_bucket = match inner.buckets.back() {
            Some(bucket) => now.duration_since(bucket.start) >= width,
            None => true,
        };

        if needs_new_bucket {
            inner.buckets.push_back(Bucket {
                start: now,
                successes: 0,
                failures: 0,
            });
        }

        let window = Duration::from_millis(self.config.rolling_count_timeout_ms);
        while inner
            .buckets
            .front()
            .is_some_and(|bucket| now.duration_since(bucket.start) > window)
        {
            inner.buckets.pop_front();
        }
    }

    fn window_failure_ratio(&self, inner: &Inner) -> (u32, f64) {
        let (successes, failures) = inner
            .buckets
            .iter()
            .fold((0u32, 0u32), |(s, f), bucket| {
                (s + bucket.successes, f + bucket.failures)
            });
        let total = successes + failures;
        if total == 0 {
            (0, 0.0)
        } else {
            (total, f64::from(failures) / f64::from(total) * 100.0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            timeout_ms: 100,
            error_threshold_percentage: 50.0,
            volume_threshold: 3,
            reset_timeout_ms: 50,
            rolling_count_timeout_ms: 10_000,
            rolling_count_buckets: 10,
            enabled: true,
        }
    }

    #[tokio::test]
    async fn starts_closed_and_admits_actions() {
        let breaker = CircuitBreaker::new("test", test_config());
        assert!(breaker.can_execute().await);
        assert_eq!(breaker.state().await, BreakerState::Closed);
    }

    #[tokio::test]
    async fn opens_after_error_threshold_with_enough_volume() {
        let breaker = CircuitBreaker::new("test", test_config());
        breaker.record_failure().await;
        breaker.record_failure().await;
        breaker.record_failure().await;
        assert_eq!(breaker.state().await, BreakerState::Open);
        assert!(!breaker.can_execute().await);
    }

    #[tokio::test]
    async fn stays_closed_below_volume_threshold() {
        let breaker = CircuitBreaker::new("test", test_config());
        breaker.record_failure().await;
        breaker.record_failure().await;
        assert_eq!(breaker.state().await, BreakerState::Closed);
    }

    #[tokio::test]
    async fn half_open_after_reset_timeout_then_closes_on_success() {
        let breaker = CircuitBreaker::new("test", test_config());
        breaker.record_failure().await;
        breaker.record_failure().await;
        breaker.record_failure().await;
        assert_eq!(breaker.state().await, BreakerState::Open);

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(breaker.can_execute().await);
        assert_eq!(breaker.state().await, BreakerState::HalfOpen);

        breaker.record_success().await;
        assert_eq!(breaker.state().await, BreakerState::Closed);
    }

    #[tokio::test]
    async fn half_open_reopens_on_failure() {
        let breaker = CircuitBreaker::new("test", test_config());
        breaker.record_failure().await;
        breaker.record_failure().await;
        breaker.record_failure().await;
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(breaker.can_execute().await);

        breaker.record_failure().await;
        assert_eq!(breaker.state().await, BreakerState::Open);
    }

    #[tokio::test]
    async fn disabled_breaker_always_admits() {
        let mut config = test_config();
        config.enabled = false;
        let breaker = CircuitBreaker::new("test", config);
        breaker.record_failure().await;
        breaker.record_failure().await;
        breaker.record_failure().await;
        assert!(breaker.can_execute().await);
    }

    #[tokio::test]
    async fn reset_clears_counters_and_state() {
        let breaker = CircuitBreaker::new("test", test_config());
        breaker.record_failure().await;
        breaker.record_failure().await;
        breaker.record_failure().await;
        breaker.reset().await;
        assert_eq!(breaker.state().await, BreakerState::Closed);
        let stats = breaker.stats().await;
        assert_eq!(stats.failures, 0);
    }
}
