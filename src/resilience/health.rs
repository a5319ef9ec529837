// ABOUTME: Periodic PING health monitor that feeds consecutive-failure counts to the cache breaker
// ABOUTME: Runs as a background tokio task; must be stopped before the underlying connection closes

use crate::resilience::CircuitBreaker;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

/// Point-in-time health snapshot (C9 health state).
#[derive(Debug, Clone, Copy)]
pub struct HealthState {
    /// Whether the most recent probe succeeded.
    pub healthy: bool,
    /// Consecutive probe failures since the last success.
    pub consecutive_failures: u32,
}

struct Shared {
    healthy: AtomicBool,
    consecutive_failures: AtomicU32,
}

/// Drives a periodic PING probe against the cache backend, notifying the cache breaker
/// (C8) after `unhealthy_threshold` consecutive failures so it can trip even when no
/// caller is actively issuing cache operations.
pub struct HealthMonitor {
    interval: Duration,
    unhealthy_threshold: u32,
    shared: Arc<Shared>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl HealthMonitor {
    /// Construct a monitor. Call `start` to begin probing.
    #[must_use]
    pub fn new(interval: Duration, unhealthy_threshold: u32) -> Self {
        Self {
            interval,
            unhealthy_threshold,
            shared: Arc::new(Shared {
                healthy: AtomicBool::new(true),
                consecutive_failures: AtomicU32::new(0),
            }),
            handle: Mutex::new(None),
        }
    }

    /// Start the background probe loop. `probe` performs one PING attempt; `breaker`
    /// receives a `record_failure` call once `unhealthy_threshold` consecutive probe
    /// failures have accumulated. Calling `start` while already running is a no-op.
    pub async fn start<F, Fut>(&self, probe: F, breaker: Arc<CircuitBreaker>)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = bool> + Send,
    {
        let mut handle_guard = self.handle.lock().await;
        if handle_guard.is_some() {
            return;
        }

        let shared = self.shared.clone();
        let interval = self.interval;
        let unhealthy_threshold = self.unhealthy_threshold;

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                if probe().await {
                    shared.healthy.store(true, Ordering::SeqCst);
                    shared.consecutive_failures.store(0, Ordering::SeqCst);
                } else {
                    let failures = shared.consecutive_failures.fetch_add(1, Ordering::SeqCst) + 1;
                    if failures >= unhealthy_threshold {
                        shared.healthy.store(false, Ordering::SeqCst);
                        breaker.record_failure().await;
                    }
                }
            }
        });

        *handle_guard = Some(handle);
    }

    /// Stop the background probe loop, if running.
    pub async fn stop(&self) {
        if let Some(handle) = self.handle.lock().await.take() {
            handle.abort();
        }
    }

    /// Snapshot the current health state.
    #[must_use]
    pub fn state(&self) -> HealthState {
        HealthState {
            healthy: self.shared.healthy.load(Ordering::SeqCst),
            consecutive_failures: self.shared.consecutive_failures.load(Ordering::SeqCst),
        }
    }
}

impl Drop for HealthMonitor {
    fn drop(&mut self) {
        if let Ok(mut guard) = self.handle.try_lock() {
            if let Some(handle) = guard.take() {
                handle.abort();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resilience::CircuitBreakerConfig;
    use std::sync::atomic::AtomicU32 as Counter;

    #[tokio::test]
    async fn successful_probes_keep_state_healthy() {
        let monitor = HealthMonitor::new(Duration::from_millis(10), 3);
        let breaker = Arc::new(CircuitBreaker::new("test", CircuitBreakerConfig::default()));
        monitor.start(|| async { true }, breaker).await;
        tokio::time::sleep(Duration::from_millis(35)).await;
        monitor.stop().await;
        assert!(monitor.state().healthy);
    }

    #[tokio::test]
    async fn consecutive_failures_trip_the_breaker_after_threshold() {
        let monitor = HealthMonitor::new(Duration::from_millis(5), 2);
        let breaker = Arc::new(CircuitBreaker::new(
            "test",
            CircuitBreakerConfig {
                volume_threshold: 1,
                error_threshold_percentage: 1.0,
                ..CircuitBreakerConfig::default()
            },
        ));
        monitor.start(|| async { false }, breaker.clone()).await;
        tokio::time::sleep(Duration::from_millis(60)).await;
        monitor.stop().await;

        let state = monitor.state();
        assert!(!state.healthy);
        assert!(state.consecutive_failures >= 2);
        assert!(breaker.stats().await.failures >= 1);
    }

    #[tokio::test]
    async fn starting_twice_does_not_spawn_a_second_task() {
        let monitor = HealthMonitor::new(Duration::from_millis(50), 3);
        let breaker = Arc::new(CircuitBreaker::new("test", CircuitBreakerConfig::default()));
        let calls = Arc::new(Counter::new(0));
        let calls_clone = calls.clone();
        monitor
            .start(
                move || {
                    let calls = calls_clone.clone();
                    async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        true
                    }
                },
                breaker.clone(),
            )
            .await;
        monitor.start(|| async { true }, breaker).await;
        monitor.stop().await;
    }
}
