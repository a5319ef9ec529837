// ABOUTME: Exponential-backoff reconnect manager with jitter, attempt cap, and call coalescing
// ABOUTME: Used by the Redis cache backend to recover a broken connection without a retry storm

use crate::errors::AppResult;
use rand::Rng;
use std::env;
use std::future::Future;
use std::sync::Mutex as StdMutex;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Reconnect policy configuration.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Delay before the first retry, in milliseconds.
    pub base_delay_ms: u64,
    /// Ceiling applied to the geometrically growing delay, in milliseconds.
    pub max_delay_ms: u64,
    /// Maximum number of attempts before surrendering.
    pub max_attempts: u32,
    /// Upper bound of the uniform jitter added to each delay, in milliseconds.
    pub jitter_ms: u64,
    /// Backoff multiplier applied between attempts.
    pub multiplier: f64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: crate::constants::redis::RECONNECT_BASE_DELAY_MS,
            max_delay_ms: crate::constants::redis::RECONNECT_MAX_DELAY_MS,
            max_attempts: crate::constants::redis::RECONNECT_MAX_ATTEMPTS,
            jitter_ms: crate::constants::redis::RECONNECT_JITTER_MS,
            multiplier: crate::constants::redis::RECONNECT_MULTIPLIER,
        }
    }
}

impl ReconnectConfig {
    /// Load reconnect configuration from environment variables, falling back to defaults.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            base_delay_ms: env::var("CACHE_RECONNECT_BASE_DELAY_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.base_delay_ms),
            max_delay_ms: env::var("CACHE_RECONNECT_MAX_DELAY_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_delay_ms),
            max_attempts: env::var("CACHE_RECONNECT_MAX_ATTEMPTS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_attempts),
            jitter_ms: env::var("CACHE_RECONNECT_JITTER_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.jitter_ms),
            multiplier: env::var("CACHE_RECONNECT_MULTIPLIER")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.multiplier),
        }
    }

    fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let raw = self.base_delay_ms as f64 * self.multiplier.powi(attempt.saturating_sub(1) as i32);
        let capped = raw.min(self.max_delay_ms as f64) as u64;
        let jitter = if self.jitter_ms == 0 {
            0
        } else {
            rand::thread_rng().gen_range(0..=self.jitter_ms)
        };
        Duration::from_millis(capped + jitter)
    }
}

/// Outcome of a reconnect sequence.
#[derive(Debug, Clone)]
pub struct ReconnectStats {
    /// Whether a connection was re-established.
    pub success: bool,
    /// Number of attempts made.
    pub attempts: u32,
    /// Total duration of the sequence, in milliseconds.
    pub duration_ms: u64,
    /// The last error encountered, if any attempt failed.
    pub error: Option<String>,
}

/// Drives a bounded exponential-backoff reconnect sequence, coalescing concurrent callers
/// onto a single in-flight attempt.
pub struct ReconnectManager {
    config: ReconnectConfig,
    lock: Mutex<()>,
    last_completed_at: StdMutex<Option<Instant>>,
    last_stats: StdMutex<Option<ReconnectStats>>,
}

impl ReconnectManager {
    /// Construct a new manager with the given policy.
    #[must_use]
    pub fn new(config: ReconnectConfig) -> Self {
        Self {
            config,
            lock: Mutex::new(()),
            last_completed_at: StdMutex::new(None),
            last_stats: StdMutex::new(None),
        }
    }

    /// Run `connect` up to `max_attempts` times with exponential backoff until it succeeds.
    /// Concurrent callers share a single attempt sequence: a caller that starts waiting
    /// while another is already reconnecting reuses that attempt's outcome instead of
    /// running its own.
    pub async fn execute_reconnect<F, Fut>(&self, connect: F) -> ReconnectStats
    where
        F: Fn() -> Fut,
        Fut: Future<Output = AppResult<()>>,
    {
        let call_started = Instant::now();
        let _guard = self.lock.lock().await;

        if let Some(completed_at) = *self
            .last_completed_at
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
        {
            if completed_at >= call_started {
                if let Some(stats) = self
                    .last_stats
                    .lock()
                    .unwrap_or_else(std::sync::PoisonError::into_inner)
                    .clone()
                {
                    return stats;
                }
            }
        }

        let started = Instant::now();
        let mut attempts = 0;
        let mut last_error = None;

        loop {
            attempts += 1;
            match connect().await {
                Ok(()) => {
                    let stats = ReconnectStats {
                        success: true,
                        attempts,
                        duration_ms: started.elapsed().as_millis() as u64,
                        error: None,
                    };
                    self.record_completion(stats.clone());
                    return stats;
                }
                Err(err) => {
                    last_error = Some(err.to_string());
                    if attempts >= self.config.max_attempts {
                        break;
                    }
                    tokio::time::sleep(self.config.delay_for_attempt(attempts)).await;
                }
            }
        }

        let stats = ReconnectStats {
            success: false,
            attempts,
            duration_ms: started.elapsed().as_millis() as u64,
            error: last_error,
        };
        self.record_completion(stats.clone());
        stats
    }

    fn record_completion(&self, stats: ReconnectStats) {
        *self
            .last_completed_at
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = Some(Instant::now());
        *self
            .last_stats
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = Some(stats);
    }

    /// Clear the cached last-attempt outcome so the next call always runs a fresh sequence.
    pub fn reset(&self) {
        *self
            .last_completed_at
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = None;
        *self
            .last_stats
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = None;
    }

    /// The outcome of the most recently completed reconnect sequence, if any.
    #[must_use]
    pub fn last_stats(&self) -> Option<ReconnectStats> {
        self.last_stats
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::AppError;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn fast_config() -> ReconnectConfig {
        ReconnectConfig {
            base_delay_ms: 1,
            max_delay_ms: 5,
            max_attempts: 3,
            jitter_ms: 0,
            multiplier: 2.0,
        }
    }

    #[tokio::test]
    async fn succeeds_on_first_attempt() {
        let manager = ReconnectManager::new(fast_config());
        let stats = manager.execute_reconnect(|| async { Ok(()) }).await;
        assert!(stats.success);
        assert_eq!(stats.attempts, 1);
    }

    #[tokio::test]
    async fn surrenders_after_max_attempts() {
        let manager = ReconnectManager::new(fast_config());
        let stats = manager
            .execute_reconnect(|| async { Err(AppError::connection_lost("still down")) })
            .await;
        assert!(!stats.success);
        assert_eq!(stats.attempts, 3);
        assert!(stats.error.is_some());
    }

    #[tokio::test]
    async fn retries_until_success() {
        let manager = ReconnectManager::new(fast_config());
        let attempt_count = Arc::new(AtomicU32::new(0));
        let counter = attempt_count.clone();
        let stats = manager
            .execute_reconnect(|| {
                let counter = counter.clone();
                async move {
                    let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                    if n < 2 {
                        Err(AppError::connection_lost("not yet"))
                    } else {
                        Ok(())
                    }
                }
            })
            .await;
        assert!(stats.success);
        assert_eq!(stats.attempts, 2);
    }

    #[tokio::test]
    async fn reset_clears_cached_outcome() {
        let manager = ReconnectManager::new(fast_config());
        manager.execute_reconnect(|| async { Ok(()) }).await;
        assert!(manager.last_stats().is_some());
        manager.reset();
        assert!(manager.last_stats().is_none());
    }
}
