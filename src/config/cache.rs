// ABOUTME: Caching configuration: primary/stale TTLs, Redis connection, and resilience tunables
// ABOUTME: One typed field per option in the caching/caching.resilience configuration surface

use crate::resilience::{CircuitBreakerConfig, ReconnectConfig};
use std::env;

/// Top-level caching configuration: backend selection, TTLs, and connection parameters.
#[derive(Debug, Clone)]
pub struct CachingConfig {
    /// Select the shared Redis/Valkey backend (`true`) or the local in-process cache (`false`).
    pub high_availability: bool,
    /// Primary entry TTL, in seconds.
    pub ttl_seconds: u64,
    /// Stale entry TTL (Redis) and maximum stale-fallback age (both backends), in minutes.
    pub stale_data_tolerance_minutes: u64,
    /// Maximum number of primary entries retained by the local backend.
    pub max_entries: usize,
    /// Redis/Valkey connection URL, e.g. `redis://localhost:6379`.
    pub redis_url: Option<String>,
    /// Redis/Valkey `AUTH` password.
    pub redis_password: Option<String>,
    /// Redis/Valkey logical database index; `SELECT` is issued only when greater than zero.
    pub redis_db: i64,
    /// Resilience tunables layered on top of the cache backend.
    pub resilience: CacheResilienceConfig,
}

impl Default for CachingConfig {
    fn default() -> Self {
        Self {
            high_availability: false,
            ttl_seconds: crate::constants::cache::DEFAULT_TTL_SECONDS,
            stale_data_tolerance_minutes: crate::constants::cache::DEFAULT_STALE_TOLERANCE_MINUTES,
            max_entries: crate::constants::cache::DEFAULT_MAX_ENTRIES,
            redis_url: None,
            redis_password: None,
            redis_db: 0,
            resilience: CacheResilienceConfig::default(),
        }
    }
}

impl CachingConfig {
    /// Load caching configuration from environment variables, falling back to defaults.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            high_availability: env::var("CACHE_HIGH_AVAILABILITY")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(defaults.high_availability),
            ttl_seconds: env::var("CACHE_TTL_SECONDS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.ttl_seconds),
            stale_data_tolerance_minutes: env::var("CACHE_STALE_DATA_TOLERANCE_MINUTES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.stale_data_tolerance_minutes),
            max_entries: env::var("CACHE_MAX_ENTRIES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_entries),
            redis_url: env::var("REDIS_URL").ok(),
            redis_password: env::var("REDIS_PASSWORD").ok(),
            redis_db: env::var("REDIS_DB")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.redis_db),
            resilience: CacheResilienceConfig::from_env(),
        }
    }

    /// The primary TTL as a `Duration`.
    #[must_use]
    pub const fn primary_ttl(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.ttl_seconds)
    }

    /// The stale TTL (Redis backend) / stale-fallback ceiling (both backends) as a `Duration`.
    #[must_use]
    pub const fn stale_tolerance(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.stale_data_tolerance_minutes * 60)
    }
}

/// Per-operation Redis timeouts, in milliseconds.
#[derive(Debug, Clone)]
pub struct OperationTimeoutsConfig {
    /// `connect()` timeout.
    pub connect_ms: u64,
    /// `PING` timeout.
    pub ping_ms: u64,
    /// `GET` timeout.
    pub get_ms: u64,
    /// `SET` (+ `EXPIRE`) timeout.
    pub set_ms: u64,
    /// `DEL` timeout.
    pub delete_ms: u64,
    /// Single `SCAN` call timeout.
    pub scan_ms: u64,
}

impl Default for OperationTimeoutsConfig {
    fn default() -> Self {
        use crate::constants::redis;
        Self {
            connect_ms: redis::CONNECTION_TIMEOUT_SECS * 1000,
            ping_ms: redis::PING_TIMEOUT_SECS * 1000,
            get_ms: redis::OP_TIMEOUT_SECS * 1000,
            set_ms: redis::OP_TIMEOUT_SECS * 1000,
            delete_ms: redis::OP_TIMEOUT_SECS * 1000,
            scan_ms: redis::SCAN_TIMEOUT_SECS * 1000,
        }
    }
}

impl OperationTimeoutsConfig {
    /// Load per-operation timeouts from environment variables, falling back to defaults.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            connect_ms: env_u64("CACHE_OP_TIMEOUT_CONNECT_MS", defaults.connect_ms),
            ping_ms: env_u64("CACHE_OP_TIMEOUT_PING_MS", defaults.ping_ms),
            get_ms: env_u64("CACHE_OP_TIMEOUT_GET_MS", defaults.get_ms),
            set_ms: env_u64("CACHE_OP_TIMEOUT_SET_MS", defaults.set_ms),
            delete_ms: env_u64("CACHE_OP_TIMEOUT_DELETE_MS", defaults.delete_ms),
            scan_ms: env_u64("CACHE_OP_TIMEOUT_SCAN_MS", defaults.scan_ms),
        }
    }
}

/// Health monitor (C9) policy.
#[derive(Debug, Clone)]
pub struct HealthMonitorConfig {
    /// Whether the periodic PING probe runs at all.
    pub enabled: bool,
    /// Probe interval, in milliseconds.
    pub interval_ms: u64,
    /// Consecutive probe failures before the cache breaker is notified.
    pub unhealthy_threshold: u32,
}

impl Default for HealthMonitorConfig {
    fn default() -> Self {
        use crate::constants::redis;
        Self {
            enabled: true,
            interval_ms: redis::HEALTH_MONITOR_INTERVAL_MS,
            unhealthy_threshold: redis::HEALTH_MONITOR_UNHEALTHY_THRESHOLD,
        }
    }
}

impl HealthMonitorConfig {
    /// Load health monitor configuration from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            enabled: env::var("CACHE_HEALTH_MONITOR_ENABLED")
                .map(|v| v != "false" && v != "0")
                .unwrap_or(defaults.enabled),
            interval_ms: env_u64("CACHE_HEALTH_MONITOR_INTERVAL_MS", defaults.interval_ms),
            unhealthy_threshold: env::var("CACHE_HEALTH_MONITOR_UNHEALTHY_THRESHOLD")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.unhealthy_threshold),
        }
    }
}

/// Resilience tunables layered on top of the shared cache backend: breaker, reconnect,
/// per-operation timeouts, and health monitoring.
#[derive(Debug, Clone)]
pub struct CacheResilienceConfig {
    /// Cache circuit breaker (C8) thresholds.
    pub circuit_breaker: CircuitBreakerConfig,
    /// Reconnect manager (C7) policy.
    pub reconnect: ReconnectConfig,
    /// Per-operation Redis timeouts.
    pub operation_timeouts: OperationTimeoutsConfig,
    /// Health monitor (C9) policy.
    pub health_monitor: HealthMonitorConfig,
}

impl Default for CacheResilienceConfig {
    fn default() -> Self {
        Self {
            circuit_breaker: CircuitBreakerConfig::default(),
            reconnect: ReconnectConfig::default(),
            operation_timeouts: OperationTimeoutsConfig::default(),
            health_monitor: HealthMonitorConfig::default(),
        }
    }
}

impl CacheResilienceConfig {
    /// Load the full resilience configuration from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            circuit_breaker: CircuitBreakerConfig::from_env_with_prefix("CACHE_BREAKER"),
            reconnect: ReconnectConfig::from_env(),
            operation_timeouts: OperationTimeoutsConfig::from_env(),
            health_monitor: HealthMonitorConfig::from_env(),
        }
    }
}

fn env_u64(name: &str, default: u64) -> u64 {
    env::var(name).ok().and_then(|s| s.parse().ok()).unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_constants() {
        let config = CachingConfig::default();
        assert!(!config.high_availability);
        assert_eq!(config.ttl_seconds, crate::constants::cache::DEFAULT_TTL_SECONDS);
    }

    #[test]
    fn stale_tolerance_converts_minutes_to_duration() {
        let mut config = CachingConfig::default();
        config.stale_data_tolerance_minutes = 2;
        assert_eq!(config.stale_tolerance(), std::time::Duration::from_secs(120));
    }
}
