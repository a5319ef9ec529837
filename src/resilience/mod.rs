// ABOUTME: Shared resilience primitives used by both the cache and Kong subsystems
// ABOUTME: Error classification, timeouts, circuit breaker, and reconnect management

//! Resilience primitives
//!
//! These building blocks are deliberately domain-agnostic: the cache backend and the
//! Kong adapter each wrap them with their own policy (stale fallback, pollution guard,
//! connection lifecycle) rather than duplicating rolling-window math or backoff logic.

/// Error classification into infrastructure/business/connection categories.
pub mod classify;

/// Rolling-window circuit breaker engine.
pub mod breaker;

/// Periodic PING health monitor feeding the cache circuit breaker.
pub mod health;

/// Exponential-backoff reconnect manager with jitter and call coalescing.
pub mod reconnect;

/// Generic async operation-timeout wrapper.
pub mod timeout;

pub use breaker::{BreakerState, BreakerStats, CircuitBreaker, CircuitBreakerConfig};
pub use classify::{classify_error, classify_status, is_success_status, Classification, ErrorCategory};
pub use health::{HealthMonitor, HealthState};
pub use reconnect::{ReconnectConfig, ReconnectManager, ReconnectStats};
pub use timeout::with_timeout;
