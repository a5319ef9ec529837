// ABOUTME: Black-box integration tests for the shared rolling-window circuit breaker engine
// ABOUTME: Exercises state transitions, fallback accounting, and reset through the public API
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

use kong_credential_cache::resilience::{BreakerState, CircuitBreaker, CircuitBreakerConfig};
use std::time::Duration;

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
    let breaker = CircuitBreaker::new("test-breaker", test_config());
    assert!(breaker.can_execute().await);
    assert_eq!(breaker.state().await, BreakerState::Closed);
}

#[tokio::test]
async fn opens_once_the_error_threshold_is_crossed_with_enough_volume() {
    let breaker = CircuitBreaker::new("test-breaker", test_config());
    breaker.record_failure().await;
    assert_eq!(breaker.state().await, BreakerState::Closed);
    breaker.record_failure().await;
    assert_eq!(breaker.state().await, BreakerState::Closed);
    breaker.record_failure().await;
    assert_eq!(breaker.state().await, BreakerState::Open);
    assert!(!breaker.can_execute().await);
}

#[tokio::test]
async fn successes_keep_the_breaker_closed_regardless_of_volume() {
    let breaker = CircuitBreaker::new("test-breaker", test_config());
    for _ in 0..10 {
        breaker.record_success().await;
    }
    assert_eq!(breaker.state().await, BreakerState::Closed);
    let stats = breaker.stats().await;
    assert_eq!(stats.successes, 10);
    assert_eq!(stats.failures, 0);
}

#[tokio::test]
async fn half_open_probe_closes_the_breaker_on_success() {
    let breaker = CircuitBreaker::new("test-breaker", test_config());
    for _ in 0..3 {
        breaker.record_failure().await;
    }
    assert_eq!(breaker.state().await, BreakerState::Open);

    tokio::time::sleep(Duration::from_millis(60)).await;
    assert!(breaker.can_execute().await);
    assert_eq!(breaker.state().await, BreakerState::HalfOpen);

    breaker.record_success().await;
    assert_eq!(breaker.state().await, BreakerState::Closed);
}

#[tokio::test]
async fn half_open_probe_reopens_the_breaker_on_failure() {
    let breaker = CircuitBreaker::new("test-breaker", test_config());
    for _ in 0..3 {
        breaker.record_failure().await;
    }
    tokio::time::sleep(Duration::from_millis(60)).await;
    assert!(breaker.can_execute().await);

    breaker.record_failure().await;
    assert_eq!(breaker.state().await, BreakerState::Open);
}

#[tokio::test]
async fn disabled_breaker_always_admits_actions() {
    let mut config = test_config();
    config.enabled = false;
    let breaker = CircuitBreaker::new("test-breaker", config);
    for _ in 0..10 {
        breaker.record_failure().await;
    }
    assert!(breaker.can_execute().await);
}

#[tokio::test]
async fn reset_clears_state_and_counters() {
    let breaker = CircuitBreaker::new("test-breaker", test_config());
    for _ in 0..3 {
        breaker.record_failure().await;
    }
    assert_eq!(breaker.state().await, BreakerState::Open);

    breaker.reset().await;
    assert_eq!(breaker.state().await, BreakerState::Closed);
    let stats = breaker.stats().await;
    assert_eq!(stats.failures, 0);
    assert_eq!(stats.rejects, 0);
}

#[tokio::test]
async fn rejected_calls_while_open_are_counted() {
    let breaker = CircuitBreaker::new("test-breaker", test_config());
    for _ in 0..3 {
        breaker.record_failure().await;
    }
    for _ in 0..2 {
        assert!(!breaker.can_execute().await);
    }
    let stats = breaker.stats().await;
    assert_eq!(stats.rejects, 2);
}

#[tokio::test]
async fn timeouts_are_tracked_separately_from_plain_failures() {
    let breaker = CircuitBreaker::new("test-breaker", test_config());
    breaker.record_timeout().await;
    breaker.record_failure().await;
    let stats = breaker.stats().await;
    assert_eq!(stats.timeouts, 1);
    assert_eq!(stats.failures, 2);
}
