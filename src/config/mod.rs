// ABOUTME: Configuration management for caching, resilience, and Kong settings
// ABOUTME: Typed from_env() constructors over plain structs, one field per configuration row
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

//! Configuration module
//!
//! Every tunable in the configuration surface is a typed field on one of the structs
//! exported here, loaded via an explicit `from_env()` constructor. There is no
//! config-file parser or remote configuration service: this crate only owns the
//! in-process shape of its own settings.

/// Caching configuration: backend selection, TTLs, Redis connection, and resilience.
pub mod cache;

/// Runtime environment classification (development/production/testing).
pub mod environment;

/// Kong Admin API configuration: mode, endpoint, credentials, breaker policy.
pub mod kong;

pub use cache::{CacheResilienceConfig, CachingConfig, HealthMonitorConfig, OperationTimeoutsConfig};
pub use environment::Environment;
pub use kong::{KongConfig, KongMode};
