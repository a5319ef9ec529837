// ABOUTME: Kong Admin API adapter: domain model, mode strategies, circuit breaker, and service facade
// ABOUTME: The only public surface is `KongCredentialService`; everything else composes it
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

/// Kong circuit breaker (C11): stale-fallback-aware wrapper around the shared breaker engine.
pub mod breaker;
/// Kong domain types and shared utilities: credential shape, secret generation, error mapping.
pub mod model;
/// Kong credential service facade (C12).
pub mod service;
/// Kong mode strategies (C10): Gateway vs hosted Konnect URL/header/prerequisite handling.
pub mod strategy;

pub use model::{generate_jwt_key, generate_secure_secret, Consumer, ConsumerSecret, KongApiError};
pub use service::{HealthStatus, KongCredentialService};
pub use strategy::KongStrategy;
