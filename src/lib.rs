// ABOUTME: Main library entry point for the Kong credential cache and circuit-breaker subsystem
// ABOUTME: Provides a resilient cache/breaker layer in front of Kong's Admin API for JWT credential lookups
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

// Crate-level attributes:
// - deny(unsafe_code): Zero-tolerance unsafe policy.
#![deny(unsafe_code)]

//! # Kong Credential Cache
//!
//! A resilient credential cache and circuit-breaker subsystem that sits in front of
//! Kong's Admin API (self-hosted Gateway or hosted Konnect) for JWT credential lookups
//! on an authentication service's signing path.
//!
//! ## Architecture
//!
//! - **Cache**: a two-tier (primary + stale) cache with a local in-process backend and
//!   a shared Redis/Valkey backend, selected by configuration.
//! - **Resilience**: error classification, operation timeouts, a rolling-window circuit
//!   breaker, and an exponential-backoff reconnect manager, shared by both the cache and
//!   the Kong adapter.
//! - **Kong**: an Admin API adapter with Gateway and Konnect (hosted) mode strategies,
//!   wrapped in a circuit breaker that falls back to stale cache data when Kong is down.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use kong_credential_cache::config::{CachingConfig, KongConfig};
//! use kong_credential_cache::kong::KongCredentialService;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let caching = CachingConfig::from_env();
//!     let kong = KongConfig::from_env()?;
//!     let service = KongCredentialService::new(caching, kong).await?;
//!
//!     let secret = service.get_consumer_secret("consumer-123").await;
//!     println!("{secret:?}");
//!     Ok(())
//! }
//! ```

/// Two-tier credential cache abstraction with local and shared Redis/Valkey backends.
pub mod cache;

/// Configuration management for caching, resilience, and Kong settings.
pub mod config;

/// Application constants organized by domain.
pub mod constants;

/// Unified error handling system with standard error codes.
pub mod errors;

/// Kong Admin API adapter, mode strategies, breaker, and service facade.
pub mod kong;

/// Production logging and structured output.
pub mod logging;

/// Shared resilience primitives: error classification, timeouts, circuit breaker, reconnect.
pub mod resilience;
