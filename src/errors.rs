// ABOUTME: Centralized error handling and error types for the credential cache subsystem
// ABOUTME: Defines the error taxonomy consumed by the cache, resilience, and Kong modules
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

//! # Unified Error Handling System
//!
//! Centralized error type for the Kong credential cache subsystem. Every error is
//! classified into one of a small number of disjoint kinds so that callers (and the
//! circuit breakers) can reason about whether an error is infrastructure, business, or
//! connection-related without re-deriving that classification from a raw message.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Standard error codes used throughout the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// Consumer or credential not found (business error, never trips a breaker).
    NotFound,
    /// Kong rejected the Admin API credentials (401/403, business error).
    AuthRejected,
    /// Upstream rate limit exceeded (429, infrastructure error).
    Throttled,
    /// Kong Admin API unavailable (5xx/gateway, infrastructure error).
    UpstreamUnavailable,
    /// The Redis/Valkey connection was lost (connection error).
    ConnectionLost,
    /// An operation exceeded its configured deadline.
    TimeoutExceeded,
    /// A response payload failed schema validation or the pollution guard.
    PayloadInvalid,
    /// Configuration was invalid, detected synchronously at construction time.
    ConfigInvalid,
    /// Unclassified internal error.
    InternalError,
}

impl ErrorCode {
    /// Get a user-friendly description of this error.
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::NotFound => crate::constants::errors::MSG_NOT_FOUND,
            Self::AuthRejected => crate::constants::errors::MSG_AUTH_REJECTED,
            Self::Throttled => crate::constants::errors::MSG_THROTTLED,
            Self::UpstreamUnavailable => crate::constants::errors::MSG_UPSTREAM_UNAVAILABLE,
            Self::ConnectionLost => crate::constants::errors::MSG_CONNECTION_LOST,
            Self::TimeoutExceeded => crate::constants::errors::MSG_TIMEOUT_EXCEEDED,
            Self::PayloadInvalid => crate::constants::errors::MSG_PAYLOAD_INVALID,
            Self::ConfigInvalid => crate::constants::errors::MSG_CONFIG_INVALID,
            Self::InternalError => crate::constants::errors::MSG_INTERNAL_ERROR,
        }
    }

    /// Whether this error kind is recoverable by retrying, reconnecting, or falling back.
    #[must_use]
    pub const fn is_recoverable(self) -> bool {
        matches!(
            self,
            Self::Throttled | Self::UpstreamUnavailable | Self::ConnectionLost | Self::TimeoutExceeded
        )
    }

    /// Whether this error kind should count toward circuit breaker failure windows.
    #[must_use]
    pub const fn is_infrastructure(self) -> bool {
        matches!(
            self,
            Self::Throttled
                | Self::UpstreamUnavailable
                | Self::ConnectionLost
                | Self::TimeoutExceeded
        )
    }
}

// Simple serialization - just use the debug representation
impl Serialize for ErrorCode {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&format!("{self:?}"))
    }
}

impl<'de> Deserialize<'de> for ErrorCode {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        match s.as_str() {
            "NotFound" => Ok(Self::NotFound),
            "AuthRejected" => Ok(Self::AuthRejected),
            "Throttled" => Ok(Self::Throttled),
            "UpstreamUnavailable" => Ok(Self::UpstreamUnavailable),
            "ConnectionLost" => Ok(Self::ConnectionLost),
            "TimeoutExceeded" => Ok(Self::TimeoutExceeded),
            "PayloadInvalid" => Ok(Self::PayloadInvalid),
            "ConfigInvalid" => Ok(Self::ConfigInvalid),
            "InternalError" => Ok(Self::InternalError),
            _ => Err(serde::de::Error::unknown_variant(&s, &[])),
        }
    }
}

/// Simplified error type for the application.
#[derive(Debug, Clone, Error)]
pub struct AppError {
    /// Error code.
    pub code: ErrorCode,
    /// Human-readable error message.
    pub message: String,
}

impl AppError {
    /// Create a new `AppError` with the given code and message.
    #[must_use]
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Whether this error is recoverable (eligible for retry, reconnect, or fallback).
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        self.code.is_recoverable()
    }

    /// Whether this error should count toward a circuit breaker's failure window.
    #[must_use]
    pub const fn is_infrastructure(&self) -> bool {
        self.code.is_infrastructure()
    }

    /// Get full error details for internal logging.
    #[must_use]
    pub fn internal_details(&self) -> String {
        format!("{:?}: {}", self.code, self.message)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code.description(), self.message)
    }
}

/// Result type alias for convenience.
pub type AppResult<T> = Result<T, AppError>;

/// Convenience constructors for common errors.
impl AppError {
    /// Consumer or credential not found.
    #[must_use]
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, format!("{} not found", resource.into()))
    }

    /// Kong rejected the Admin API credentials.
    #[must_use]
    pub fn auth_rejected(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::AuthRejected, message)
    }

    /// Upstream rate limit exceeded.
    #[must_use]
    pub fn throttled(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Throttled, message)
    }

    /// Kong Admin API unavailable.
    #[must_use]
    pub fn upstream_unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::UpstreamUnavailable, message)
    }

    /// Redis/Valkey connection lost.
    #[must_use]
    pub fn connection_lost(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ConnectionLost, message)
    }

    /// Operation exceeded its configured deadline.
    #[must_use]
    pub fn timeout_exceeded(operation: impl Into<String>, timeout_ms: u64) -> Self {
        Self::new(
            ErrorCode::TimeoutExceeded,
            format!("{} exceeded its {timeout_ms}ms timeout", operation.into()),
        )
    }

    /// Response payload failed validation or the pollution guard.
    #[must_use]
    pub fn payload_invalid(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::PayloadInvalid, message)
    }

    /// Invalid configuration detected at construction time.
    #[must_use]
    pub fn config_invalid(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ConfigInvalid, message)
    }

    /// Unclassified internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }
}

/// Conversion from `anyhow::Error` to `AppError`.
impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        Self::new(ErrorCode::InternalError, error.to_string())
    }
}

/// Conversion from `std::io::Error` to `AppError`.
impl From<std::io::Error> for AppError {
    fn from(error: std::io::Error) -> Self {
        Self::new(ErrorCode::InternalError, format!("IO error: {error}"))
    }
}

/// Conversion from `serde_json::Error` to `AppError`.
impl From<serde_json::Error> for AppError {
    fn from(error: serde_json::Error) -> Self {
        Self::new(ErrorCode::PayloadInvalid, format!("JSON error: {error}"))
    }
}

/// Conversion from `uuid::Error` to `AppError`.
impl From<uuid::Error> for AppError {
    fn from(error: uuid::Error) -> Self {
        Self::new(ErrorCode::PayloadInvalid, format!("UUID error: {error}"))
    }
}

/// Conversion from `chrono::ParseError` to `AppError`.
impl From<chrono::ParseError> for AppError {
    fn from(error: chrono::ParseError) -> Self {
        Self::new(
            ErrorCode::PayloadInvalid,
            format!("Date parse error: {error}"),
        )
    }
}

/// Conversion from `redis::RedisError` to `AppError`, routed through the connection-error
/// vocabulary so transport failures land on `ConnectionLost` rather than `InternalError`.
impl From<redis::RedisError> for AppError {
    fn from(error: redis::RedisError) -> Self {
        if error.is_connection_dropped() || error.is_connection_refusal() || error.is_timeout() {
            Self::connection_lost(error.to_string())
        } else {
            Self::new(ErrorCode::InternalError, format!("Redis error: {error}"))
        }
    }
}

/// Conversion from `reqwest::Error` to `AppError`.
impl From<reqwest::Error> for AppError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::new(ErrorCode::TimeoutExceeded, error.to_string())
        } else if error.is_connect() {
            Self::connection_lost(error.to_string())
        } else {
            Self::upstream_unavailable(error.to_string())
        }
    }
}

/// Conversion from `url::ParseError` to `AppError`.
impl From<url::ParseError> for AppError {
    fn from(error: url::ParseError) -> Self {
        Self::config_invalid(format!("URL parse error: {error}"))
    }
}
