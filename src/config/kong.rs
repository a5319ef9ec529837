// ABOUTME: Kong Admin API configuration: mode selection, endpoint, credentials, breaker policy
// ABOUTME: Mirrors the `kong.*` rows of the configuration surface table

use crate::errors::{AppError, AppResult};
use crate::resilience::CircuitBreakerConfig;
use std::env;
use std::fmt;

/// Which Kong deployment the adapter talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KongMode {
    /// A self-hosted Kong Gateway's Admin API.
    ApiGateway,
    /// A hosted Konnect control plane.
    Konnect,
}

impl KongMode {
    /// Parse a mode string, defaulting to `ApiGateway` for anything unrecognized.
    #[must_use]
    pub fn from_str_or_default(value: Option<&str>) -> Self {
        match value.map(str::to_uppercase).as_deref() {
            Some("KONNECT") => Self::Konnect,
            _ => Self::ApiGateway,
        }
    }
}

impl fmt::Display for KongMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::ApiGateway => crate::constants::kong::MODE_API_GATEWAY,
            Self::Konnect => crate::constants::kong::MODE_KONNECT,
        };
        write!(f, "{s}")
    }
}

/// Kong Admin API configuration.
#[derive(Clone)]
pub struct KongConfig {
    /// Gateway vs Konnect.
    pub mode: KongMode,
    /// Admin API base URL (Gateway admin root, or Konnect control-plane URL).
    pub admin_url: String,
    /// Admin credential: `Kong-Admin-Token` (Gateway) or bearer token (Konnect). Never logged.
    pub admin_token: String,
    /// Kong circuit breaker (C11) thresholds.
    pub circuit_breaker: CircuitBreakerConfig,
}

impl fmt::Debug for KongConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KongConfig")
            .field("mode", &self.mode)
            .field("admin_url", &self.admin_url)
            .field("admin_token", &"<redacted>")
            .field("circuit_breaker", &self.circuit_breaker)
            .finish()
    }
}

impl KongConfig {
    /// Load Kong configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigInvalid` if `KONG_ADMIN_URL` is unset.
    pub fn from_env() -> AppResult<Self> {
        let mode = KongMode::from_str_or_default(env::var("KONG_MODE").ok().as_deref());
        let admin_url = env::var("KONG_ADMIN_URL")
            .map_err(|_| AppError::config_invalid("KONG_ADMIN_URL is required"))?;
        let admin_token = env::var("KONG_ADMIN_TOKEN").unwrap_or_default();

        Ok(Self {
            mode,
            admin_url,
            admin_token,
            circuit_breaker: CircuitBreakerConfig::from_env_with_prefix("KONG_BREAKER"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_defaults_to_api_gateway() {
        assert_eq!(KongMode::from_str_or_default(None), KongMode::ApiGateway);
        assert_eq!(
            KongMode::from_str_or_default(Some("nonsense")),
            KongMode::ApiGateway
        );
    }

    #[test]
    fn mode_recognizes_konnect_case_insensitively() {
        assert_eq!(KongMode::from_str_or_default(Some("konnect")), KongMode::Konnect);
        assert_eq!(KongMode::from_str_or_default(Some("KONNECT")), KongMode::Konnect);
    }

    #[test]
    fn debug_redacts_admin_token() {
        let config = KongConfig {
            mode: KongMode::ApiGateway,
            admin_url: "http://localhost:8001".to_owned(),
            admin_token: "super-secret".to_owned(),
            circuit_breaker: CircuitBreakerConfig::default(),
        };
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("super-secret"));
    }
}
