// ABOUTME: Runtime environment classification shared by logging and configuration defaults
// ABOUTME: Distinguishes development/testing from production for sensible fallback behavior
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

use std::env;
use std::fmt;

/// The runtime environment the service is deployed into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    /// Local development.
    Development,
    /// Production deployment.
    Production,
    /// Automated test runs.
    Testing,
}

impl Environment {
    /// Parse an environment name, defaulting to `Development` on an unrecognized or
    /// missing value.
    #[must_use]
    pub fn from_str_or_default(value: Option<&str>) -> Self {
        match value.map(str::to_lowercase).as_deref() {
            Some("production" | "prod") => Self::Production,
            Some("testing" | "test") => Self::Testing,
            _ => Self::Development,
        }
    }

    /// Read the environment from `ENVIRONMENT` (falling back to `NODE_ENV`), defaulting to
    /// `Development`.
    #[must_use]
    pub fn from_env() -> Self {
        let raw = env::var("ENVIRONMENT")
            .or_else(|_| env::var("NODE_ENV"))
            .ok();
        Self::from_str_or_default(raw.as_deref())
    }

    /// Whether this is the production environment.
    #[must_use]
    pub const fn is_production(self) -> bool {
        matches!(self, Self::Production)
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Development => "development",
            Self::Production => "production",
            Self::Testing => "testing",
        };
        write!(f, "{s}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_development_for_unknown_values() {
        assert_eq!(
            Environment::from_str_or_default(Some("whatever")),
            Environment::Development
        );
        assert_eq!(
            Environment::from_str_or_default(None),
            Environment::Development
        );
    }

    #[test]
    fn recognizes_production_aliases() {
        assert_eq!(
            Environment::from_str_or_default(Some("production")),
            Environment::Production
        );
        assert_eq!(
            Environment::from_str_or_default(Some("PROD")),
            Environment::Production
        );
    }

    #[test]
    fn recognizes_testing_aliases() {
        assert_eq!(
            Environment::from_str_or_default(Some("testing")),
            Environment::Testing
        );
        assert_eq!(
            Environment::from_str_or_default(Some("test")),
            Environment::Testing
        );
    }
}
