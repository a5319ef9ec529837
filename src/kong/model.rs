// ABOUTME: Kong domain types and shared utilities: credential shape, secret generation, error mapping
// ABOUTME: Used by both mode strategies (C10) and the service facade (C12)

use crate::errors::AppError;
use crate::resilience::classify::{classify_status, ErrorCategory};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The owning consumer of a JWT credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Consumer {
    /// The consumer's identifier (UUID or custom id).
    pub id: String,
}

/// A Kong JWT credential, as returned by the Admin API and stored verbatim in the cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumerSecret {
    /// Credential identifier.
    pub id: String,
    /// Issuer / key id used in the JWT `iss` claim.
    pub key: String,
    /// Signing material.
    pub secret: String,
    /// The consumer this credential belongs to.
    pub consumer: Consumer,
}

/// Envelope returned by Kong's credential-list endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct CredentialListResponse {
    /// The credentials on this page.
    #[serde(default)]
    pub data: Vec<ConsumerSecret>,
}

/// Validate a credential-list response: the first element, if `data` is non-empty and
/// every required field is non-empty, is the consumer's secret.
#[must_use]
pub fn extract_consumer_secret(response: &CredentialListResponse) -> Option<ConsumerSecret> {
    let first = response.data.first()?;
    if first.id.is_empty() || first.key.is_empty() || first.secret.is_empty() || first.consumer.id.is_empty() {
        return None;
    }
    Some(first.clone())
}

/// 32 cryptographically random bytes, hex-encoded (64 lowercase hex characters).
#[must_use]
pub fn generate_secure_secret() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// A UUIDv4 with hyphens stripped (32 hex characters), used as a JWT key id.
#[must_use]
pub fn generate_jwt_key() -> String {
    Uuid::new_v4().simple().to_string()
}

/// A typed Kong Admin API error carrying the information needed to both classify it (C1)
/// and present a useful message to the caller.
#[derive(Debug, Clone)]
pub struct KongApiError {
    /// HTTP status returned by Kong.
    pub status: u16,
    /// HTTP reason phrase, when available.
    pub status_text: String,
    /// A human-readable message, derived from a status-specific table with a body fallback.
    pub message: String,
    /// Whether this failure should be treated as infrastructure for breaker purposes.
    pub is_infrastructure_error: bool,
}

impl std::fmt::Display for KongApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}: {}", self.status, self.status_text, self.message)
    }
}

impl std::error::Error for KongApiError {}

fn status_specific_message(status: u16) -> Option<&'static str> {
    match status {
        401 => Some("Kong rejected the Admin API token"),
        403 => Some("Kong Admin API access forbidden"),
        404 => Some("Consumer or credential not found"),
        409 => Some("Resource already exists"),
        422 => Some("Kong rejected the request payload"),
        429 => Some("Kong Admin API rate limit exceeded"),
        _ if (500..600).contains(&status) => Some("Kong Admin API is unavailable"),
        _ => None,
    }
}

/// Materialize a typed error from a Kong Admin API response's status, reason phrase, and body.
#[must_use]
pub fn create_kong_api_error(status: u16, status_text: &str, body: &str) -> KongApiError {
    let message = status_specific_message(status)
        .map_or_else(|| format!("{status} {status_text} - {body}"), ToOwned::to_owned);
    let is_infrastructure_error = matches!(classify_status(status), ErrorCategory::Infrastructure);

    KongApiError {
        status,
        status_text: status_text.to_owned(),
        message,
        is_infrastructure_error,
    }
}

impl From<KongApiError> for AppError {
    fn from(error: KongApiError) -> Self {
        match error.status {
            401 | 403 => Self::auth_rejected(error.message),
            404 => Self::not_found(error.message),
            429 => Self::throttled(error.message),
            status if (500..600).contains(&status) => Self::upstream_unavailable(error.message),
            _ => Self::payload_invalid(error.message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secret(id: &str, key: &str, secret: &str, consumer_id: &str) -> ConsumerSecret {
        ConsumerSecret {
            id: id.to_owned(),
            key: key.to_owned(),
            secret: secret.to_owned(),
            consumer: Consumer { id: consumer_id.to_owned() },
        }
    }

    #[test]
    fn extract_returns_none_for_empty_data() {
        let response = CredentialListResponse { data: vec![] };
        assert!(extract_consumer_secret(&response).is_none());
    }

    #[test]
    fn extract_returns_first_well_formed_credential() {
        let response = CredentialListResponse {
            data: vec![secret("j1", "k1", "s1", "c1")],
        };
        let extracted = extract_consumer_secret(&response).expect("credential should extract");
        assert_eq!(extracted.id, "j1");
    }

    #[test]
    fn extract_rejects_credential_with_empty_field() {
        let response = CredentialListResponse {
            data: vec![secret("", "k1", "s1", "c1")],
        };
        assert!(extract_consumer_secret(&response).is_none());
    }

    #[test]
    fn generated_secret_is_64_lowercase_hex_chars() {
        let secret = generate_secure_secret();
        assert_eq!(secret.len(), 64);
        assert!(secret.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn generated_jwt_key_is_32_hex_chars_without_hyphens() {
        let key = generate_jwt_key();
        assert_eq!(key.len(), 32);
        assert!(!key.contains('-'));
    }

    #[test]
    fn successive_secrets_differ() {
        assert_ne!(generate_secure_secret(), generate_secure_secret());
    }

    #[test]
    fn kong_api_error_classifies_5xx_as_infrastructure() {
        let error = create_kong_api_error(503, "Service Unavailable", "down");
        assert!(error.is_infrastructure_error);
        assert_eq!(error.message, "Kong Admin API is unavailable");
    }

    #[test]
    fn kong_api_error_classifies_404_as_business() {
        let error = create_kong_api_error(404, "Not Found", "missing");
        assert!(!error.is_infrastructure_error);
        assert_eq!(error.message, "Consumer or credential not found");
    }

    #[test]
    fn kong_api_error_falls_back_to_body_for_unmapped_status() {
        let error = create_kong_api_error(418, "I'm a teapot", "short and stout");
        assert_eq!(error.message, "418 I'm a teapot - short and stout");
    }
}
