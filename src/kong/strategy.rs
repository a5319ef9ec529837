// ABOUTME: Kong mode strategies (C10): URL/header shapes and prerequisite handling per deployment
// ABOUTME: Gateway talks to a self-hosted Admin API directly; Hosted talks to a Konnect control plane

use crate::constants::kong as kong_constants;
use crate::errors::{AppError, AppResult};
use crate::kong::model::create_kong_api_error;
use crate::resilience::classify::is_success_status;
use regex::Regex;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use serde::Deserialize;
use serde_json::json;

#[derive(Debug, Deserialize)]
struct ConsumerRecord {
    id: String,
}

#[derive(Debug, Deserialize)]
struct ConsumerListResponse {
    #[serde(default)]
    data: Vec<ConsumerRecord>,
}

fn kong_admin_token_header() -> HeaderName {
    HeaderName::from_static("kong-admin-token")
}

fn status_and_reason(response: &reqwest::Response) -> (u16, String) {
    let status = response.status();
    (status.as_u16(), status.canonical_reason().unwrap_or("").to_owned())
}

/// Self-hosted Kong Gateway Admin API.
pub struct GatewayStrategy {
    base: String,
    token: String,
}

impl GatewayStrategy {
    pub(super) fn new(admin_url: &str, token: &str) -> Self {
        Self {
            base: admin_url.trim_end_matches('/').to_owned(),
            token: token.to_owned(),
        }
    }
}

/// Hosted Konnect control plane Admin API.
pub struct HostedStrategy {
    base: String,
    consumer_admin: String,
    realm_id: String,
    control_plane_id: String,
    token: String,
}

impl HostedStrategy {
    pub(super) fn new(admin_url: &str, token: &str) -> AppResult<Self> {
        let url = url::Url::parse(admin_url)?;
        let host = url
            .host_str()
            .ok_or_else(|| AppError::config_invalid("Konnect admin URL is missing a host"))?;

        let pattern = Regex::new(r"^/v2/control-planes/([a-f0-9-]+)$")
            .map_err(|e| AppError::internal(format!("invalid control-plane regex: {e}")))?;
        let captures = pattern
            .captures(url.path())
            .ok_or_else(|| AppError::config_invalid(format!("{admin_url} is not a Konnect control-plane URL")))?;
        let control_plane_id = captures
            .get(1)
            .ok_or_else(|| AppError::config_invalid("control plane id missing from URL"))?
            .as_str()
            .to_owned();

        let realm_suffix_len = kong_constants::REALM_ID_SUFFIX_LEN.min(control_plane_id.len());
        let realm_id = format!(
            "{}{}",
            kong_constants::REALM_ID_PREFIX,
            &control_plane_id[..realm_suffix_len]
        );

        Ok(Self {
            base: admin_url.trim_end_matches('/').to_owned(),
            consumer_admin: format!("{}://{host}/v1", url.scheme()),
            realm_id,
            control_plane_id,
            token: token.to_owned(),
        })
    }
}

/// A mode-selected Kong Admin API strategy (C10): owns URL shapes, headers, consumer id
/// resolution, and hosted-mode prerequisite provisioning.
pub enum KongStrategy {
    /// Self-hosted Gateway.
    Gateway(GatewayStrategy),
    /// Hosted Konnect control plane.
    Hosted(HostedStrategy),
}

impl KongStrategy {
    /// Build the strategy selected by `config.mode`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigInvalid` if Konnect mode is selected and `admin_url` does not match
    /// the expected control-plane URL shape.
    pub fn new(mode: crate::config::KongMode, admin_url: &str, token: &str) -> AppResult<Self> {
        match mode {
            crate::config::KongMode::ApiGateway => Ok(Self::Gateway(GatewayStrategy::new(admin_url, token))),
            crate::config::KongMode::Konnect => Ok(Self::Hosted(HostedStrategy::new(admin_url, token)?)),
        }
    }

    fn base(&self) -> &str {
        match self {
            Self::Gateway(strategy) => &strategy.base,
            Self::Hosted(strategy) => &strategy.base,
        }
    }

    /// The JWT credential URL for a resolved consumer id/uuid.
    #[must_use]
    pub fn build_consumer_url(&self, consumer_id: &str) -> String {
        match self {
            Self::Gateway(_) => format!(
                "{}/consumers/{consumer_id}/{}",
                self.base(),
                kong_constants::JWT_CREDENTIAL_PATH
            ),
            Self::Hosted(_) => format!(
                "{}/core-entities/consumers/{consumer_id}/{}",
                self.base(),
                kong_constants::JWT_CREDENTIAL_PATH
            ),
        }
    }

    /// The health-probe URL.
    #[must_use]
    pub fn build_health_url(&self) -> String {
        match self {
            Self::Gateway(strategy) => format!("{}/status", strategy.base),
            Self::Hosted(strategy) => strategy.base.clone(),
        }
    }

    /// Headers every Admin API request must carry, including the mode-specific credential.
    ///
    /// # Errors
    ///
    /// Returns `InternalError` if the configured admin token is not a valid header value.
    pub fn auth_headers(&self) -> AppResult<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static(kong_constants::USER_AGENT),
        );

        let (header_name, value) = match self {
            Self::Gateway(strategy) => (kong_admin_token_header(), strategy.token.clone()),
            Self::Hosted(strategy) => (AUTHORIZATION, format!("Bearer {}", strategy.token)),
        };
        let header_value = HeaderValue::from_str(&value)
            .map_err(|e| AppError::internal(format!("invalid admin token header: {e}")))?;
        headers.insert(header_name, header_value);

        Ok(headers)
    }

    /// Resolve an opaque consumer id into the uuid Kong expects on credential URLs.
    ///
    /// Gateway mode is identity. Hosted mode probes the consumer endpoint directly, falling
    /// back to a username search on 404. Returns `Ok(None)` when the consumer does not exist
    /// (a business outcome, not a breaker-tripping failure).
    ///
    /// # Errors
    ///
    /// Returns an error for any non-2xx, non-404 response, or a request-level failure.
    pub async fn resolve_consumer_id(&self, client: &reqwest::Client, id: &str) -> AppResult<Option<String>> {
        let Self::Hosted(strategy) = self else {
            return Ok(Some(id.to_owned()));
        };

        let headers = self.auth_headers()?;
        let direct_url = format!("{}/core-entities/consumers/{id}", strategy.base);
        let response = client.get(&direct_url).headers(headers.clone()).send().await?;
        let (status, reason) = status_and_reason(&response);

        if is_success_status(status) {
            let body: ConsumerRecord = response.json().await?;
            return Ok(Some(body.id));
        }
        if status != 404 {
            let body = response.text().await.unwrap_or_default();
            return Err(create_kong_api_error(status, &reason, &body).into());
        }

        let list_url = format!("{}/core-entities/consumers?username={id}", strategy.base);
        let response = client.get(&list_url).headers(headers).send().await?;
        let (status, reason) = status_and_reason(&response);
        if !is_success_status(status) {
            let body = response.text().await.unwrap_or_default();
            return Err(create_kong_api_error(status, &reason, &body).into());
        }

        let body: ConsumerListResponse = response.json().await?;
        Ok(body.data.into_iter().next().map(|record| record.id))
    }

    /// Ensure any deployment-specific prerequisites exist before a consumer operation runs.
    /// A no-op for Gateway mode; for Hosted mode, ensures the auth realm exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the realm cannot be confirmed or created.
    pub async fn ensure_prerequisites(&self, client: &reqwest::Client) -> AppResult<()> {
        let Self::Hosted(strategy) = self else {
            return Ok(());
        };

        let headers = self.auth_headers()?;
        let realm_url = format!("{}/realms/{}", strategy.consumer_admin, strategy.realm_id);
        let response = client.get(&realm_url).headers(headers.clone()).send().await?;
        let (status, reason) = status_and_reason(&response);
        if is_success_status(status) {
            return Ok(());
        }
        if status != 404 {
            let body = response.text().await.unwrap_or_default();
            return Err(create_kong_api_error(status, &reason, &body).into());
        }

        let create_url = format!("{}/realms", strategy.consumer_admin);
        let body = json!({
            "name": strategy.realm_id,
            "allowed_control_planes": [strategy.control_plane_id],
        });
        let response = client.post(&create_url).headers(headers).json(&body).send().await?;
        let (status, reason) = status_and_reason(&response);
        if is_success_status(status) {
            return Ok(());
        }

        let text = response.text().await.unwrap_or_default();
        if status == 400 && text.contains("realm name must be unique") {
            return Ok(());
        }
        Err(create_kong_api_error(status, &reason, &text).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::KongMode;

    #[test]
    fn gateway_urls_strip_trailing_slash() {
        let strategy = KongStrategy::new(KongMode::ApiGateway, "http://localhost:8001/", "tok").expect("builds");
        assert_eq!(strategy.build_consumer_url("alice"), "http://localhost:8001/consumers/alice/jwt");
        assert_eq!(strategy.build_health_url(), "http://localhost:8001/status");
    }

    #[test]
    fn gateway_headers_use_kong_admin_token() {
        let strategy = KongStrategy::new(KongMode::ApiGateway, "http://localhost:8001", "tok").expect("builds");
        let headers = strategy.auth_headers().expect("headers build");
        assert_eq!(headers.get("kong-admin-token").expect("present"), "tok");
    }

    #[test]
    fn hosted_url_is_parsed_into_admin_realm_and_control_plane() {
        let strategy = KongStrategy::new(
            KongMode::Konnect,
            "https://us.api.konghq.com/v2/control-planes/12345678-1234-1234-1234-123456789012",
            "tok",
        )
        .expect("builds");

        assert_eq!(
            strategy.build_consumer_url("u1"),
            "https://us.api.konghq.com/v2/control-planes/12345678-1234-1234-1234-123456789012/core-entities/consumers/u1/jwt"
        );
        assert_eq!(strategy.build_health_url(), "https://us.api.konghq.com/v2/control-planes/12345678-1234-1234-1234-123456789012");

        let KongStrategy::Hosted(hosted) = &strategy else {
            unreachable!("konnect mode builds a hosted strategy");
        };
        assert_eq!(hosted.consumer_admin, "https://us.api.konghq.com/v1");
        assert_eq!(hosted.realm_id, "auth-realm-12345678");
    }

    #[test]
    fn hosted_headers_use_bearer_auth() {
        let strategy = KongStrategy::new(
            KongMode::Konnect,
            "https://us.api.konghq.com/v2/control-planes/deadbeef-dead-beef-dead-beefdeadbeef",
            "tok",
        )
        .expect("builds");
        let headers = strategy.auth_headers().expect("headers build");
        assert_eq!(headers.get(AUTHORIZATION).expect("present"), "Bearer tok");
    }

    #[test]
    fn hosted_url_with_invalid_path_is_rejected() {
        let result = KongStrategy::new(KongMode::Konnect, "https://us.api.konghq.com/invalid-path", "tok");
        assert!(result.is_err());
    }

    #[test]
    fn hosted_control_plane_id_rejects_non_hex_characters() {
        let result = KongStrategy::new(
            KongMode::Konnect,
            "https://us.api.konghq.com/v2/control-planes/not-valid-ZZZZ",
            "tok",
        );
        assert!(result.is_err());
    }
}
