// ABOUTME: Kong credential service facade (C12): wires cache, breaker, and mode strategy together
// ABOUTME: The only Kong-facing surface callers use; never propagates AppError to its caller
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

use super::breaker::{CredentialOutcome, KongCircuitBreaker};
use super::model::{create_kong_api_error, extract_consumer_secret, generate_jwt_key, generate_secure_secret, ConsumerSecret, CredentialListResponse};
use super::strategy::KongStrategy;
use crate::cache::factory::Cache;
use crate::cache::{consumer_secret_key, CacheStats, CredentialCache};
use crate::config::{CachingConfig, KongConfig};
use crate::errors::{AppError, AppResult};
use crate::resilience::classify::is_success_status;
use crate::resilience::{with_timeout, BreakerStats, HealthMonitor};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;

/// The outcome of a Kong Admin API health probe.
#[derive(Debug, Clone)]
pub struct HealthStatus {
    /// Whether the probe succeeded.
    pub healthy: bool,
    /// Round-trip time of the probe, in milliseconds.
    pub response_time_ms: u64,
    /// A diagnostic message, present only when `healthy` is false.
    pub error: Option<String>,
}

/// The Kong credential service facade (C12). Fronts Kong's Admin API with a two-tier
/// cache and a circuit breaker that falls back to stale cached credentials when Kong is
/// unreachable. Every public method is infallible: misses, breaker rejection, and Kong
/// errors all collapse to `None`/`false`/a diagnostic value.
pub struct KongCredentialService {
    cache: Arc<Cache>,
    strategy: KongStrategy,
    breaker: KongCircuitBreaker,
    client: reqwest::Client,
    request_timeout: Duration,
    health_monitor: HealthMonitor,
}

impl KongCredentialService {
    /// Build the service: selects the cache backend, the Kong mode strategy, and starts
    /// the health monitor (C9) against the cache breaker when a shared backend is in use.
    ///
    /// # Errors
    ///
    /// Returns an error if the cache backend cannot establish its initial connection, or
    /// if `kong.admin_url` does not match the URL shape required by `kong.mode`.
    pub async fn new(caching: CachingConfig, kong: KongConfig) -> AppResult<Self> {
        let cache = Arc::new(Cache::new(&caching).await?);
        let strategy = KongStrategy::new(kong.mode, &kong.admin_url, &kong.admin_token)?;
        let breaker = KongCircuitBreaker::new(kong.circuit_breaker.clone(), cache.clone(), caching.stale_tolerance());
        let client = reqwest::Client::builder().build().map_err(AppError::from)?;

        let health_monitor = HealthMonitor::new(
            Duration::from_millis(caching.resilience.health_monitor.interval_ms),
            caching.resilience.health_monitor.unhealthy_threshold,
        );
        if caching.resilience.health_monitor.enabled {
            if let Some(cache_breaker) = cache.breaker() {
                let probe_cache = cache.clone();
                health_monitor
                    .start(move || {
                        let probe_cache = probe_cache.clone();
                        async move { probe_cache.ping().await }
                    }, cache_breaker)
                    .await;
            }
        }

        Ok(Self {
            cache,
            strategy,
            breaker,
            client,
            request_timeout: Duration::from_secs(crate::constants::kong::REQUEST_TIMEOUT_SECS),
            health_monitor,
        })
    }

    /// Fetch a consumer's JWT credential, consulting the cache first and falling back to
    /// the breaker-wrapped Kong Admin API on miss. Returns `None` if the consumer or its
    /// credential does not exist, or if Kong is unreachable and no stale entry is available.
    pub async fn get_consumer_secret(&self, consumer_id: &str) -> Option<ConsumerSecret> {
        let key = consumer_secret_key(consumer_id);
        if let Some(value) = self.cache.get(&key).await {
            if let Ok(secret) = serde_json::from_value::<ConsumerSecret>(value) {
                return Some(secret);
            }
        }

        let outcome = self
            .breaker
            .wrap_consumer_operation("getConsumerSecret", consumer_id, || self.fetch_consumer_secret(consumer_id))
            .await?;
        let is_fresh = matches!(outcome, CredentialOutcome::Fetched(_));
        let secret: ConsumerSecret = serde_json::from_value(outcome.into_value()).ok()?;
        if is_fresh {
            self.cache.set(&key, serde_json::to_value(&secret).ok()?).await;
        }
        Some(secret)
    }

    async fn fetch_consumer_secret(&self, consumer_id: &str) -> AppResult<Option<Value>> {
        self.strategy.ensure_prerequisites(&self.client).await?;
        let Some(uuid) = self.strategy.resolve_consumer_id(&self.client, consumer_id).await? else {
            return Ok(None);
        };

        let url = self.strategy.build_consumer_url(&uuid);
        let headers = self.strategy.auth_headers()?;
        let response = with_timeout("fetch_consumer_secret", self.request_timeout, async {
            self.client.get(&url).headers(headers).send().await.map_err(AppError::from)
        })
        .await?;

        let status_code = response.status();
        let status = status_code.as_u16();
        if status == 404 {
            return Ok(None);
        }
        if !is_success_status(status) {
            let reason = status_code.canonical_reason().unwrap_or("").to_owned();
            let body = response.text().await.unwrap_or_default();
            return Err(create_kong_api_error(status, &reason, &body).into());
        }

        let body: CredentialListResponse = response.json().await.map_err(AppError::from)?;
        Ok(extract_consumer_secret(&body).and_then(|secret| serde_json::to_value(secret).ok()))
    }

    /// Create a JWT credential for an existing consumer, caching it on success. Returns
    /// `None` (with a diagnostic log) if the consumer does not exist yet.
    pub async fn create_consumer_secret(&self, consumer_id: &str) -> Option<ConsumerSecret> {
        let key = consumer_secret_key(consumer_id);
        let outcome = self
            .breaker
            .wrap_consumer_operation("createConsumerSecret", consumer_id, || {
                self.create_consumer_secret_remote(consumer_id)
            })
            .await?;
        let is_fresh = matches!(outcome, CredentialOutcome::Fetched(_));
        let secret: ConsumerSecret = serde_json::from_value(outcome.into_value()).ok()?;
        if is_fresh {
            self.cache.set(&key, serde_json::to_value(&secret).ok()?).await;
        }
        Some(secret)
    }

    async fn create_consumer_secret_remote(&self, consumer_id: &str) -> AppResult<Option<Value>> {
        self.strategy.ensure_prerequisites(&self.client).await?;
        let Some(uuid) = self.strategy.resolve_consumer_id(&self.client, consumer_id).await? else {
            return Ok(None);
        };

        let url = self.strategy.build_consumer_url(&uuid);
        let headers = self.strategy.auth_headers()?;
        let payload = json!({
            "key": generate_jwt_key(),
            "secret": generate_secure_secret(),
        });

        let response = with_timeout("create_consumer_secret", self.request_timeout, async {
            self.client.post(&url).headers(headers).json(&payload).send().await.map_err(AppError::from)
        })
        .await?;

        let status_code = response.status();
        let status = status_code.as_u16();
        if status == 404 {
            info!(consumer.id = %consumer_id, "Consumer must exist first");
            return Ok(None);
        }
        if !is_success_status(status) {
            let reason = status_code.canonical_reason().unwrap_or("").to_owned();
            let body = response.text().await.unwrap_or_default();
            return Err(create_kong_api_error(status, &reason, &body).into());
        }

        let credential: ConsumerSecret = response.json().await.map_err(AppError::from)?;
        Ok(serde_json::to_value(credential).ok())
    }

    /// Probe Kong's Admin API health endpoint through the breaker. Returns immediately
    /// with a diagnostic error, without contacting Kong, while the breaker is open.
    pub async fn health_check(&self) -> HealthStatus {
        let url = self.strategy.build_health_url();
        let headers = match self.strategy.auth_headers() {
            Ok(headers) => headers,
            Err(err) => {
                return HealthStatus {
                    healthy: false,
                    response_time_ms: 0,
                    error: Some(err.message),
                }
            }
        };

        let started = Instant::now();
        let result = self
            .breaker
            .wrap_operation("healthCheck", || async {
                let response = with_timeout("health_check", self.request_timeout, async {
                    self.client.get(&url).headers(headers).send().await.map_err(AppError::from)
                })
                .await?;
                Ok(response.status().as_u16())
            })
            .await;
        let response_time_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        match result {
            Ok(status) if is_success_status(status) => HealthStatus {
                healthy: true,
                response_time_ms,
                error: None,
            },
            Ok(401) => health_error(response_time_ms, "Kong rejected the Admin API token"),
            Ok(403) => health_error(response_time_ms, "Kong Admin API access forbidden"),
            Ok(404) => health_error(response_time_ms, "Kong health endpoint not found"),
            Ok(status) => health_error(response_time_ms, &format!("Kong Admin API returned {status}")),
            Err(err) => HealthStatus {
                healthy: false,
                response_time_ms: 0,
                error: Some(err.message),
            },
        }
    }

    /// Evict one consumer's cached credential, or every cached credential when `consumer_id`
    /// is `None`.
    pub async fn clear_cache(&self, consumer_id: Option<&str>) {
        match consumer_id {
            Some(id) => self.cache.delete(&consumer_secret_key(id)).await,
            None => self.cache.clear().await,
        }
    }

    /// Snapshot cache usage and performance counters.
    pub async fn get_stats(&self) -> CacheStats {
        self.cache.get_stats().await
    }

    /// Snapshot every circuit breaker's current state and counters, keyed by logical name.
    pub async fn get_circuit_breaker_stats(&self) -> HashMap<String, BreakerStats> {
        let mut stats = HashMap::new();
        stats.insert(crate::constants::kong::BREAKER_NAME.to_owned(), self.breaker.stats().await);
        if let Some(cache_breaker) = self.cache.breaker() {
            stats.insert("cache".to_owned(), cache_breaker.stats().await);
        }
        stats
    }
}

fn health_error(response_time_ms: u64, message: &str) -> HealthStatus {
    HealthStatus {
        healthy: false,
        response_time_ms,
        error: Some(message.to_owned()),
    }
}
