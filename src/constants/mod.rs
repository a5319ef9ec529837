// ABOUTME: Constants module with domain-separated organization
// ABOUTME: Groups cache, Redis, breaker, and Kong constants by domain rather than one dumping ground

//! Constants module
//!
//! This module organizes application constants by domain for better maintainability.
//! Constants are grouped into logical domains rather than being in a single large file.

// Domain-specific modules
pub mod errors;

pub use errors::*;

/// Cache key prefixes, default TTLs, and scan tuning.
pub mod cache {
    /// Primary namespace key prefix.
    pub const PRIMARY_KEY_PREFIX: &str = "auth_service:";
    /// Stale namespace key prefix (Redis backend).
    pub const STALE_KEY_PREFIX: &str = "auth_service_stale:";
    /// Prefix applied to credential cache keys before the consumer id.
    pub const CONSUMER_SECRET_KEY_PREFIX: &str = "consumer_secret:";

    /// Default maximum number of primary entries in the local cache.
    pub const DEFAULT_MAX_ENTRIES: usize = 1000;
    /// Default primary entry TTL in seconds.
    pub const DEFAULT_TTL_SECONDS: u64 = 300;
    /// Default stale-data tolerance in minutes.
    pub const DEFAULT_STALE_TOLERANCE_MINUTES: u64 = 60;
    /// Multiplier applied to `DEFAULT_TTL_SECONDS` for the local stale tier TTL.
    pub const LOCAL_STALE_TTL_MULTIPLIER: u64 = 24;
    /// Bound multiplier applied to `max_entries` for the local stale tier capacity.
    pub const LOCAL_STALE_CAPACITY_MULTIPLIER: usize = 2;

    /// SCAN batch size (COUNT hint) used by cursor-based iteration.
    pub const SCAN_BATCH_SIZE: usize = 100;
    /// Maximum number of SCAN iterations before aborting as a runaway cursor.
    pub const SCAN_MAX_ITERATIONS: usize = 10_000;
    /// Number of retries per individual SCAN call.
    pub const SCAN_RETRIES_PER_CALL: u32 = 3;
    /// Linear backoff step between SCAN call retries, in milliseconds.
    pub const SCAN_RETRY_BACKOFF_MS: u64 = 50;
    /// Maximum number of keys sampled for TTL-based active-entry estimation.
    pub const STATS_TTL_SAMPLE_CAP: usize = 10;
}

/// Redis/Valkey connection, timeout, and reconnect defaults.
pub mod redis {
    /// Connection timeout in seconds.
    pub const CONNECTION_TIMEOUT_SECS: u64 = 5;
    /// Response/command timeout in seconds.
    pub const RESPONSE_TIMEOUT_SECS: u64 = 2;
    /// PING probe timeout in seconds.
    pub const PING_TIMEOUT_SECS: u64 = 2;
    /// GET/SET/DELETE operation timeout in seconds.
    pub const OP_TIMEOUT_SECS: u64 = 2;
    /// SCAN call timeout in seconds.
    pub const SCAN_TIMEOUT_SECS: u64 = 3;

    /// Reconnect base delay in milliseconds.
    pub const RECONNECT_BASE_DELAY_MS: u64 = 200;
    /// Reconnect maximum delay in milliseconds.
    pub const RECONNECT_MAX_DELAY_MS: u64 = 10_000;
    /// Reconnect maximum attempts before surrendering.
    pub const RECONNECT_MAX_ATTEMPTS: u32 = 5;
    /// Reconnect jitter ceiling in milliseconds.
    pub const RECONNECT_JITTER_MS: u64 = 100;
    /// Reconnect backoff multiplier.
    pub const RECONNECT_MULTIPLIER: f64 = 2.0;

    /// Health monitor probe interval in milliseconds.
    pub const HEALTH_MONITOR_INTERVAL_MS: u64 = 10_000;
    /// Consecutive probe failures before the cache breaker is notified.
    pub const HEALTH_MONITOR_UNHEALTHY_THRESHOLD: u32 = 3;
}

/// Shared circuit breaker defaults for both the cache and Kong breakers.
pub mod breaker {
    /// Per-call timeout in milliseconds.
    pub const DEFAULT_TIMEOUT_MS: u64 = 5_000;
    /// Error percentage (0-100) over the rolling window that trips the breaker.
    pub const DEFAULT_ERROR_THRESHOLD_PERCENTAGE: f64 = 50.0;
    /// Minimum number of samples in the rolling window before tripping is considered.
    pub const DEFAULT_VOLUME_THRESHOLD: u32 = 5;
    /// Time to wait in the open state before probing again, in milliseconds.
    pub const DEFAULT_RESET_TIMEOUT_MS: u64 = 30_000;
    /// Width of the rolling window, in milliseconds.
    pub const DEFAULT_ROLLING_COUNT_TIMEOUT_MS: u64 = 10_000;
    /// Number of buckets the rolling window is divided into.
    pub const DEFAULT_ROLLING_COUNT_BUCKETS: usize = 10;
}

/// Kong Admin API constants: modes, headers, URL shapes.
pub mod kong {
    /// Gateway-mode strategy name.
    pub const MODE_API_GATEWAY: &str = "API_GATEWAY";
    /// Konnect hosted-mode strategy name.
    pub const MODE_KONNECT: &str = "KONNECT";

    /// User-Agent header sent on every Kong Admin API request.
    pub const USER_AGENT: &str = "Authentication-Service/1.0";
    /// Prefix used to derive a Konnect realm id from a control plane id.
    pub const REALM_ID_PREFIX: &str = "auth-realm-";
    /// Number of leading control-plane-id characters used to derive the realm id.
    pub const REALM_ID_SUFFIX_LEN: usize = 8;
    /// Path suffix appended to a consumer URL to reach its JWT credentials.
    pub const JWT_CREDENTIAL_PATH: &str = "jwt";

    /// Per-request timeout (seconds) for calls to Kong's Admin API.
    pub const REQUEST_TIMEOUT_SECS: u64 = 5;

    /// Logical breaker name shared by all Kong admin operations.
    pub const BREAKER_NAME: &str = "kong_operations";

    /// Stale fallback attribution when served from the shared Redis stale namespace.
    pub const FALLBACK_REDIS_STALE_CACHE: &str = "redis_stale_cache";
    /// Stale fallback attribution when served from the local in-memory stale map.
    pub const FALLBACK_IN_MEMORY_STALE_CACHE: &str = "in_memory_stale_cache";
    /// Attribution recorded when the breaker is open and no stale entry is available.
    pub const FALLBACK_OPEN: &str = "open";
}

/// Service identity constants used in structured logging.
pub mod service_names {
    /// This crate's service name, used as the default `service_name` in logging config.
    pub const AUTH_CREDENTIAL_SERVICE: &str = "auth-credential-service";
}
