// ABOUTME: Error message constants for the credential cache error taxonomy
// ABOUTME: One MSG_* constant per ErrorCode variant, reused by AppError descriptions

/// Default message when a consumer or credential cannot be found.
pub const MSG_NOT_FOUND: &str = "The requested consumer or credential was not found";
/// Default message for a rejected authentication attempt against Kong.
pub const MSG_AUTH_REJECTED: &str = "Kong rejected the Admin API credentials";
/// Default message for a rate-limited (429) upstream response.
pub const MSG_THROTTLED: &str = "Upstream rate limit exceeded";
/// Default message when Kong's Admin API is unavailable.
pub const MSG_UPSTREAM_UNAVAILABLE: &str = "Kong Admin API is temporarily unavailable";
/// Default message when the Redis/Valkey connection has been lost.
pub const MSG_CONNECTION_LOST: &str = "Connection to the cache backend was lost";
/// Default message when an operation exceeded its configured deadline.
pub const MSG_TIMEOUT_EXCEEDED: &str = "Operation exceeded its configured timeout";
/// Default message when a response payload failed schema validation.
pub const MSG_PAYLOAD_INVALID: &str = "Response payload failed validation";
/// Default message for invalid configuration detected at construction time.
pub const MSG_CONFIG_INVALID: &str = "Configuration is invalid";
/// Default message for an unclassified internal error.
pub const MSG_INTERNAL_ERROR: &str = "An internal error occurred";
