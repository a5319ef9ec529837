// ABOUTME: Error classification shared by the cache and Kong circuit breakers
// ABOUTME: Maps HTTP status codes and raw error messages to infrastructure/business/connection categories

//! Classifies failures so that circuit breakers only trip on infrastructure or connection
//! errors, never on business errors such as "consumer not found".

/// Disjoint failure categories used to decide whether a failure should trip a breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// A failure of the upstream service itself; should throttle further calls.
    Infrastructure,
    /// A semantically meaningful non-2xx response that must not trip a breaker.
    Business,
    /// A transport-level failure on the connection itself.
    Connection,
}

/// Raw-error vocabulary that identifies a connection-level failure regardless of status.
const CONNECTION_ERROR_MARKERS: &[&str] = &[
    "Connection closed",
    "connection lost",
    "ECONNREFUSED",
    "ERR_REDIS_CONNECTION_CLOSED",
    "ETIMEDOUT",
];

/// The outcome of classifying a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    /// The failure category.
    pub category: ErrorCategory,
    /// Whether the connection should be marked broken and a reconnect scheduled.
    pub should_reconnect: bool,
    /// Whether the failure is recoverable (retry, reconnect, or fallback may help).
    pub is_recoverable: bool,
}

impl Classification {
    /// Whether this classification should count toward a circuit breaker's failure window.
    #[must_use]
    pub const fn trips_breaker(&self) -> bool {
        matches!(
            self.category,
            ErrorCategory::Infrastructure | ErrorCategory::Connection
        )
    }
}

/// Classify an HTTP status code into a failure category.
///
/// 200-399 are not failures at all (callers should not invoke this for success responses);
/// 429 and 5xx are infrastructure; 400-428 and 430-499 are business; anything else is
/// conservatively treated as infrastructure.
#[must_use]
pub const fn classify_status(status: u16) -> ErrorCategory {
    match status {
        429 => ErrorCategory::Infrastructure,
        500..=599 => ErrorCategory::Infrastructure,
        400..=428 | 430..=499 => ErrorCategory::Business,
        _ => ErrorCategory::Infrastructure,
    }
}

/// Whether a status code represents success (2xx, the only non-failure range).
#[must_use]
pub const fn is_success_status(status: u16) -> bool {
    status >= 200 && status < 300
}

/// Inspect a raw error message for the connection-error vocabulary.
#[must_use]
pub fn classify_message(message: &str) -> Option<ErrorCategory> {
    CONNECTION_ERROR_MARKERS
        .iter()
        .any(|marker| message.contains(marker))
        .then_some(ErrorCategory::Connection)
}

/// Classify a failure from an optional HTTP status and a raw message.
///
/// Structured status information takes priority; the message vocabulary is consulted
/// whenever no status is available, or to detect connection failures that arrive with
/// a status that would otherwise read as infrastructure (e.g. a gateway timeout).
#[must_use]
pub fn classify_error(status: Option<u16>, message: &str) -> Classification {
    if let Some(category) = classify_message(message) {
        return Classification {
            category,
            should_reconnect: true,
            is_recoverable: true,
        };
    }

    let category = status.map_or(ErrorCategory::Infrastructure, classify_status);
    Classification {
        category,
        should_reconnect: false,
        is_recoverable: matches!(category, ErrorCategory::Infrastructure),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_429_is_infrastructure() {
        assert_eq!(classify_status(429), ErrorCategory::Infrastructure);
    }

    #[test]
    fn status_500_and_599_are_infrastructure() {
        assert_eq!(classify_status(500), ErrorCategory::Infrastructure);
        assert_eq!(classify_status(599), ErrorCategory::Infrastructure);
    }

    #[test]
    fn status_499_is_business() {
        assert_eq!(classify_status(499), ErrorCategory::Business);
    }

    #[test]
    fn unrecognized_status_is_conservatively_infrastructure() {
        assert_eq!(classify_status(600), ErrorCategory::Infrastructure);
        assert_eq!(classify_status(100), ErrorCategory::Infrastructure);
    }

    #[test]
    fn success_range_is_200_to_299() {
        assert!(is_success_status(200));
        assert!(is_success_status(299));
        assert!(!is_success_status(300));
        assert!(!is_success_status(199));
    }

    #[test]
    fn connection_vocabulary_wins_over_status() {
        let classification = classify_error(Some(500), "ECONNREFUSED on connect");
        assert_eq!(classification.category, ErrorCategory::Connection);
        assert!(classification.should_reconnect);
    }

    #[test]
    fn business_errors_never_trip_breaker() {
        let classification = classify_error(Some(404), "consumer not found");
        assert_eq!(classification.category, ErrorCategory::Business);
        assert!(!classification.trips_breaker());
    }

    #[test]
    fn infrastructure_errors_trip_breaker() {
        let classification = classify_error(Some(503), "service unavailable");
        assert!(classification.trips_breaker());
    }
}
