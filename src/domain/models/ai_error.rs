//! Caller-facing error taxonomy and response shape.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::domain::errors::{DomainError, UpstreamError};

/// Countdowns at or below this many seconds are not worth showing to users.
pub const DISPLAY_RETRY_THRESHOLD_SECS: u64 = 10;

/// Kinds of failure the presentation layer knows how to render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AiErrorKind {
    DailyLimit,
    RateLimit,
    CircuitBreaker,
    ConcurrencyLimit,
    ApiError,
    NetworkError,
    NotFound,
    Unknown,
}

impl AiErrorKind {
    pub const ALL: [Self; 8] = [
        Self::DailyLimit,
        Self::RateLimit,
        Self::CircuitBreaker,
        Self::ConcurrencyLimit,
        Self::ApiError,
        Self::NetworkError,
        Self::NotFound,
        Self::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DailyLimit => "daily_limit",
            Self::RateLimit => "rate_limit",
            Self::CircuitBreaker => "circuit_breaker",
            Self::ConcurrencyLimit => "concurrency_limit",
            Self::ApiError => "api_error",
            Self::NetworkError => "network_error",
            Self::NotFound => "not_found",
            Self::Unknown => "unknown",
        }
    }

    pub fn user_message(&self) -> &'static str {
        match self {
            Self::DailyLimit => "Goodi is a little tired today...",
            Self::RateLimit => "Goodi needs a short break",
            Self::CircuitBreaker => "Goodi is getting its energy back",
            Self::ConcurrencyLimit => "Lots of friends are talking to Goodi right now",
            Self::ApiError => "Goodi ran into a problem",
            Self::NetworkError => "The network connection looks unstable",
            Self::NotFound => "We couldn't find that content",
            Self::Unknown => "Something unexpected happened",
        }
    }

    pub fn action(&self) -> &'static str {
        match self {
            Self::DailyLimit => "Goodi can only do so much each day. Come back tomorrow!",
            Self::RateLimit => "Please wait a minute and try again.",
            Self::CircuitBreaker => "Please wait a minute, Goodi will be back soon.",
            Self::ConcurrencyLimit => "Please try again in a moment.",
            Self::ApiError => "Please try again later, or contact support.",
            Self::NetworkError => "Check your network connection and try again.",
            Self::NotFound => "The content may still be generating. Refresh in a little while.",
            Self::Unknown => "Please try again later. Contact support if it keeps happening.",
        }
    }

    /// Only the daily quota is final until the next day boundary.
    pub fn can_retry(&self) -> bool {
        !matches!(self, Self::DailyLimit)
    }

    /// Suggested wait when the denial itself carries no precise delay.
    pub fn default_retry_after(&self) -> Option<Duration> {
        let secs = match self {
            Self::DailyLimit => return None,
            Self::RateLimit | Self::CircuitBreaker => 60,
            Self::ConcurrencyLimit | Self::NotFound => 10,
            Self::ApiError | Self::Unknown => 30,
            Self::NetworkError => 5,
        };
        Some(Duration::from_secs(secs))
    }
}

impl fmt::Display for AiErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A call the governor refused or could not complete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Denial {
    pub kind: AiErrorKind,
    /// Precise delay, when the denying policy knows one.
    pub retry_after: Option<Duration>,
    /// Technical detail for logs; never shown to users.
    pub detail: String,
}

impl Denial {
    pub fn new(kind: AiErrorKind, retry_after: Option<Duration>, detail: impl Into<String>) -> Self {
        Self {
            kind,
            retry_after,
            detail: detail.into(),
        }
    }

    pub fn circuit_open(retry_after: Duration) -> Self {
        Self::new(
            AiErrorKind::CircuitBreaker,
            Some(retry_after),
            format!(
                "Circuit breaker is open (too many consecutive failures). Retry after {}s",
                ceil_secs(retry_after)
            ),
        )
    }

    pub fn concurrency_limit(max_concurrent: usize) -> Self {
        Self::new(
            AiErrorKind::ConcurrencyLimit,
            None,
            format!("Too many concurrent requests ({max_concurrent} max)"),
        )
    }

    pub fn daily_limit(limit: u32) -> Self {
        Self::new(
            AiErrorKind::DailyLimit,
            None,
            format!("Daily API limit exceeded ({limit} calls/day)"),
        )
    }

    pub fn rate_limit(limit: u32, window: Duration, retry_after: Duration) -> Self {
        Self::new(
            AiErrorKind::RateLimit,
            Some(retry_after),
            format!(
                "Rate limit exceeded ({limit} calls per {}s window)",
                window.as_secs()
            ),
        )
    }

    pub fn from_upstream(err: &UpstreamError) -> Self {
        Self::new(err.kind(), None, err.to_string())
    }

    pub fn can_retry(&self) -> bool {
        self.kind.can_retry()
    }

    /// Delay a caller should wait, falling back to the kind's default.
    pub fn effective_retry_after(&self) -> Option<Duration> {
        if !self.can_retry() {
            return None;
        }
        self.retry_after.or_else(|| self.kind.default_retry_after())
    }

    pub fn retry_after_secs(&self) -> Option<u64> {
        self.effective_retry_after().map(ceil_secs)
    }

    /// Delay worth surfacing in a UI countdown.
    pub fn display_retry_after(&self) -> Option<u64> {
        self.retry_after_secs()
            .filter(|secs| *secs > DISPLAY_RETRY_THRESHOLD_SECS)
    }
}

impl fmt::Display for Denial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.detail)
    }
}

fn ceil_secs(duration: Duration) -> u64 {
    let secs = duration.as_secs();
    if duration.subsec_nanos() > 0 {
        secs + 1
    } else {
        secs
    }
}

/// Error payload rendered by the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiErrorBody {
    pub kind: AiErrorKind,
    pub user_message: String,
    pub action: String,
    pub can_retry: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_seconds: Option<u64>,
}

impl From<&Denial> for ApiErrorBody {
    fn from(denial: &Denial) -> Self {
        Self {
            kind: denial.kind,
            user_message: denial.kind.user_message().to_string(),
            action: denial.kind.action().to_string(),
            can_retry: denial.can_retry(),
            retry_after_seconds: denial.retry_after_secs(),
        }
    }
}

/// `{ success: true, data }` or `{ success: false, error }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ApiErrorBody>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn denied(denial: &Denial) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(ApiErrorBody::from(denial)),
        }
    }

    /// Classify an unexpected failure (store unreachable and the like).
    pub fn from_error(err: &DomainError) -> Self {
        Self::denied(&Denial::new(AiErrorKind::Unknown, None, err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_daily_limit_is_final() {
        for kind in AiErrorKind::ALL {
            assert_eq!(kind.can_retry(), kind != AiErrorKind::DailyLimit, "{kind}");
        }
    }

    #[test]
    fn test_default_retry_after() {
        assert_eq!(AiErrorKind::DailyLimit.default_retry_after(), None);
        assert_eq!(
            AiErrorKind::RateLimit.default_retry_after(),
            Some(Duration::from_secs(60))
        );
        assert_eq!(
            AiErrorKind::NetworkError.default_retry_after(),
            Some(Duration::from_secs(5))
        );
    }

    #[test]
    fn test_daily_limit_has_no_retry_after() {
        let denial = Denial::daily_limit(200);
        assert!(!denial.can_retry());
        assert_eq!(denial.retry_after_secs(), None);
    }

    #[test]
    fn test_retry_after_rounds_up() {
        let denial = Denial::circuit_open(Duration::from_millis(12_100));
        assert_eq!(denial.retry_after_secs(), Some(13));
    }

    #[test]
    fn test_display_threshold() {
        let short = Denial::rate_limit(10, Duration::from_secs(60), Duration::from_secs(10));
        assert_eq!(short.display_retry_after(), None);

        let long = Denial::rate_limit(10, Duration::from_secs(60), Duration::from_secs(11));
        assert_eq!(long.display_retry_after(), Some(11));

        let network = Denial::from_upstream(&UpstreamError::Timeout);
        assert_eq!(network.display_retry_after(), None);
    }

    #[test]
    fn test_response_serialization() {
        let denial = Denial::rate_limit(10, Duration::from_secs(60), Duration::from_secs(42));
        let json = serde_json::to_value(ApiResponse::<Vec<String>>::denied(&denial)).unwrap();

        assert_eq!(json["success"], false);
        assert_eq!(json["error"]["kind"], "rate_limit");
        assert_eq!(json["error"]["canRetry"], true);
        assert_eq!(json["error"]["retryAfterSeconds"], 42);
        assert!(json.get("data").is_none());

        let ok = serde_json::to_value(ApiResponse::ok(vec!["tidy up".to_string()])).unwrap();
        assert_eq!(ok["success"], true);
        assert_eq!(ok["data"][0], "tidy up");
        assert!(ok.get("error").is_none());
    }

    #[test]
    fn test_daily_limit_response_omits_retry_after() {
        let json =
            serde_json::to_value(ApiResponse::<()>::denied(&Denial::daily_limit(200))).unwrap();
        assert_eq!(json["error"]["canRetry"], false);
        assert!(json["error"].get("retryAfterSeconds").is_none());
    }

    #[test]
    fn test_unexpected_error_is_unknown() {
        let response =
            ApiResponse::<()>::from_error(&DomainError::StoreUnavailable("down".to_string()));
        let error = response.error.unwrap();
        assert_eq!(error.kind, AiErrorKind::Unknown);
        assert!(error.can_retry);
        assert_eq!(error.retry_after_seconds, Some(30));
    }
}
