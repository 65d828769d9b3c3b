//! Domain errors for the AI-call governor.

use thiserror::Error;

use super::models::ai_error::AiErrorKind;

/// Unexpected failures raised by the governor and its collaborators.
///
/// Expected denials (limits reached, breaker open) are never errors; they
/// travel as [`crate::services::GovernorOutcome::Denied`].
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Invalid document path: {0}")]
    InvalidPath(String),

    #[error("Invalid field name: {0}")]
    InvalidField(String),

    #[error("Invalid call source: {0:?}")]
    InvalidSource(String),

    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),
}

pub type DomainResult<T> = Result<T, DomainError>;

impl From<sqlx::Error> for DomainError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                DomainError::StoreUnavailable(err.to_string())
            }
            other => DomainError::DatabaseError(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        DomainError::SerializationError(err.to_string())
    }
}

/// Errors returned by an upstream generative-AI call.
///
/// Every variant counts as a failure for the circuit breaker; whether the
/// caller retries is decided separately from [`UpstreamError::kind`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum UpstreamError {
    /// Malformed request (HTTP 400)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Missing or rejected API key (HTTP 401, 403)
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Unknown model or endpoint (HTTP 404)
    #[error("Model or endpoint not found: {0}")]
    NotFound(String),

    /// Upstream quota exhausted (HTTP 429, RESOURCE_EXHAUSTED)
    #[error("Quota exhausted: {0}")]
    QuotaExhausted(String),

    /// Upstream server failure (HTTP 5xx)
    #[error("Upstream server error ({status}): {body}")]
    ServerError { status: u16, body: String },

    /// Connection-level failure
    #[error("Network error: {0}")]
    Network(String),

    /// No response within the allotted time
    #[error("Upstream request timed out")]
    Timeout,

    /// A 2xx response without any generated text
    #[error("Empty response from upstream - no text generated")]
    EmptyResponse,

    /// A 2xx response whose body could not be decoded
    #[error("Malformed upstream response: {0}")]
    MalformedResponse(String),

    /// Any other non-2xx status
    #[error("Unexpected upstream status ({status}): {body}")]
    Unexpected { status: u16, body: String },
}

impl UpstreamError {
    /// Map an HTTP status and body to an error variant.
    pub fn from_status(status: u16, body: String) -> Self {
        match status {
            400 => Self::InvalidRequest(body),
            401 | 403 => Self::AuthenticationFailed(body),
            404 => Self::NotFound(body),
            429 => Self::QuotaExhausted(body),
            500..=599 if body.contains("RESOURCE_EXHAUSTED") => Self::QuotaExhausted(body),
            500..=599 => Self::ServerError { status, body },
            _ => Self::Unexpected { status, body },
        }
    }

    /// Returns true if repeating the same request later may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::ServerError { .. } | Self::Network(_) | Self::Timeout | Self::EmptyResponse
        )
    }

    /// Returns true if the upstream refused the call because its quota ran out.
    pub fn is_quota_exhausted(&self) -> bool {
        matches!(self, Self::QuotaExhausted(_))
    }

    /// Error kind reported to callers.
    pub fn kind(&self) -> AiErrorKind {
        match self {
            Self::Network(_) | Self::Timeout => AiErrorKind::NetworkError,
            _ => AiErrorKind::ApiError,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_status_mapping() {
        assert!(matches!(
            UpstreamError::from_status(400, "bad".into()),
            UpstreamError::InvalidRequest(_)
        ));
        assert!(matches!(
            UpstreamError::from_status(401, "key".into()),
            UpstreamError::AuthenticationFailed(_)
        ));
        assert!(matches!(
            UpstreamError::from_status(403, "key".into()),
            UpstreamError::AuthenticationFailed(_)
        ));
        assert!(matches!(
            UpstreamError::from_status(404, "model".into()),
            UpstreamError::NotFound(_)
        ));
        assert!(UpstreamError::from_status(429, "slow down".into()).is_quota_exhausted());
        assert!(matches!(
            UpstreamError::from_status(503, "down".into()),
            UpstreamError::ServerError { status: 503, .. }
        ));
        assert!(matches!(
            UpstreamError::from_status(418, "teapot".into()),
            UpstreamError::Unexpected { status: 418, .. }
        ));
    }

    #[test]
    fn test_resource_exhausted_body_is_quota() {
        let err = UpstreamError::from_status(503, r#"{"status":"RESOURCE_EXHAUSTED"}"#.into());
        assert!(err.is_quota_exhausted());
    }

    #[test]
    fn test_transient_classification() {
        assert!(UpstreamError::Timeout.is_transient());
        assert!(UpstreamError::Network("reset".into()).is_transient());
        assert!(!UpstreamError::InvalidRequest("x".into()).is_transient());
        assert!(!UpstreamError::QuotaExhausted("x".into()).is_transient());
    }

    #[test]
    fn test_kind_mapping() {
        assert_eq!(UpstreamError::Timeout.kind(), AiErrorKind::NetworkError);
        assert_eq!(
            UpstreamError::Network("dns".into()).kind(),
            AiErrorKind::NetworkError
        );
        assert_eq!(UpstreamError::EmptyResponse.kind(), AiErrorKind::ApiError);
        assert_eq!(
            UpstreamError::ServerError {
                status: 500,
                body: String::new()
            }
            .kind(),
            AiErrorKind::ApiError
        );
    }

    #[test]
    fn test_sqlx_pool_timeout_is_unavailable() {
        let err: DomainError = sqlx::Error::PoolTimedOut.into();
        assert!(matches!(err, DomainError::StoreUnavailable(_)));
    }
}
