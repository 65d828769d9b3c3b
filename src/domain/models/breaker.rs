//! Circuit breaker state as persisted in the document store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use super::document::{Document, DocumentPath};
use crate::domain::errors::{DomainError, DomainResult};

pub const SYSTEM_STATUS_COLLECTION: &str = "systemStatus";
pub const BREAKER_DOCUMENT: &str = "circuitBreaker";
pub const QUOTA_EXHAUSTED_DOCUMENT: &str = "quotaExhausted";

pub const CONSECUTIVE_FAILURES_FIELD: &str = "consecutiveFailures";

/// `systemStatus/circuitBreaker`
pub fn breaker_path() -> DomainResult<DocumentPath> {
    DocumentPath::root(SYSTEM_STATUS_COLLECTION, BREAKER_DOCUMENT)
}

/// `systemStatus/quotaExhausted`
pub fn quota_marker_path() -> DomainResult<DocumentPath> {
    DocumentPath::root(SYSTEM_STATUS_COLLECTION, QUOTA_EXHAUSTED_DOCUMENT)
}

/// Field claimed by the single trial call of a half-open epoch.
pub fn trial_field(epoch: i64) -> String {
    format!("trial_{epoch}")
}

/// Trial claim fields on `document` belonging to epochs before `current`.
pub fn stale_trial_fields(document: &Document, current: i64) -> Vec<String> {
    document
        .keys()
        .filter(|field| {
            field
                .strip_prefix("trial_")
                .and_then(|epoch| epoch.parse::<i64>().ok())
                .is_some_and(|epoch| epoch < current)
        })
        .cloned()
        .collect()
}

/// Circuit breaker states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Normal operation, calls flow through
    Closed,
    /// Calls are rejected until the cooldown passes
    Open,
    /// Cooldown passed; one trial call decides the next state
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Open => "open",
            Self::HalfOpen => "half_open",
        }
    }
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Persisted breaker document. Trial claim fields are not modelled here.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakerState {
    #[serde(default)]
    pub consecutive_failures: i64,
    #[serde(default)]
    pub open_until: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_updated: Option<DateTime<Utc>>,
}

impl BreakerState {
    pub fn closed(now: DateTime<Utc>) -> Self {
        Self {
            consecutive_failures: 0,
            open_until: None,
            last_updated: Some(now),
        }
    }

    pub fn tripped(consecutive_failures: i64, open_until: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        Self {
            consecutive_failures,
            open_until: Some(open_until),
            last_updated: Some(now),
        }
    }

    /// State implied by the stored fields at `now`.
    pub fn state_at(&self, now: DateTime<Utc>) -> CircuitState {
        match self.open_until {
            None => CircuitState::Closed,
            Some(until) if now < until => CircuitState::Open,
            Some(_) => CircuitState::HalfOpen,
        }
    }

    pub fn to_document(&self) -> DomainResult<Document> {
        match serde_json::to_value(self)? {
            serde_json::Value::Object(map) => Ok(map),
            _ => Err(DomainError::SerializationError(
                "breaker state did not serialize to an object".to_string(),
            )),
        }
    }

    pub fn from_document(document: Document) -> DomainResult<Self> {
        Ok(serde_json::from_value(serde_json::Value::Object(document))?)
    }
}

/// Result of asking the breaker whether a call may proceed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerCheck {
    /// Circuit closed, call allowed
    Closed,
    /// This caller holds the half-open trial slot for `epoch`
    Trial { epoch: i64 },
    /// Circuit open, call rejected
    Open { retry_after: Duration },
}

impl BreakerCheck {
    pub fn is_allowed(&self) -> bool {
        !self.is_open()
    }

    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open { .. })
    }
}

/// Breaker state for status reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakerSnapshot {
    pub state: CircuitState,
    pub consecutive_failures: i64,
    pub failure_threshold: u32,
    pub open_until: Option<DateTime<Utc>>,
    pub last_updated: Option<DateTime<Utc>>,
}
