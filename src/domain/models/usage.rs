//! Usage counters, call sources and per-call records.

use chrono::{DateTime, NaiveDate, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use super::document::DocumentPath;
use crate::domain::errors::{DomainError, DomainResult};

pub const USAGE_COLLECTION: &str = "apiUsage";
pub const WINDOWS_COLLECTION: &str = "windows";
pub const SOURCES_COLLECTION: &str = "sources";
pub const CALLS_COLLECTION: &str = "calls";

/// Daily counter field on the usage document.
pub const TOTAL_CALLS_FIELD: &str = "totalCalls";
/// Counter field on window and source documents.
pub const COUNT_FIELD: &str = "count";

/// Feature that triggered an upstream call.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum CallSource {
    Daily,
    Weekly,
    Summary,
    Manual,
    Treehouse,
    Growth,
    Task,
    Custom(String),
}

impl CallSource {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Summary => "summary",
            Self::Manual => "manual",
            Self::Treehouse => "treehouse",
            Self::Growth => "growth",
            Self::Task => "task",
            Self::Custom(name) => name,
        }
    }
}

impl fmt::Display for CallSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CallSource {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "daily" => Self::Daily,
            "weekly" => Self::Weekly,
            "summary" => Self::Summary,
            "manual" => Self::Manual,
            "treehouse" => Self::Treehouse,
            "growth" => Self::Growth,
            "task" => Self::Task,
            "" => return Err(DomainError::InvalidSource(s.to_string())),
            other if other.contains('/') => return Err(DomainError::InvalidSource(s.to_string())),
            other => Self::Custom(other.to_string()),
        })
    }
}

impl TryFrom<String> for CallSource {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<CallSource> for String {
    fn from(source: CallSource) -> Self {
        source.as_str().to_string()
    }
}

/// UTC calendar day a timestamp falls on.
pub fn usage_day(now: DateTime<Utc>) -> NaiveDate {
    now.date_naive()
}

/// Index of the fixed window, counted from UTC midnight.
pub fn window_index(now: DateTime<Utc>, window: Duration) -> u64 {
    u64::from(now.num_seconds_from_midnight()) / window.as_secs().max(1)
}

/// Time left in the current window; always at least one second.
pub fn window_remaining(now: DateTime<Utc>, window: Duration) -> Duration {
    let window_secs = window.as_secs().max(1);
    let elapsed = u64::from(now.num_seconds_from_midnight()) % window_secs;
    Duration::from_secs(window_secs - elapsed)
}

/// `apiUsage/global_{YYYY-MM-DD}`
pub fn daily_path(day: NaiveDate) -> DomainResult<DocumentPath> {
    DocumentPath::root(USAGE_COLLECTION, &format!("global_{}", day.format("%Y-%m-%d")))
}

/// `apiUsage/global_{date}/windows/{bucket}`
pub fn window_path(day: NaiveDate, bucket: u64) -> DomainResult<DocumentPath> {
    daily_path(day)?.child(WINDOWS_COLLECTION, &bucket.to_string())
}

/// `apiUsage/global_{date}/sources/{source}`
pub fn source_path(day: NaiveDate, source: &CallSource) -> DomainResult<DocumentPath> {
    daily_path(day)?.child(SOURCES_COLLECTION, source.as_str())
}

/// `apiUsage/global_{date}` calls collection, one document per governed call.
pub fn call_record_path(day: NaiveDate, id: uuid::Uuid) -> DomainResult<DocumentPath> {
    daily_path(day)?.child(CALLS_COLLECTION, &id.to_string())
}

/// Counter values for one day, used for status reporting.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageSnapshot {
    pub date: String,
    pub total_calls: i64,
    pub daily_limit: u32,
    /// Calls in the current window; zero for days other than today.
    pub window_calls: i64,
    pub window_limit: u32,
    pub calls_per_source: BTreeMap<String, i64>,
}

impl UsageSnapshot {
    pub fn daily_remaining(&self) -> i64 {
        (i64::from(self.daily_limit) - self.total_calls).max(0)
    }
}

/// Observability record written for every governed call that reached the
/// upstream or was denied by policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageRecord {
    pub source: CallSource,
    pub success: bool,
    /// Error kind when the call did not succeed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt_length: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_length: Option<usize>,
    pub timestamp: DateTime<Utc>,
}
