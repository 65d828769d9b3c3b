//! Observability records for governed calls.
//!
//! Writes here are best-effort; a failed write is logged and never changes
//! the outcome of the call being recorded.

use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult, UpstreamError};
use crate::domain::models::breaker::quota_marker_path;
use crate::domain::models::usage::{call_record_path, usage_day, CallSource, UsageRecord};
use crate::domain::ports::{Clock, DocumentStore};

pub struct UsageLog {
    store: Arc<dyn DocumentStore>,
    clock: Arc<dyn Clock>,
}

impl UsageLog {
    pub fn new(store: Arc<dyn DocumentStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub fn now(&self) -> chrono::DateTime<chrono::Utc> {
        self.clock.now()
    }

    /// Append a per-call record under the day's `calls` collection.
    pub async fn record(&self, record: &UsageRecord) {
        if let Err(e) = self.try_record(record).await {
            tracing::warn!(source = %record.source, error = %e, "Failed to write usage record");
        }
    }

    async fn try_record(&self, record: &UsageRecord) -> DomainResult<()> {
        let path = call_record_path(usage_day(record.timestamp), Uuid::new_v4())?;
        let document = match serde_json::to_value(record)? {
            serde_json::Value::Object(map) => map,
            _ => {
                return Err(DomainError::SerializationError(
                    "usage record did not serialize to an object".to_string(),
                ))
            }
        };
        self.store.set(&path, document).await
    }

    /// Flag that the upstream reported its quota as exhausted.
    pub async fn record_quota_exhausted(&self, source: &CallSource, error: &UpstreamError) {
        tracing::error!(source = %source, error = %error, "Upstream quota exhausted");
        if let Err(e) = self.try_record_quota_exhausted(source, error).await {
            tracing::warn!(error = %e, "Failed to write quota-exhausted marker");
        }
    }

    async fn try_record_quota_exhausted(&self, source: &CallSource, error: &UpstreamError) -> DomainResult<()> {
        let marker = json!({
            "lastOccurred": self.clock.now().to_rfc3339(),
            "source": source.as_str(),
            "errorMessage": error.to_string(),
        });
        let document = marker.as_object().cloned().unwrap_or_default();
        self.store.set(&quota_marker_path()?, document).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{InMemoryDocumentStore, ManualClock};
    use chrono::{TimeZone, Utc};

    #[tokio::test]
    async fn test_record_written_under_day() {
        let store = Arc::new(InMemoryDocumentStore::new());
        let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2026, 10, 16, 8, 0, 0).unwrap()));
        let log = UsageLog::new(store.clone(), clock.clone());

        log.record(&UsageRecord {
            source: CallSource::Daily,
            success: true,
            outcome: None,
            prompt_length: Some(12),
            response_length: Some(40),
            timestamp: clock.now(),
        })
        .await;

        let calls = store.list("apiUsage/global_2026-10-16/calls").await.unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].1["source"], "daily");
        assert_eq!(calls[0].1["promptLength"], 12);
        assert!(calls[0].1.get("outcome").is_none());
    }

    #[tokio::test]
    async fn test_quota_marker() {
        let store = Arc::new(InMemoryDocumentStore::new());
        let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2026, 10, 16, 8, 0, 0).unwrap()));
        let log = UsageLog::new(store.clone(), clock);

        log.record_quota_exhausted(
            &CallSource::Growth,
            &UpstreamError::QuotaExhausted("429".to_string()),
        )
        .await;

        let marker = store.get(&quota_marker_path().unwrap()).await.unwrap().unwrap();
        assert_eq!(marker["source"], "growth");
        assert!(marker["errorMessage"].as_str().unwrap().contains("Quota exhausted"));
    }

    #[tokio::test]
    async fn test_failures_are_swallowed() {
        let store = Arc::new(InMemoryDocumentStore::new());
        store.set_unavailable(true);
        let log = UsageLog::new(store, Arc::new(ManualClock::new(Utc::now())));

        log.record_quota_exhausted(&CallSource::Task, &UpstreamError::Timeout).await;
    }
}
