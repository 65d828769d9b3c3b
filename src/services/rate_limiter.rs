//! Daily and per-window call limits over shared counters.
//!
//! Counters live at deterministic paths keyed by UTC date and window index,
//! so a new day or window starts from zero without any reset job. Allowed
//! calls reserve their slot with atomic increments before upstream is
//! attempted; a caller that raced the counters past a limit takes its
//! reservation back and is denied.

use std::sync::Arc;

use crate::domain::errors::DomainResult;
use crate::domain::models::ai_error::Denial;
use crate::domain::models::config::RateLimitConfig;
use crate::domain::models::document::{integer_field, DocumentPath};
use crate::domain::models::usage::{
    daily_path, source_path, usage_day, window_index, window_path, window_remaining, CallSource,
    UsageSnapshot, COUNT_FIELD, TOTAL_CALLS_FIELD,
};
use crate::domain::ports::{Clock, DocumentStore};
use chrono::NaiveDate;

/// Outcome of a rate-limit check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RateDecision {
    Allowed,
    Denied(Denial),
}

impl RateDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed)
    }
}

pub struct RateLimiter {
    store: Arc<dyn DocumentStore>,
    clock: Arc<dyn Clock>,
    config: RateLimitConfig,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn DocumentStore>, clock: Arc<dyn Clock>, config: RateLimitConfig) -> Self {
        Self {
            store,
            clock,
            config,
        }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    async fn read_counter(&self, path: &DocumentPath, field: &str) -> DomainResult<i64> {
        Ok(self
            .store
            .get(path)
            .await?
            .map_or(0, |doc| integer_field(&doc, field)))
    }

    fn daily_denial(&self, source: &CallSource, total: i64) -> RateDecision {
        tracing::warn!(
            source = %source,
            total_calls = total,
            daily_limit = self.config.daily_limit,
            "Daily call limit reached"
        );
        RateDecision::Denied(Denial::daily_limit(self.config.daily_limit))
    }

    fn window_denial(&self, source: &CallSource, count: i64, now: chrono::DateTime<chrono::Utc>) -> RateDecision {
        let window = self.config.window();
        let retry_after = window_remaining(now, window);
        tracing::warn!(
            source = %source,
            window_calls = count,
            window_limit = self.config.window_limit,
            retry_after_secs = retry_after.as_secs(),
            "Window call limit reached"
        );
        RateDecision::Denied(Denial::rate_limit(self.config.window_limit, window, retry_after))
    }

    /// Check both limits and, when allowed, reserve one call against them.
    pub async fn check_and_record(&self, source: &CallSource) -> DomainResult<RateDecision> {
        let now = self.clock.now();
        let day = usage_day(now);
        let daily = daily_path(day)?;
        let window = window_path(day, window_index(now, self.config.window()))?;
        let per_source = source_path(day, source)?;
        let daily_limit = i64::from(self.config.daily_limit);
        let window_limit = i64::from(self.config.window_limit);

        let total = self.read_counter(&daily, TOTAL_CALLS_FIELD).await?;
        if total >= daily_limit {
            return Ok(self.daily_denial(source, total));
        }

        let count = self.read_counter(&window, COUNT_FIELD).await?;
        if count >= window_limit {
            return Ok(self.window_denial(source, count, now));
        }

        let total = self.store.atomic_increment(&daily, TOTAL_CALLS_FIELD, 1).await?;
        if total > daily_limit {
            self.store.atomic_increment(&daily, TOTAL_CALLS_FIELD, -1).await?;
            return Ok(self.daily_denial(source, total - 1));
        }

        let count = self.store.atomic_increment(&window, COUNT_FIELD, 1).await?;
        if count > window_limit {
            self.store.atomic_increment(&window, COUNT_FIELD, -1).await?;
            self.store.atomic_increment(&daily, TOTAL_CALLS_FIELD, -1).await?;
            return Ok(self.window_denial(source, count - 1, now));
        }

        self.store.atomic_increment(&per_source, COUNT_FIELD, 1).await?;

        tracing::debug!(
            source = %source,
            total_calls = total,
            window_calls = count,
            "Call reserved against rate limits"
        );
        Ok(RateDecision::Allowed)
    }

    /// Counter values for `day`; the window count is only reported for today.
    pub async fn usage(&self, day: NaiveDate) -> DomainResult<UsageSnapshot> {
        let now = self.clock.now();
        let daily = daily_path(day)?;
        let total_calls = self.read_counter(&daily, TOTAL_CALLS_FIELD).await?;

        let window_calls = if usage_day(now) == day {
            let window = window_path(day, window_index(now, self.config.window()))?;
            self.read_counter(&window, COUNT_FIELD).await?
        } else {
            0
        };

        let sources_collection = format!("{daily}/{}", crate::domain::models::usage::SOURCES_COLLECTION);
        let calls_per_source = self
            .store
            .list(&sources_collection)
            .await?
            .into_iter()
            .map(|(path, doc)| (path.id().to_string(), integer_field(&doc, COUNT_FIELD)))
            .collect();

        Ok(UsageSnapshot {
            date: day.format("%Y-%m-%d").to_string(),
            total_calls,
            daily_limit: self.config.daily_limit,
            window_calls,
            window_limit: self.config.window_limit,
            calls_per_source,
        })
    }

    pub async fn usage_today(&self) -> DomainResult<UsageSnapshot> {
        self.usage(usage_day(self.clock.now())).await
    }
}
