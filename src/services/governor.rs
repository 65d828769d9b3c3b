//! Composition of the call policies.
//!
//! Every governed call runs the same pipeline:
//! circuit breaker, cache (memoized calls only), concurrency gate, rate
//! limiter, then the upstream call under a timeout. Expected refusals come
//! back as [`GovernorOutcome::Denied`]; only store failures before the
//! upstream call surface as errors.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

use crate::domain::errors::{DomainResult, UpstreamError};
use crate::domain::models::ai_error::{ApiResponse, Denial};
use crate::domain::models::breaker::BreakerCheck;
use crate::domain::models::cache::CacheKey;
use crate::domain::models::config::Config;
use crate::domain::models::usage::{CallSource, UsageRecord};
use crate::domain::ports::{Clock, DocumentStore, UpstreamClient};
use crate::services::circuit_breaker::CircuitBreakerService;
use crate::services::rate_limiter::{RateDecision, RateLimiter};
use crate::services::usage_cache::UsageCache;
use crate::services::usage_log::UsageLog;

/// Result of a governed call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GovernorOutcome<T> {
    /// Produced by the upstream for this call
    Fresh(T),
    /// Served from the cache without touching quota or upstream
    Cached(T),
    /// Refused by a policy or failed upstream
    Denied(Denial),
}

impl<T> GovernorOutcome<T> {
    pub fn value(&self) -> Option<&T> {
        match self {
            Self::Fresh(value) | Self::Cached(value) => Some(value),
            Self::Denied(_) => None,
        }
    }

    pub fn into_value(self) -> Option<T> {
        match self {
            Self::Fresh(value) | Self::Cached(value) => Some(value),
            Self::Denied(_) => None,
        }
    }

    pub fn denial(&self) -> Option<&Denial> {
        match self {
            Self::Denied(denial) => Some(denial),
            _ => None,
        }
    }

    pub fn is_denied(&self) -> bool {
        matches!(self, Self::Denied(_))
    }

    pub fn is_cached(&self) -> bool {
        matches!(self, Self::Cached(_))
    }

    pub fn into_response(self) -> ApiResponse<T> {
        match self {
            Self::Fresh(value) | Self::Cached(value) => ApiResponse::ok(value),
            Self::Denied(denial) => ApiResponse::denied(&denial),
        }
    }
}

/// Split a generated reply into suggestion lines, dropping list markers.
pub fn parse_suggestions(text: &str) -> Vec<String> {
    text.lines()
        .map(|line| {
            line.trim()
                .trim_start_matches(|c: char| c == '-' || c == '*' || c == '•')
                .trim()
        })
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

pub struct Governor {
    breaker: CircuitBreakerService,
    cache: UsageCache,
    limiter: RateLimiter,
    usage_log: UsageLog,
    gate: Arc<Semaphore>,
    max_concurrent: usize,
    timeout: Duration,
}

impl Governor {
    pub fn new(store: Arc<dyn DocumentStore>, clock: Arc<dyn Clock>, config: &Config) -> Self {
        let max_concurrent = config.governor.max_concurrent_requests;
        Self {
            breaker: CircuitBreakerService::new(
                store.clone(),
                clock.clone(),
                config.circuit_breaker.clone(),
            ),
            cache: UsageCache::new(store.clone(), clock.clone(), config.cache.clone()),
            limiter: RateLimiter::new(store.clone(), clock.clone(), config.rate_limit.clone()),
            usage_log: UsageLog::new(store, clock),
            gate: Arc::new(Semaphore::new(max_concurrent)),
            max_concurrent,
            timeout: config.upstream.timeout(),
        }
    }

    pub fn breaker(&self) -> &CircuitBreakerService {
        &self.breaker
    }

    pub fn cache(&self) -> &UsageCache {
        &self.cache
    }

    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    /// Memoized call: serves `key` from the cache when possible and caches a
    /// fresh result.
    pub async fn call<F, Fut>(
        &self,
        key: &CacheKey,
        source: &CallSource,
        invoke: F,
    ) -> DomainResult<GovernorOutcome<Vec<String>>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<String>, UpstreamError>>,
    {
        let check = self.breaker.check().await?;
        if let BreakerCheck::Open { retry_after } = check {
            return Ok(self.deny_open(source, retry_after).await);
        }

        if let Some(value) = self.cache.get(key).await {
            self.breaker.release_trial(&check).await?;
            tracing::debug!(key = %key, source = %source, "Served from cache");
            return Ok(GovernorOutcome::Cached(value));
        }

        let outcome = self
            .guarded(check, source, None, invoke, |value: &Vec<String>| {
                value.iter().map(String::len).sum()
            })
            .await?;

        if let GovernorOutcome::Fresh(value) = &outcome {
            self.cache.put(key, value.clone()).await;
        }
        Ok(outcome)
    }

    /// Governed call whose result is not memoized.
    pub async fn call_uncached<T, F, Fut>(
        &self,
        source: &CallSource,
        invoke: F,
    ) -> DomainResult<GovernorOutcome<T>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, UpstreamError>>,
    {
        self.uncached(source, None, invoke, |_: &T| 0).await
    }

    /// Generate free text through `upstream` without caching.
    pub async fn generate(
        &self,
        upstream: &dyn UpstreamClient,
        source: &CallSource,
        prompt: &str,
    ) -> DomainResult<GovernorOutcome<String>> {
        self.uncached(source, Some(prompt.len()), || upstream.generate(prompt), String::len)
            .await
    }

    /// Generate a suggestion list through `upstream`, memoized under `key`.
    pub async fn suggest(
        &self,
        upstream: &dyn UpstreamClient,
        key: &CacheKey,
        source: &CallSource,
        prompt: &str,
    ) -> DomainResult<GovernorOutcome<Vec<String>>> {
        self.call(key, source, move || async move {
            let text = upstream.generate(prompt).await?;
            let suggestions = parse_suggestions(&text);
            if suggestions.is_empty() {
                return Err(UpstreamError::EmptyResponse);
            }
            Ok(suggestions)
        })
        .await
    }

    async fn uncached<T, F, Fut, M>(
        &self,
        source: &CallSource,
        prompt_length: Option<usize>,
        invoke: F,
        measure: M,
    ) -> DomainResult<GovernorOutcome<T>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, UpstreamError>>,
        M: Fn(&T) -> usize,
    {
        let check = self.breaker.check().await?;
        if let BreakerCheck::Open { retry_after } = check {
            return Ok(self.deny_open(source, retry_after).await);
        }
        self.guarded(check, source, prompt_length, invoke, measure).await
    }

    async fn deny_open<T>(&self, source: &CallSource, retry_after: Duration) -> GovernorOutcome<T> {
        let denial = Denial::circuit_open(retry_after);
        tracing::warn!(
            source = %source,
            kind = %denial.kind,
            retry_after_secs = denial.retry_after_secs(),
            "Call blocked by open circuit"
        );
        self.record(source, None, None, Some(&denial)).await;
        GovernorOutcome::Denied(denial)
    }

    /// Concurrency gate, rate limiter and the upstream call itself.
    async fn guarded<T, F, Fut, M>(
        &self,
        check: BreakerCheck,
        source: &CallSource,
        prompt_length: Option<usize>,
        invoke: F,
        measure: M,
    ) -> DomainResult<GovernorOutcome<T>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, UpstreamError>>,
        M: Fn(&T) -> usize,
    {
        let Ok(_permit) = self.gate.clone().try_acquire_owned() else {
            self.breaker.release_trial(&check).await?;
            let denial = Denial::concurrency_limit(self.max_concurrent);
            tracing::warn!(source = %source, kind = %denial.kind, "Too many concurrent upstream calls");
            self.record(source, prompt_length, None, Some(&denial)).await;
            return Ok(GovernorOutcome::Denied(denial));
        };

        match self.limiter.check_and_record(source).await {
            Ok(RateDecision::Allowed) => {}
            Ok(RateDecision::Denied(denial)) => {
                self.breaker.release_trial(&check).await?;
                self.record(source, prompt_length, None, Some(&denial)).await;
                return Ok(GovernorOutcome::Denied(denial));
            }
            Err(e) => {
                if let Err(release_err) = self.breaker.release_trial(&check).await {
                    tracing::warn!(error = %release_err, "Failed to release trial slot");
                }
                return Err(e);
            }
        }

        tracing::info!(source = %source, prompt_length, trial = !matches!(check, BreakerCheck::Closed), "Calling upstream");
        let started = std::time::Instant::now();
        let result = match tokio::time::timeout(self.timeout, invoke()).await {
            Ok(result) => result,
            Err(_) => Err(UpstreamError::Timeout),
        };
        let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        match result {
            Ok(value) => {
                if let Err(e) = self.breaker.record_success().await {
                    tracing::warn!(error = %e, "Failed to record upstream success");
                }
                let response_length = measure(&value);
                tracing::info!(source = %source, elapsed_ms, response_length, "Upstream call succeeded");
                self.record(source, prompt_length, Some(response_length), None).await;
                Ok(GovernorOutcome::Fresh(value))
            }
            Err(err) => {
                if err.is_quota_exhausted() {
                    self.usage_log.record_quota_exhausted(source, &err).await;
                }
                if let Err(e) = self.breaker.record_failure().await {
                    tracing::warn!(error = %e, "Failed to record upstream failure");
                }
                let denial = Denial::from_upstream(&err);
                tracing::warn!(
                    source = %source,
                    elapsed_ms,
                    kind = %denial.kind,
                    transient = err.is_transient(),
                    error = %err,
                    "Upstream call failed"
                );
                self.record(source, prompt_length, None, Some(&denial)).await;
                Ok(GovernorOutcome::Denied(denial))
            }
        }
    }

    async fn record(
        &self,
        source: &CallSource,
        prompt_length: Option<usize>,
        response_length: Option<usize>,
        denial: Option<&Denial>,
    ) {
        let record = UsageRecord {
            source: source.clone(),
            success: denial.is_none(),
            outcome: denial.map(|d| d.kind.as_str().to_string()),
            prompt_length,
            response_length: response_length.filter(|len| *len > 0),
            timestamp: self.usage_log.now(),
        };
        self.usage_log.record(&record).await;
    }
}
