//! Bounded retry of governed calls.
//!
//! Waits the delay a denial suggests, capped at `max_wait`, and gives up at
//! once on denials that cannot succeed before the next day.

use std::future::Future;
use std::time::Duration;

use crate::domain::errors::DomainResult;
use crate::domain::models::ai_error::Denial;
use crate::domain::models::config::RetryConfig;
use crate::services::governor::GovernorOutcome;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    max_wait: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, max_wait: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            max_wait,
        }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(config.max_attempts, Duration::from_secs(config.max_wait_secs))
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Wait before retrying after `denial`, or `None` when retrying is pointless.
    pub fn delay_for(&self, denial: &Denial) -> Option<Duration> {
        denial
            .effective_retry_after()
            .map(|delay| delay.min(self.max_wait))
    }

    /// Run `operation` until it yields a value, a final denial, or attempts
    /// run out. Errors are returned immediately.
    pub async fn execute<T, F, Fut>(&self, mut operation: F) -> DomainResult<GovernorOutcome<T>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = DomainResult<GovernorOutcome<T>>>,
    {
        let mut attempt = 1;
        loop {
            let outcome = operation().await?;
            let GovernorOutcome::Denied(denial) = &outcome else {
                return Ok(outcome);
            };

            if attempt >= self.max_attempts {
                tracing::warn!(attempts = attempt, kind = %denial.kind, "Giving up after final attempt");
                return Ok(outcome);
            }

            let Some(delay) = self.delay_for(denial) else {
                tracing::debug!(kind = %denial.kind, "Denial is final, not retrying");
                return Ok(outcome);
            };

            tracing::warn!(
                attempt,
                max_attempts = self.max_attempts,
                kind = %denial.kind,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                "Call denied, retrying"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}
