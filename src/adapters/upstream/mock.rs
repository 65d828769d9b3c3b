//! Scripted upstream client for testing.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;

use crate::domain::errors::UpstreamError;
use crate::domain::ports::UpstreamClient;

/// Upstream that replays scripted results, then falls back to a default.
pub struct MockUpstream {
    script: Mutex<VecDeque<Result<String, UpstreamError>>>,
    default_response: Result<String, UpstreamError>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl MockUpstream {
    /// Always succeeds with `text` unless scripted otherwise.
    pub fn succeeding(text: impl Into<String>) -> Self {
        Self::with_default(Ok(text.into()))
    }

    /// Always fails with `error` unless scripted otherwise.
    pub fn failing(error: UpstreamError) -> Self {
        Self::with_default(Err(error))
    }

    fn with_default(default_response: Result<String, UpstreamError>) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            default_response,
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Sleep before every response.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Queue a result to be returned before the default.
    pub async fn push(&self, result: Result<String, UpstreamError>) {
        self.script.lock().await.push_back(result);
    }

    /// Number of `generate` calls received.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl UpstreamClient for MockUpstream {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn generate(&self, _prompt: &str) -> Result<String, UpstreamError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let scripted = self.script.lock().await.pop_front();
        scripted.unwrap_or_else(|| self.default_response.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_script_then_default() {
        let mock = MockUpstream::succeeding("ok");
        mock.push(Err(UpstreamError::Timeout)).await;

        assert_eq!(mock.generate("p").await, Err(UpstreamError::Timeout));
        assert_eq!(mock.generate("p").await, Ok("ok".to_string()));
        assert_eq!(mock.call_count(), 2);
    }
}
