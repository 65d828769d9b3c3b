//! Port for the external generative-AI endpoint.

use async_trait::async_trait;

use crate::domain::errors::UpstreamError;

#[async_trait]
pub trait UpstreamClient: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &'static str;

    /// Generate text for a prompt. An empty generation is an error.
    async fn generate(&self, prompt: &str) -> Result<String, UpstreamError>;
}
