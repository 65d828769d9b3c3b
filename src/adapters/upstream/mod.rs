//! Upstream generative-AI clients.

pub mod gemini;
pub mod mock;

pub use gemini::{GeminiClient, GeminiConfig};
pub use mock::MockUpstream;
