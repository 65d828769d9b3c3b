//! Domain layer for the AI-call governor
//!
//! This module contains the document model, the governor's persisted state
//! and the ports its adapters implement.

pub mod errors;
pub mod models;
pub mod ports;

// Re-export error types for convenient access
pub use errors::{DomainError, DomainResult, UpstreamError};
