//! Port trait definitions (Hexagonal Architecture)
//!
//! This module defines async trait interfaces that infrastructure adapters must implement:
//! - DocumentStore: shared hierarchical document storage
//! - UpstreamClient: generative-AI text generation
//! - Clock: current time, replaceable in tests

pub mod clock;
pub mod document_store;
pub mod upstream;

pub use clock::Clock;
pub use document_store::DocumentStore;
pub use upstream::UpstreamClient;
