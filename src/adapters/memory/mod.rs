//! In-process adapters for tests and single-process use.

pub mod document_store;

pub use document_store::InMemoryDocumentStore;
