//! Port for the shared document store holding all governor state.

use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::models::document::{Document, DocumentPath};

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Read a document; `None` when absent.
    async fn get(&self, path: &DocumentPath) -> DomainResult<Option<Document>>;

    /// Create or fully replace a document.
    async fn set(&self, path: &DocumentPath, document: Document) -> DomainResult<()>;

    /// Delete a document. Deleting an absent document is not an error.
    async fn delete(&self, path: &DocumentPath) -> DomainResult<()>;

    /// Add `delta` to an integer field and return the new value.
    ///
    /// Creates the document and the field when missing; a non-integer field
    /// counts as zero. Concurrent increments never lose updates.
    async fn atomic_increment(&self, path: &DocumentPath, field: &str, delta: i64)
        -> DomainResult<i64>;

    /// Remove one top-level field. A missing document or field is not an error.
    async fn remove_field(&self, path: &DocumentPath, field: &str) -> DomainResult<()>;

    /// Documents directly inside a collection, ordered by path.
    async fn list(&self, collection: &str) -> DomainResult<Vec<(DocumentPath, Document)>>;
}
