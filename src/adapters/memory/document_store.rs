//! In-memory DocumentStore.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::document::{integer_field, validate_field, Document, DocumentPath};
use crate::domain::ports::DocumentStore;

/// Document store held in process memory.
///
/// Increments run under the write lock, so they are atomic with respect to
/// every other operation on the same store.
#[derive(Debug, Default)]
pub struct InMemoryDocumentStore {
    documents: RwLock<BTreeMap<DocumentPath, Document>>,
    unavailable: AtomicBool,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every operation fail with `StoreUnavailable` until switched back.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub async fn len(&self) -> usize {
        self.documents.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.documents.read().await.is_empty()
    }

    fn ensure_available(&self) -> DomainResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(DomainError::StoreUnavailable(
                "in-memory store switched off".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn get(&self, path: &DocumentPath) -> DomainResult<Option<Document>> {
        self.ensure_available()?;
        Ok(self.documents.read().await.get(path).cloned())
    }

    async fn set(&self, path: &DocumentPath, document: Document) -> DomainResult<()> {
        self.ensure_available()?;
        self.documents.write().await.insert(path.clone(), document);
        Ok(())
    }

    async fn delete(&self, path: &DocumentPath) -> DomainResult<()> {
        self.ensure_available()?;
        self.documents.write().await.remove(path);
        Ok(())
    }

    async fn atomic_increment(&self, path: &DocumentPath, field: &str, delta: i64) -> DomainResult<i64> {
        self.ensure_available()?;
        validate_field(field)?;

        let mut documents = self.documents.write().await;
        let document = documents.entry(path.clone()).or_default();
        let value = integer_field(document, field) + delta;
        document.insert(field.to_string(), value.into());
        Ok(value)
    }

    async fn remove_field(&self, path: &DocumentPath, field: &str) -> DomainResult<()> {
        self.ensure_available()?;
        validate_field(field)?;

        if let Some(document) = self.documents.write().await.get_mut(path) {
            document.remove(field);
        }
        Ok(())
    }

    async fn list(&self, collection: &str) -> DomainResult<Vec<(DocumentPath, Document)>> {
        self.ensure_available()?;
        Ok(self
            .documents
            .read()
            .await
            .iter()
            .filter(|(path, _)| path.collection() == collection)
            .map(|(path, doc)| (path.clone(), doc.clone()))
            .collect())
    }
}
