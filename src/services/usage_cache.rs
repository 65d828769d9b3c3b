//! Memoization of generated suggestion lists.
//!
//! The cache never fails its callers: store errors are logged and degrade to
//! a miss, a skipped write or an empty sweep.

use futures::future::join_all;
use std::sync::Arc;

use crate::domain::errors::DomainResult;
use crate::domain::models::cache::{CacheEntry, CacheKey, CACHE_COLLECTION};
use crate::domain::models::config::CacheConfig;
use crate::domain::ports::{Clock, DocumentStore};

pub struct UsageCache {
    store: Arc<dyn DocumentStore>,
    clock: Arc<dyn Clock>,
    config: CacheConfig,
}

impl UsageCache {
    pub fn new(store: Arc<dyn DocumentStore>, clock: Arc<dyn Clock>, config: CacheConfig) -> Self {
        Self {
            store,
            clock,
            config,
        }
    }

    /// Cached value for `key`, or `None` when absent, expired or unreadable.
    pub async fn get(&self, key: &CacheKey) -> Option<Vec<String>> {
        match self.try_get(key).await {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Cache read failed, treating as miss");
                None
            }
        }
    }

    pub async fn try_get(&self, key: &CacheKey) -> DomainResult<Option<Vec<String>>> {
        let path = key.document_path()?;
        let Some(document) = self.store.get(&path).await? else {
            tracing::debug!(key = %key, "Cache miss");
            return Ok(None);
        };

        let entry = CacheEntry::from_document(document)?;
        if entry.is_expired(self.clock.now()) {
            tracing::info!(key = %key, expired_at = %entry.expires_at.to_rfc3339(), "Cache entry expired");
            self.store.delete(&path).await?;
            return Ok(None);
        }

        tracing::info!(key = %key, items = entry.value.len(), "Cache hit");
        Ok(Some(entry.value))
    }

    /// Store `value` under `key` for the configured TTL, replacing any entry.
    pub async fn put(&self, key: &CacheKey, value: Vec<String>) {
        if let Err(e) = self.try_put(key, value).await {
            tracing::warn!(key = %key, error = %e, "Cache write failed, skipping");
        }
    }

    pub async fn try_put(&self, key: &CacheKey, value: Vec<String>) -> DomainResult<()> {
        let entry = CacheEntry::new(key, value, self.clock.now(), self.config.ttl());
        self.store
            .set(&key.document_path()?, entry.to_document()?)
            .await?;
        tracing::info!(key = %key, expires_at = %entry.expires_at.to_rfc3339(), "Cached suggestions");
        Ok(())
    }

    /// Delete every expired entry and return how many were removed.
    pub async fn sweep_expired(&self) -> usize {
        match self.try_sweep_expired().await {
            Ok(deleted) => deleted,
            Err(e) => {
                tracing::warn!(error = %e, "Cache sweep failed");
                0
            }
        }
    }

    pub async fn try_sweep_expired(&self) -> DomainResult<usize> {
        let now = self.clock.now();
        let expired: Vec<_> = self
            .store
            .list(CACHE_COLLECTION)
            .await?
            .into_iter()
            .filter(|(path, document)| {
                match CacheEntry::from_document(document.clone()) {
                    Ok(entry) => entry.is_expired(now),
                    Err(e) => {
                        tracing::debug!(path = %path, error = %e, "Skipping unreadable cache entry");
                        false
                    }
                }
            })
            .map(|(path, _)| path)
            .collect();

        let results = join_all(expired.iter().map(|path| self.store.delete(path))).await;
        let mut deleted = 0;
        for (path, result) in expired.iter().zip(results) {
            match result {
                Ok(()) => deleted += 1,
                Err(e) => tracing::warn!(path = %path, error = %e, "Failed to delete expired entry"),
            }
        }

        tracing::info!(deleted, "Swept expired cache entries");
        Ok(deleted)
    }
}
