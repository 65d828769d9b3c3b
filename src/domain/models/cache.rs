//! Suggestion cache keys and entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use super::document::{Document, DocumentPath};
use crate::domain::errors::{DomainError, DomainResult};

/// Collection holding memoized suggestion lists.
pub const CACHE_COLLECTION: &str = "aiSuggestionsCache";

/// Composite cache key built from caller discriminators.
///
/// Discriminators are kept sorted by name, so the order they are supplied in
/// never changes the key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct CacheKey {
    parts: BTreeMap<String, String>,
}

impl CacheKey {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a discriminator.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.parts.insert(name.into(), value.to_string());
        self
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: ToString,
    {
        pairs
            .into_iter()
            .fold(Self::new(), |key, (name, value)| key.with(name, value))
    }

    /// Parse `name=value` discriminators, as given on the command line.
    pub fn parse_pairs<S: AsRef<str>>(pairs: &[S]) -> DomainResult<Self> {
        let mut key = Self::new();
        for pair in pairs {
            let pair = pair.as_ref();
            let (name, value) = pair.split_once('=').ok_or_else(|| {
                DomainError::ValidationFailed(format!("cache key part {pair:?} is not name=value"))
            })?;
            if name.is_empty() {
                return Err(DomainError::ValidationFailed(format!(
                    "cache key part {pair:?} has an empty name"
                )));
            }
            key = key.with(name, value);
        }
        Ok(key)
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// Canonical, path-safe document id: `age=7_goal=focus`.
    pub fn document_id(&self) -> String {
        if self.parts.is_empty() {
            return "_".to_string();
        }
        self.parts
            .iter()
            .map(|(name, value)| format!("{}={}", escape(name), escape(value)))
            .collect::<Vec<_>>()
            .join("_")
    }

    pub fn document_path(&self) -> DomainResult<DocumentPath> {
        DocumentPath::root(CACHE_COLLECTION, &self.document_id())
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.document_id())
    }
}

fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '%' => out.push_str("%25"),
            '/' => out.push_str("%2F"),
            '_' => out.push_str("%5F"),
            '=' => out.push_str("%3D"),
            other => out.push(other),
        }
    }
    out
}

/// A memoized upstream result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    pub key: String,
    #[serde(rename = "suggestions")]
    pub value: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl CacheEntry {
    pub fn new(key: &CacheKey, value: Vec<String>, now: DateTime<Utc>, ttl: chrono::Duration) -> Self {
        Self {
            key: key.document_id(),
            value,
            created_at: now,
            expires_at: now + ttl,
        }
    }

    /// Entries stay valid up to and including `expires_at`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    pub fn to_document(&self) -> DomainResult<Document> {
        match serde_json::to_value(self)? {
            serde_json::Value::Object(map) => Ok(map),
            _ => Err(DomainError::SerializationError(
                "cache entry did not serialize to an object".to_string(),
            )),
        }
    }

    pub fn from_document(document: Document) -> DomainResult<Self> {
        Ok(serde_json::from_value(serde_json::Value::Object(document))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn test_key_is_order_independent() {
        let a = CacheKey::new().with("age", 7).with("goal", "focus");
        let b = CacheKey::new().with("goal", "focus").with("age", 7);
        assert_eq!(a, b);
        assert_eq!(a.document_id(), "age=7_goal=focus");
    }

    #[test]
    fn test_key_escapes_separators() {
        let key = CacheKey::new().with("goal", "a/b_c=d%");
        assert_eq!(key.document_id(), "goal=a%2Fb%5Fc%3Dd%25");
        assert!(key.document_path().is_ok());
    }

    #[test]
    fn test_distinct_tuples_do_not_collide() {
        let a = CacheKey::new().with("a", "1_b=2");
        let b = CacheKey::new().with("a", "1").with("b", "2");
        assert_ne!(a.document_id(), b.document_id());
    }

    #[test]
    fn test_parse_pairs() {
        let key = CacheKey::parse_pairs(&["goal=focus", "age=7"]).unwrap();
        assert_eq!(key, CacheKey::from_pairs([("age", "7"), ("goal", "focus")]));
        assert!(CacheKey::parse_pairs(&["nope"]).is_err());
        assert!(CacheKey::parse_pairs(&["=x"]).is_err());
    }

    #[test]
    fn test_entry_ttl_invariant() {
        let now = Utc.with_ymd_and_hms(2026, 10, 16, 8, 0, 0).unwrap();
        let key = CacheKey::new().with("age", 7);
        let entry = CacheEntry::new(&key, vec!["read".into()], now, Duration::days(7));

        assert_eq!(entry.expires_at, entry.created_at + Duration::days(7));
        assert!(!entry.is_expired(entry.expires_at));
        assert!(entry.is_expired(entry.expires_at + Duration::seconds(1)));
    }

    #[test]
    fn test_entry_document_shape() {
        let now = Utc.with_ymd_and_hms(2026, 10, 16, 8, 0, 0).unwrap();
        let key = CacheKey::new().with("goal", "focus");
        let entry = CacheEntry::new(&key, vec!["a".into(), "b".into()], now, Duration::days(7));

        let doc = entry.to_document().unwrap();
        assert_eq!(doc["suggestions"], serde_json::json!(["a", "b"]));
        assert!(doc.contains_key("expiresAt"));
        assert_eq!(CacheEntry::from_document(doc).unwrap(), entry);
    }
}
