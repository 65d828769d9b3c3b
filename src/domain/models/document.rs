//! Hierarchical document addressing.
//!
//! Paths alternate collection and document ids, `collection/doc[/collection/doc]*`,
//! so every document path has an even number of segments and its parent is a
//! collection path.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::errors::{DomainError, DomainResult};

/// JSON object stored at a document path.
pub type Document = serde_json::Map<String, serde_json::Value>;

/// Validated path to a single document.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DocumentPath(String);

impl DocumentPath {
    pub fn new(path: impl Into<String>) -> DomainResult<Self> {
        let path = path.into();
        let segments: Vec<&str> = path.split('/').collect();

        if segments.iter().any(|s| s.is_empty()) {
            return Err(DomainError::InvalidPath(format!(
                "{path}: empty path segment"
            )));
        }
        if segments.len() % 2 != 0 {
            return Err(DomainError::InvalidPath(format!(
                "{path}: document paths need an even number of segments"
            )));
        }

        Ok(Self(path))
    }

    /// `collection/id` at the root.
    pub fn root(collection: &str, id: &str) -> DomainResult<Self> {
        Self::new(format!("{collection}/{id}"))
    }

    /// `self/collection/id`.
    pub fn child(&self, collection: &str, id: &str) -> DomainResult<Self> {
        Self::new(format!("{}/{collection}/{id}", self.0))
    }

    /// Path of the collection holding this document.
    pub fn collection(&self) -> &str {
        self.0.rsplit_once('/').map_or("", |(parent, _)| parent)
    }

    /// Last path segment.
    pub fn id(&self) -> &str {
        self.0.rsplit_once('/').map_or(self.0.as_str(), |(_, id)| id)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for DocumentPath {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<DocumentPath> for String {
    fn from(path: DocumentPath) -> Self {
        path.0
    }
}

/// Reject field names the stores cannot address as a single top-level key.
pub fn validate_field(field: &str) -> DomainResult<()> {
    if field.is_empty() || field.contains('"') || field.contains('\\') {
        return Err(DomainError::InvalidField(field.to_string()));
    }
    Ok(())
}

/// Read an integer field, treating missing or non-integer values as zero.
pub fn integer_field(document: &Document, field: &str) -> i64 {
    document
        .get(field)
        .and_then(serde_json::Value::as_i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_paths() {
        let path = DocumentPath::new("apiUsage/global_2026-10-16").unwrap();
        assert_eq!(path.collection(), "apiUsage");
        assert_eq!(path.id(), "global_2026-10-16");

        let nested = path.child("windows", "42").unwrap();
        assert_eq!(nested.as_str(), "apiUsage/global_2026-10-16/windows/42");
        assert_eq!(nested.collection(), "apiUsage/global_2026-10-16/windows");
    }

    #[test]
    fn test_rejects_odd_segments() {
        assert!(DocumentPath::new("apiUsage").is_err());
        assert!(DocumentPath::new("a/b/c").is_err());
    }

    #[test]
    fn test_rejects_empty_segments() {
        assert!(DocumentPath::new("").is_err());
        assert!(DocumentPath::new("a//b/c").is_err());
        assert!(DocumentPath::new("/a/b").is_err());
    }

    #[test]
    fn test_field_validation() {
        assert!(validate_field("totalCalls").is_ok());
        assert!(validate_field("trial_3").is_ok());
        assert!(validate_field("").is_err());
        assert!(validate_field("bad\"name").is_err());
    }

    #[test]
    fn test_integer_field_defaults_to_zero() {
        let mut doc = Document::new();
        doc.insert("count".into(), 7.into());
        doc.insert("label".into(), "x".into());
        assert_eq!(integer_field(&doc, "count"), 7);
        assert_eq!(integer_field(&doc, "label"), 0);
        assert_eq!(integer_field(&doc, "missing"), 0);
    }
}
