//! SQLite adapter for DocumentStore.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;

use crate::adapters::sqlite::parse_document;
use crate::domain::errors::DomainResult;
use crate::domain::models::document::{validate_field, Document, DocumentPath};
use crate::domain::ports::DocumentStore;

#[derive(Clone)]
pub struct SqliteDocumentStore {
    pool: SqlitePool,
}

impl SqliteDocumentStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct DocumentRow {
    path: String,
    body: String,
}

fn row_to_document(row: DocumentRow) -> DomainResult<(DocumentPath, Document)> {
    Ok((DocumentPath::new(row.path)?, parse_document(&row.body)?))
}

/// JSON path addressing one top-level field.
fn json_path(field: &str) -> String {
    format!("$.\"{field}\"")
}

#[async_trait]
impl DocumentStore for SqliteDocumentStore {
    async fn get(&self, path: &DocumentPath) -> DomainResult<Option<Document>> {
        let body: Option<String> = sqlx::query_scalar("SELECT body FROM documents WHERE path = ?")
            .bind(path.as_str())
            .fetch_optional(&self.pool)
            .await?;

        body.map(|b| parse_document(&b)).transpose()
    }

    async fn set(&self, path: &DocumentPath, document: Document) -> DomainResult<()> {
        let body = serde_json::to_string(&document)?;

        sqlx::query(
            r#"INSERT INTO documents (path, collection, body, updated_at)
               VALUES (?, ?, ?, ?)
               ON CONFLICT(path) DO UPDATE SET
                   body = excluded.body,
                   updated_at = excluded.updated_at"#,
        )
        .bind(path.as_str())
        .bind(path.collection())
        .bind(body)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete(&self, path: &DocumentPath) -> DomainResult<()> {
        sqlx::query("DELETE FROM documents WHERE path = ?")
            .bind(path.as_str())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn atomic_increment(&self, path: &DocumentPath, field: &str, delta: i64) -> DomainResult<i64> {
        validate_field(field)?;
        let json_path = json_path(field);

        // Single statement, so SQLite's write lock serializes concurrent increments.
        let value: i64 = sqlx::query_scalar(
            r#"INSERT INTO documents (path, collection, body, updated_at)
               VALUES (?, ?, json_object(?, ?), ?)
               ON CONFLICT(path) DO UPDATE SET
                   body = json_set(
                       documents.body,
                       ?,
                       COALESCE(
                           CASE WHEN json_type(documents.body, ?) = 'integer'
                                THEN json_extract(documents.body, ?) END,
                           0
                       ) + ?
                   ),
                   updated_at = excluded.updated_at
               RETURNING json_extract(body, ?)"#,
        )
        .bind(path.as_str())
        .bind(path.collection())
        .bind(field)
        .bind(delta)
        .bind(Utc::now().to_rfc3339())
        .bind(&json_path)
        .bind(&json_path)
        .bind(&json_path)
        .bind(delta)
        .bind(&json_path)
        .fetch_one(&self.pool)
        .await?;

        Ok(value)
    }

    async fn remove_field(&self, path: &DocumentPath, field: &str) -> DomainResult<()> {
        validate_field(field)?;

        sqlx::query("UPDATE documents SET body = json_remove(body, ?), updated_at = ? WHERE path = ?")
            .bind(json_path(field))
            .bind(Utc::now().to_rfc3339())
            .bind(path.as_str())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn list(&self, collection: &str) -> DomainResult<Vec<(DocumentPath, Document)>> {
        let rows: Vec<DocumentRow> =
            sqlx::query_as("SELECT path, body FROM documents WHERE collection = ? ORDER BY path")
                .bind(collection)
                .fetch_all(&self.pool)
                .await?;

        rows.into_iter().map(row_to_document).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::initialize_test_database;
    use serde_json::json;

    async fn setup_store() -> SqliteDocumentStore {
        SqliteDocumentStore::new(initialize_test_database().await.unwrap())
    }

    fn doc(value: serde_json::Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_set_get_delete() {
        let store = setup_store().await;
        let path = DocumentPath::new("aiSuggestionsCache/age=7").unwrap();

        assert!(store.get(&path).await.unwrap().is_none());

        store.set(&path, doc(json!({"suggestions": ["a"]}))).await.unwrap();
        let loaded = store.get(&path).await.unwrap().unwrap();
        assert_eq!(loaded["suggestions"], json!(["a"]));

        store.set(&path, doc(json!({"other": 1}))).await.unwrap();
        let replaced = store.get(&path).await.unwrap().unwrap();
        assert!(!replaced.contains_key("suggestions"));

        store.delete(&path).await.unwrap();
        assert!(store.get(&path).await.unwrap().is_none());
        store.delete(&path).await.unwrap();
    }

    #[tokio::test]
    async fn test_atomic_increment_creates_and_adds() {
        let store = setup_store().await;
        let path = DocumentPath::new("apiUsage/global_2026-10-16").unwrap();

        assert_eq!(store.atomic_increment(&path, "totalCalls", 1).await.unwrap(), 1);
        assert_eq!(store.atomic_increment(&path, "totalCalls", 1).await.unwrap(), 2);
        assert_eq!(store.atomic_increment(&path, "totalCalls", -1).await.unwrap(), 1);
        assert_eq!(store.atomic_increment(&path, "other", 5).await.unwrap(), 5);

        let loaded = store.get(&path).await.unwrap().unwrap();
        assert_eq!(loaded["totalCalls"], 1);
        assert_eq!(loaded["other"], 5);
    }

    #[tokio::test]
    async fn test_atomic_increment_treats_non_integer_as_zero() {
        let store = setup_store().await;
        let path = DocumentPath::new("systemStatus/circuitBreaker").unwrap();
        store.set(&path, doc(json!({"consecutiveFailures": "x", "keep": true}))).await.unwrap();

        assert_eq!(
            store.atomic_increment(&path, "consecutiveFailures", 1).await.unwrap(),
            1
        );
        let loaded = store.get(&path).await.unwrap().unwrap();
        assert_eq!(loaded["keep"], true);
    }

    #[tokio::test]
    async fn test_atomic_increment_rejects_bad_field() {
        let store = setup_store().await;
        let path = DocumentPath::new("apiUsage/global_2026-10-16").unwrap();
        assert!(store.atomic_increment(&path, "bad\"field", 1).await.is_err());
    }

    #[tokio::test]
    async fn test_remove_field_keeps_the_rest() {
        let store = setup_store().await;
        let path = DocumentPath::new("systemStatus/circuitBreaker").unwrap();
        store
            .set(&path, doc(json!({"consecutiveFailures": 5, "trial_0": 0, "trial_1": 1})))
            .await
            .unwrap();

        store.remove_field(&path, "trial_0").await.unwrap();
        store.remove_field(&path, "missing").await.unwrap();

        let loaded = store.get(&path).await.unwrap().unwrap();
        assert!(!loaded.contains_key("trial_0"));
        assert_eq!(loaded["trial_1"], 1);
        assert_eq!(loaded["consecutiveFailures"], 5);

        let absent = DocumentPath::new("systemStatus/quotaExhausted").unwrap();
        store.remove_field(&absent, "trial_0").await.unwrap();
        assert!(store.get(&absent).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_is_scoped_to_collection() {
        let store = setup_store().await;
        let day = DocumentPath::new("apiUsage/global_2026-10-16").unwrap();
        store.atomic_increment(&day, "totalCalls", 1).await.unwrap();
        store
            .atomic_increment(&day.child("sources", "daily").unwrap(), "count", 1)
            .await
            .unwrap();
        store
            .atomic_increment(&day.child("sources", "task").unwrap(), "count", 2)
            .await
            .unwrap();

        let sources = store
            .list("apiUsage/global_2026-10-16/sources")
            .await
            .unwrap();
        let ids: Vec<_> = sources.iter().map(|(p, _)| p.id().to_string()).collect();
        assert_eq!(ids, vec!["daily", "task"]);

        assert_eq!(store.list("apiUsage").await.unwrap().len(), 1);
    }
}
