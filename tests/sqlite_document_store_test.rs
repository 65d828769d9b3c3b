//! SQLite-backed document store against a real database file.

mod common;

use ai_governor::adapters::sqlite::{database_url, initialize_database, PoolConfig};
use ai_governor::adapters::{ManualClock, MockUpstream, SqliteDocumentStore};
use ai_governor::domain::models::breaker::CircuitState;
use ai_governor::domain::models::cache::CacheKey;
use ai_governor::domain::models::config::Config;
use ai_governor::domain::models::document::DocumentPath;
use ai_governor::domain::models::usage::CallSource;
use ai_governor::domain::models::AiErrorKind;
use ai_governor::domain::ports::DocumentStore;
use ai_governor::services::{Governor, GovernorOutcome};
use serde_json::json;
use std::path::Path;
use std::sync::Arc;

use common::{temp_db_path, test_start};

async fn open(path: &Path) -> Arc<SqliteDocumentStore> {
    let url = database_url(path.to_str().unwrap());
    let pool = initialize_database(&url, Some(PoolConfig::with_max_connections(5)))
        .await
        .expect("Failed to initialize database");
    Arc::new(SqliteDocumentStore::new(pool))
}

#[tokio::test]
async fn concurrent_increments_are_not_lost() {
    let (_dir, db_path) = temp_db_path();
    let store = open(&db_path).await;
    let path = DocumentPath::new("apiUsage/global_2026-10-16").unwrap();

    let handles: Vec<_> = (0..20)
        .map(|_| {
            let store = store.clone();
            let path = path.clone();
            tokio::spawn(async move {
                for _ in 0..5 {
                    store.atomic_increment(&path, "totalCalls", 1).await.unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap();
    }

    let doc = store.get(&path).await.unwrap().unwrap();
    assert_eq!(doc["totalCalls"], 100);
}

#[tokio::test]
async fn documents_survive_reopen() {
    let (_dir, db_path) = temp_db_path();
    let path = DocumentPath::new("systemStatus/circuitBreaker").unwrap();

    {
        let store = open(&db_path).await;
        let doc = json!({"consecutiveFailures": 2}).as_object().cloned().unwrap();
        store.set(&path, doc).await.unwrap();
    }

    let store = open(&db_path).await;
    let doc = store.get(&path).await.unwrap().unwrap();
    assert_eq!(doc["consecutiveFailures"], 2);
    assert_eq!(store.atomic_increment(&path, "consecutiveFailures", 1).await.unwrap(), 3);
}

#[tokio::test]
async fn governors_on_separate_pools_share_state() {
    let (_dir, db_path) = temp_db_path();
    let clock = Arc::new(ManualClock::new(test_start()));
    let mut config = Config::default();
    config.rate_limit.window_limit = 2;
    config.circuit_breaker.failure_threshold = 2;

    let first = Governor::new(open(&db_path).await, clock.clone(), &config);
    let second = Governor::new(open(&db_path).await, clock.clone(), &config);
    let upstream = MockUpstream::succeeding("- Plant seeds");
    let key = CacheKey::new().with("age", 6);

    let fresh = first
        .suggest(&upstream, &key, &CallSource::Treehouse, "p")
        .await
        .unwrap();
    assert_eq!(fresh, GovernorOutcome::Fresh(vec!["Plant seeds".to_string()]));

    let cached = second
        .suggest(&upstream, &key, &CallSource::Treehouse, "p")
        .await
        .unwrap();
    assert!(cached.is_cached());

    second.generate(&upstream, &CallSource::Task, "p").await.unwrap();
    let denied = first.generate(&upstream, &CallSource::Task, "p").await.unwrap();
    assert_eq!(denied.denial().unwrap().kind, AiErrorKind::RateLimit);

    first.breaker().record_failure().await.unwrap();
    second.breaker().record_failure().await.unwrap();
    assert_eq!(
        first.breaker().state().await.unwrap().state,
        CircuitState::Open
    );
    assert_eq!(upstream.call_count(), 2);
}
