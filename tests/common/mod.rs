//! Common test utilities for integration tests
//!
//! Provides shared fixtures and helpers used across multiple integration
//! test files.

#![allow(dead_code)]

use ai_governor::adapters::{InMemoryDocumentStore, ManualClock};
use ai_governor::domain::models::config::Config;
use ai_governor::services::Governor;
use chrono::{DateTime, TimeZone, Utc};
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

/// Create a temporary directory for test isolation
pub fn temp_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp dir")
}

/// Create a temporary test database path
///
/// Returns the path to a SQLite database file in a temporary directory.
pub fn temp_db_path() -> (TempDir, PathBuf) {
    let dir = temp_dir();
    let db_path = dir.path().join("test.db");
    (dir, db_path)
}

/// Setup test logging
///
/// Call this at the beginning of tests that need logging.
pub fn setup_test_logging() {
    use tracing_subscriber::fmt;

    let _ = fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// Mid-morning UTC, far from any day boundary, at the start of a minute.
pub fn test_start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 16, 9, 30, 0).unwrap()
}

/// A governor over an in-memory store and a manually driven clock.
pub struct TestGovernor {
    pub governor: Governor,
    pub store: Arc<InMemoryDocumentStore>,
    pub clock: Arc<ManualClock>,
}

pub fn governor_with(config: Config) -> TestGovernor {
    let store = Arc::new(InMemoryDocumentStore::new());
    let clock = Arc::new(ManualClock::new(test_start()));
    let governor = Governor::new(store.clone(), clock.clone(), &config);
    TestGovernor {
        governor,
        store,
        clock,
    }
}

pub fn governor() -> TestGovernor {
    governor_with(Config::default())
}
