//! Subcommand implementations and the wiring they share.

pub mod breaker;
pub mod call;
pub mod status;
pub mod sweep;

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;

use crate::adapters::sqlite::{database_url, initialize_database, PoolConfig};
use crate::adapters::SqliteDocumentStore;
use crate::domain::models::config::Config;
use crate::infrastructure::config::ConfigLoader;

/// Load configuration from `path`, or from the project-local hierarchy.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => ConfigLoader::load_from_file(path),
        None => ConfigLoader::load(),
    }
}

/// Open the configured SQLite database as the shared document store.
pub async fn open_store(config: &Config) -> Result<Arc<SqliteDocumentStore>> {
    let url = database_url(&config.database.path);
    let pool = initialize_database(
        &url,
        Some(PoolConfig::with_max_connections(config.database.max_connections)),
    )
    .await
    .with_context(|| format!("Failed to open database at {}", config.database.path))?;
    Ok(Arc::new(SqliteDocumentStore::new(pool)))
}
