//! AI Governor - guarded access to a generative-AI endpoint
//!
//! Every call passes through a shared circuit breaker, a suggestion cache,
//! a per-process concurrency gate and daily/per-window rate limits before the
//! upstream is contacted. All shared state lives in a document store, so
//! several processes pointed at the same store enforce one set of limits.
//!
//! # Architecture
//!
//! - **Domain Layer** (`domain`): Models, errors and the ports the services depend on
//! - **Service Layer** (`services`): Breaker, limiter, cache and their composition
//! - **Adapters** (`adapters`): SQLite and in-memory stores, clocks, upstream clients
//! - **Infrastructure Layer** (`infrastructure`): Configuration and logging
//! - **CLI Layer** (`cli`): Command-line interface
//!
//! # Example
//!
//! ```ignore
//! use ai_governor::adapters::{InMemoryDocumentStore, SystemClock};
//! use ai_governor::domain::models::{CacheKey, CallSource, Config};
//! use ai_governor::services::Governor;
//! use std::sync::Arc;
//!
//! let governor = Governor::new(
//!     Arc::new(InMemoryDocumentStore::new()),
//!     Arc::new(SystemClock),
//!     &Config::default(),
//! );
//! let key = CacheKey::new().with("age", 7).with("goal", "focus");
//! let outcome = governor.suggest(&client, &key, &CallSource::Daily, prompt).await?;
//! ```

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;
