//! Infrastructure adapters for external systems.

pub mod clock;
pub mod memory;
pub mod sqlite;
pub mod upstream;

pub use clock::{ManualClock, SystemClock};
pub use memory::InMemoryDocumentStore;
pub use sqlite::SqliteDocumentStore;
pub use upstream::{GeminiClient, GeminiConfig, MockUpstream};
