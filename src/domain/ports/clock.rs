use chrono::{DateTime, Utc};

/// Source of the current time for every policy decision.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}
