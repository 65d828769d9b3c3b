pub mod ai_error;
pub mod breaker;
pub mod cache;
pub mod config;
pub mod document;
pub mod usage;

pub use ai_error::{AiErrorKind, ApiErrorBody, ApiResponse, Denial};
pub use breaker::{BreakerCheck, BreakerSnapshot, BreakerState, CircuitState};
pub use cache::{CacheEntry, CacheKey};
pub use config::{
    CacheConfig, CircuitBreakerConfig, Config, DatabaseConfig, GovernorConfig, LoggingConfig,
    RateLimitConfig, RetryConfig, SweeperConfig, UpstreamConfig,
};
pub use document::{Document, DocumentPath};
pub use usage::{CallSource, UsageRecord, UsageSnapshot};
