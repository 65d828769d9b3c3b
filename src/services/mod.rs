pub mod cache_sweeper;
pub mod circuit_breaker;
pub mod governor;
pub mod rate_limiter;
pub mod retry;
pub mod usage_cache;
pub mod usage_log;

pub use cache_sweeper::{CacheSweeper, SweeperDaemonConfig, SweeperEvent, SweeperHandle};
pub use circuit_breaker::CircuitBreakerService;
pub use governor::{parse_suggestions, Governor, GovernorOutcome};
pub use rate_limiter::{RateDecision, RateLimiter};
pub use retry::RetryPolicy;
pub use usage_cache::UsageCache;
pub use usage_log::UsageLog;
