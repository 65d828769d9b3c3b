use anyhow::{Context, Result};
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Yaml};
use thiserror::Error;

use crate::domain::models::config::Config;

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid daily_limit: {0}. Must be at least 1")]
    InvalidDailyLimit(u32),

    #[error("Invalid window_limit: {0}. Must be at least 1")]
    InvalidWindowLimit(u32),

    #[error("Invalid window_secs: {0}. Must be at least 1")]
    InvalidWindow(u64),

    #[error("Invalid failure_threshold: {0}. Must be at least 1")]
    InvalidFailureThreshold(u32),

    #[error("Invalid cooldown_secs: {0}. Must be at least 1")]
    InvalidCooldown(u64),

    #[error("Invalid max_concurrent_requests: {0}. Must be at least 1")]
    InvalidMaxConcurrent(usize),

    #[error("Invalid cache ttl_secs: {0}. Must be at least 1")]
    InvalidCacheTtl(u64),

    #[error("Invalid upstream timeout_secs: {0}. Must be at least 1")]
    InvalidTimeout(u64),

    #[error("Upstream model cannot be empty")]
    EmptyModel,

    #[error("Invalid max_attempts: {0}. Cannot be 0")]
    InvalidMaxAttempts(u32),

    #[error("Database path cannot be empty")]
    EmptyDatabasePath,

    #[error("Invalid max_connections: {0}. Must be at least 1")]
    InvalidMaxConnections(u32),

    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    #[error("Invalid log rotation: {0}. Must be one of: daily, hourly, never")]
    InvalidLogRotation(String),

    #[error("Invalid sweeper interval_secs: {0}. Must be at least 1")]
    InvalidSweepInterval(u64),
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. .governor/config.yaml (project config)
    /// 3. .governor/local.yaml (local overrides, optional)
    /// 4. Environment variables (GOVERNOR_* prefix, `__` separates sections)
    pub fn load() -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(".governor/config.yaml"))
            .merge(Yaml::file(".governor/local.yaml"))
            .merge(Env::prefixed("GOVERNOR_").split("__"))
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file, still honoring env overrides
    pub fn load_from_file(path: impl AsRef<std::path::Path>) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path.as_ref()))
            .merge(Env::prefixed("GOVERNOR_").split("__"))
            .extract()
            .context(format!(
                "Failed to load config from {}",
                path.as_ref().display()
            ))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        let rate_limit = &config.rate_limit;
        if rate_limit.daily_limit == 0 {
            return Err(ConfigError::InvalidDailyLimit(rate_limit.daily_limit));
        }
        if rate_limit.window_limit == 0 {
            return Err(ConfigError::InvalidWindowLimit(rate_limit.window_limit));
        }
        if rate_limit.window_secs == 0 {
            return Err(ConfigError::InvalidWindow(rate_limit.window_secs));
        }

        let breaker = &config.circuit_breaker;
        if breaker.failure_threshold == 0 {
            return Err(ConfigError::InvalidFailureThreshold(breaker.failure_threshold));
        }
        if breaker.cooldown_secs == 0 {
            return Err(ConfigError::InvalidCooldown(breaker.cooldown_secs));
        }

        if config.governor.max_concurrent_requests == 0 {
            return Err(ConfigError::InvalidMaxConcurrent(
                config.governor.max_concurrent_requests,
            ));
        }

        if config.cache.ttl_secs == 0 {
            return Err(ConfigError::InvalidCacheTtl(config.cache.ttl_secs));
        }

        if config.upstream.timeout_secs == 0 {
            return Err(ConfigError::InvalidTimeout(config.upstream.timeout_secs));
        }
        if config.upstream.model.trim().is_empty() {
            return Err(ConfigError::EmptyModel);
        }

        if config.retry.max_attempts == 0 {
            return Err(ConfigError::InvalidMaxAttempts(config.retry.max_attempts));
        }

        if config.database.path.is_empty() {
            return Err(ConfigError::EmptyDatabasePath);
        }
        if config.database.max_connections == 0 {
            return Err(ConfigError::InvalidMaxConnections(
                config.database.max_connections,
            ));
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        let valid_log_formats = ["json", "pretty"];
        if !valid_log_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }

        let valid_rotations = ["daily", "hourly", "never"];
        if !valid_rotations.contains(&config.logging.rotation.as_str()) {
            return Err(ConfigError::InvalidLogRotation(
                config.logging.rotation.clone(),
            ));
        }

        if config.sweeper.interval_secs == 0 {
            return Err(ConfigError::InvalidSweepInterval(config.sweeper.interval_secs));
        }

        Ok(())
    }
}
