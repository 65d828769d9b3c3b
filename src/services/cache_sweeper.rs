//! Cache sweeper background daemon.
//!
//! Periodically deletes expired suggestion cache entries so that keys which
//! are never read again do not accumulate in the store.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Notify, RwLock};
use tokio::time::{interval, Instant, MissedTickBehavior};

use crate::domain::errors::DomainResult;
use crate::domain::models::config::SweeperConfig;
use crate::services::usage_cache::UsageCache;

/// Configuration for the cache sweeper.
#[derive(Debug, Clone)]
pub struct SweeperDaemonConfig {
    /// Interval between sweeps.
    pub sweep_interval: Duration,
    /// Sweep immediately on start.
    pub run_on_startup: bool,
    /// Maximum consecutive failures before stopping.
    pub max_consecutive_failures: u32,
}

impl Default for SweeperDaemonConfig {
    fn default() -> Self {
        Self {
            sweep_interval: Duration::from_secs(3600),
            run_on_startup: true,
            max_consecutive_failures: 5,
        }
    }
}

impl SweeperDaemonConfig {
    pub fn with_interval(interval: Duration) -> Self {
        Self {
            sweep_interval: interval,
            ..Default::default()
        }
    }

    pub fn from_config(config: &SweeperConfig) -> Self {
        Self::with_interval(Duration::from_secs(config.interval_secs.max(1)))
    }
}

/// Event emitted by the sweeper.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SweeperEvent {
    Started,
    SweepCompleted { run_number: u64, deleted: usize, duration_ms: u64 },
    SweepFailed { run_number: u64, error: String },
    Stopped { reason: StopReason },
}

/// Reason the sweeper stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// Requested to stop.
    Requested,
    /// Too many consecutive failures.
    TooManyFailures,
}

/// Run statistics.
#[derive(Debug, Clone, Default)]
pub struct SweeperStatus {
    pub running: bool,
    pub total_runs: u64,
    pub successful_runs: u64,
    pub failed_runs: u64,
    pub last_run: Option<Instant>,
    pub total_deleted: u64,
}

/// Handle to control a running sweeper.
pub struct SweeperHandle {
    stop_flag: Arc<AtomicBool>,
    wake: Arc<Notify>,
    status: Arc<RwLock<SweeperStatus>>,
}

impl SweeperHandle {
    /// Request the sweeper to stop; it exits without waiting for the next tick.
    pub fn stop(&self) {
        self.stop_flag.store(true, Ordering::Release);
        self.wake.notify_one();
    }

    pub fn is_stop_requested(&self) -> bool {
        self.stop_flag.load(Ordering::Acquire)
    }

    pub async fn status(&self) -> SweeperStatus {
        self.status.read().await.clone()
    }
}

pub struct CacheSweeper {
    cache: Arc<UsageCache>,
    config: SweeperDaemonConfig,
    status: Arc<RwLock<SweeperStatus>>,
    stop_flag: Arc<AtomicBool>,
    wake: Arc<Notify>,
}

impl CacheSweeper {
    pub fn new(cache: Arc<UsageCache>, config: SweeperDaemonConfig) -> Self {
        Self {
            cache,
            config,
            status: Arc::new(RwLock::new(SweeperStatus::default())),
            stop_flag: Arc::new(AtomicBool::new(false)),
            wake: Arc::new(Notify::new()),
        }
    }

    pub fn handle(&self) -> SweeperHandle {
        SweeperHandle {
            stop_flag: self.stop_flag.clone(),
            wake: self.wake.clone(),
            status: self.status.clone(),
        }
    }

    /// Spawn the sweep loop, returning a channel for events.
    pub fn run(self) -> mpsc::Receiver<SweeperEvent> {
        let (tx, rx) = mpsc::channel(100);
        tokio::spawn(async move {
            self.run_loop(tx).await;
        });
        rx
    }

    async fn run_loop(self, tx: mpsc::Sender<SweeperEvent>) {
        self.status.write().await.running = true;
        let _ = tx.send(SweeperEvent::Started).await;
        tracing::info!(interval_secs = self.config.sweep_interval.as_secs(), "Cache sweeper started");

        let mut consecutive_failures = 0u32;
        let mut timer = interval(self.config.sweep_interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        if !self.config.run_on_startup {
            // The first tick of an interval completes immediately.
            timer.tick().await;
        }

        let reason = loop {
            tokio::select! {
                _ = timer.tick() => {}
                () = self.wake.notified() => {}
            }

            if self.stop_flag.load(Ordering::Acquire) {
                break StopReason::Requested;
            }

            self.sweep_cycle(&tx, &mut consecutive_failures).await;
            if consecutive_failures >= self.config.max_consecutive_failures {
                tracing::error!(consecutive_failures, "Cache sweeper stopping after repeated failures");
                break StopReason::TooManyFailures;
            }
        };

        self.status.write().await.running = false;
        tracing::info!(?reason, "Cache sweeper stopped");
        let _ = tx.send(SweeperEvent::Stopped { reason }).await;
    }

    async fn sweep_cycle(&self, tx: &mpsc::Sender<SweeperEvent>, consecutive_failures: &mut u32) {
        let run_number = {
            let mut status = self.status.write().await;
            status.total_runs += 1;
            status.total_runs
        };

        let start = Instant::now();
        let result = self.cache.try_sweep_expired().await;
        let duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);

        match result {
            Ok(deleted) => {
                *consecutive_failures = 0;
                {
                    let mut status = self.status.write().await;
                    status.successful_runs += 1;
                    status.last_run = Some(Instant::now());
                    status.total_deleted += deleted as u64;
                }
                let _ = tx
                    .send(SweeperEvent::SweepCompleted { run_number, deleted, duration_ms })
                    .await;
            }
            Err(e) => {
                *consecutive_failures += 1;
                self.status.write().await.failed_runs += 1;
                tracing::warn!(run_number, error = %e, "Cache sweep failed");
                let _ = tx
                    .send(SweeperEvent::SweepFailed { run_number, error: e.to_string() })
                    .await;
            }
        }
    }

    /// Sweep once (for manual invocation).
    pub async fn run_once(&self) -> DomainResult<usize> {
        self.cache.try_sweep_expired().await
    }

    pub fn config(&self) -> &SweeperDaemonConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{InMemoryDocumentStore, ManualClock};
    use crate::domain::models::cache::CacheKey;
    use crate::domain::models::config::CacheConfig;
    use chrono::{TimeZone, Utc};

    fn setup() -> (Arc<InMemoryDocumentStore>, Arc<ManualClock>, Arc<UsageCache>) {
        let store = Arc::new(InMemoryDocumentStore::new());
        let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2026, 10, 16, 8, 0, 0).unwrap()));
        let cache = Arc::new(UsageCache::new(store.clone(), clock.clone(), CacheConfig::default()));
        (store, clock, cache)
    }

    #[test]
    fn test_config_from_settings() {
        let config = SweeperDaemonConfig::from_config(&SweeperConfig { interval_secs: 120 });
        assert_eq!(config.sweep_interval, Duration::from_secs(120));
        assert!(config.run_on_startup);
    }

    #[tokio::test]
    async fn test_run_once() {
        let (_, clock, cache) = setup();
        cache.put(&CacheKey::new().with("age", 7), vec!["a".into()]).await;
        clock.advance(Duration::from_secs(8 * 24 * 3600));

        let sweeper = CacheSweeper::new(cache, SweeperDaemonConfig::default());
        assert_eq!(sweeper.run_once().await.unwrap(), 1);
        assert_eq!(sweeper.run_once().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_run_and_stop() {
        let (_, clock, cache) = setup();
        cache.put(&CacheKey::new().with("age", 7), vec!["a".into()]).await;
        clock.advance(Duration::from_secs(8 * 24 * 3600));

        let sweeper = CacheSweeper::new(cache, SweeperDaemonConfig::with_interval(Duration::from_secs(3600)));
        let handle = sweeper.handle();
        let mut events = sweeper.run();

        assert_eq!(events.recv().await, Some(SweeperEvent::Started));
        match events.recv().await {
            Some(SweeperEvent::SweepCompleted { run_number, deleted, .. }) => {
                assert_eq!(run_number, 1);
                assert_eq!(deleted, 1);
            }
            other => panic!("unexpected event {other:?}"),
        }

        assert!(!handle.is_stop_requested());
        handle.stop();
        assert!(handle.is_stop_requested());
        assert_eq!(
            events.recv().await,
            Some(SweeperEvent::Stopped { reason: StopReason::Requested })
        );
        let status = handle.status().await;
        assert!(!status.running);
        assert_eq!(status.total_deleted, 1);
    }

    #[tokio::test]
    async fn test_stops_after_repeated_failures() {
        let (store, _, cache) = setup();
        store.set_unavailable(true);

        let sweeper = CacheSweeper::new(
            cache,
            SweeperDaemonConfig {
                sweep_interval: Duration::from_millis(5),
                run_on_startup: true,
                max_consecutive_failures: 2,
            },
        );
        let mut events = sweeper.run();

        let mut failures = 0;
        while let Some(event) = events.recv().await {
            match event {
                SweeperEvent::SweepFailed { .. } => failures += 1,
                SweeperEvent::Stopped { reason } => {
                    assert_eq!(reason, StopReason::TooManyFailures);
                    break;
                }
                _ => {}
            }
        }
        assert_eq!(failures, 2);
    }
}
