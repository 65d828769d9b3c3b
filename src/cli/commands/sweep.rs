//! `sweep`: delete expired cache entries once, or keep sweeping.

use anyhow::Result;
use clap::Args;
use serde::Serialize;
use std::process::ExitCode;
use std::sync::Arc;

use crate::adapters::SystemClock;
use crate::cli::output::{output, CommandOutput};
use crate::domain::models::config::Config;
use crate::services::cache_sweeper::{CacheSweeper, SweeperDaemonConfig, SweeperEvent};
use crate::services::usage_cache::UsageCache;

#[derive(Args, Debug)]
pub struct SweepArgs {
    /// Keep running and sweep on the configured interval until interrupted
    #[arg(long)]
    pub watch: bool,
}

#[derive(Debug, Serialize)]
pub struct SweepOutput {
    pub deleted: usize,
}

impl CommandOutput for SweepOutput {
    fn to_human(&self) -> String {
        match self.deleted {
            0 => "No expired cache entries.".to_string(),
            1 => "Deleted 1 expired cache entry.".to_string(),
            n => format!("Deleted {n} expired cache entries."),
        }
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub async fn execute(args: SweepArgs, config: &Config, json_mode: bool) -> Result<ExitCode> {
    let store = super::open_store(config).await?;
    let cache = Arc::new(UsageCache::new(
        store,
        Arc::new(SystemClock),
        config.cache.clone(),
    ));

    if !args.watch {
        let deleted = cache.try_sweep_expired().await?;
        output(&SweepOutput { deleted }, json_mode);
        return Ok(ExitCode::SUCCESS);
    }

    let sweeper = CacheSweeper::new(cache, SweeperDaemonConfig::from_config(&config.sweeper));
    let handle = sweeper.handle();
    let mut events = sweeper.run();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted, stopping sweeper");
                handle.stop();
            }
            event = events.recv() => match event {
                Some(SweeperEvent::SweepCompleted { deleted, .. }) => {
                    output(&SweepOutput { deleted }, json_mode);
                }
                Some(SweeperEvent::Stopped { reason }) => {
                    tracing::info!(?reason, "Sweeper stopped");
                    break;
                }
                Some(_) => {}
                None => break,
            },
        }
    }

    let status = handle.status().await;
    tracing::info!(
        total_runs = status.total_runs,
        total_deleted = status.total_deleted,
        "Sweeper finished"
    );
    Ok(ExitCode::SUCCESS)
}
