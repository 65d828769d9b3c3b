//! `status`: quota usage, breaker state and the last quota-exhausted event.

use anyhow::Result;
use chrono::NaiveDate;
use clap::Args;
use console::style;
use serde::Serialize;
use std::process::ExitCode;
use std::sync::Arc;

use crate::adapters::SystemClock;
use crate::cli::output::{detail_table, output, truncate, CommandOutput};
use crate::domain::models::breaker::{quota_marker_path, BreakerSnapshot, CircuitState};
use crate::domain::models::config::Config;
use crate::domain::models::usage::UsageSnapshot;
use crate::domain::ports::DocumentStore;
use crate::services::circuit_breaker::CircuitBreakerService;
use crate::services::rate_limiter::RateLimiter;

#[derive(Args, Debug)]
pub struct StatusArgs {
    /// UTC day to report (YYYY-MM-DD), defaults to today
    #[arg(long)]
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusOutput {
    pub usage: UsageSnapshot,
    pub circuit_breaker: BreakerSnapshot,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quota_exhausted: Option<serde_json::Value>,
}

fn colorize_state(state: CircuitState) -> String {
    match state {
        CircuitState::Closed => style(state.as_str()).green().to_string(),
        CircuitState::HalfOpen => style(state.as_str()).yellow().to_string(),
        CircuitState::Open => style(state.as_str()).red().bold().to_string(),
    }
}

impl CommandOutput for StatusOutput {
    fn to_human(&self) -> String {
        let usage = &self.usage;
        let breaker = &self.circuit_breaker;

        let mut table = detail_table(&["metric", "value"]);
        table.add_row(vec!["Date".to_string(), usage.date.clone()]);
        table.add_row(vec![
            "Daily calls".to_string(),
            format!(
                "{}/{} ({} remaining)",
                usage.total_calls,
                usage.daily_limit,
                usage.daily_remaining()
            ),
        ]);
        table.add_row(vec![
            "Current window".to_string(),
            format!("{}/{}", usage.window_calls, usage.window_limit),
        ]);
        table.add_row(vec!["Circuit".to_string(), colorize_state(breaker.state)]);
        table.add_row(vec![
            "Consecutive failures".to_string(),
            format!("{}/{}", breaker.consecutive_failures, breaker.failure_threshold),
        ]);
        if let Some(open_until) = breaker.open_until {
            table.add_row(vec![
                "Open until".to_string(),
                open_until.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
            ]);
        }
        if let Some(marker) = &self.quota_exhausted {
            let occurred = marker["lastOccurred"].as_str().unwrap_or("unknown");
            let message = marker["errorMessage"].as_str().unwrap_or_default();
            table.add_row(vec![
                "Quota exhausted".to_string(),
                format!("{occurred} ({})", truncate(message, 48)),
            ]);
        }

        let mut lines = vec![table.to_string()];
        if !usage.calls_per_source.is_empty() {
            let mut sources = detail_table(&["source", "calls"]);
            for (source, count) in &usage.calls_per_source {
                sources.add_row(vec![source.clone(), count.to_string()]);
            }
            lines.push(String::new());
            lines.push(sources.to_string());
        }
        lines.join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub async fn execute(args: StatusArgs, config: &Config, json_mode: bool) -> Result<ExitCode> {
    let store = super::open_store(config).await?;
    let clock = Arc::new(SystemClock);

    let limiter = RateLimiter::new(store.clone(), clock.clone(), config.rate_limit.clone());
    let breaker = CircuitBreakerService::new(store.clone(), clock, config.circuit_breaker.clone());

    let usage = match args.date {
        Some(day) => limiter.usage(day).await?,
        None => limiter.usage_today().await?,
    };
    let quota_exhausted = store
        .get(&quota_marker_path()?)
        .await?
        .map(serde_json::Value::Object);

    let out = StatusOutput {
        usage,
        circuit_breaker: breaker.state().await?,
        quota_exhausted,
    };
    output(&out, json_mode);
    Ok(ExitCode::SUCCESS)
}
