//! `breaker`: inspect or manually close the circuit.

use anyhow::Result;
use clap::{Args, Subcommand};
use serde::Serialize;
use std::process::ExitCode;
use std::sync::Arc;

use crate::adapters::SystemClock;
use crate::cli::output::{output, CommandOutput};
use crate::domain::models::breaker::BreakerSnapshot;
use crate::domain::models::config::Config;
use crate::services::circuit_breaker::CircuitBreakerService;

#[derive(Args, Debug)]
pub struct BreakerArgs {
    #[command(subcommand)]
    pub command: BreakerCommands,
}

#[derive(Subcommand, Debug)]
pub enum BreakerCommands {
    /// Show the shared breaker state
    Status,
    /// Close the circuit and clear the failure count
    Reset,
}

#[derive(Debug, Serialize)]
pub struct BreakerOutput {
    pub message: String,
    pub breaker: BreakerSnapshot,
}

impl CommandOutput for BreakerOutput {
    fn to_human(&self) -> String {
        let mut lines = vec![
            self.message.clone(),
            format!(
                "Consecutive failures: {}/{}",
                self.breaker.consecutive_failures, self.breaker.failure_threshold
            ),
        ];
        if let Some(open_until) = self.breaker.open_until {
            lines.push(format!("Open until: {}", open_until.to_rfc3339()));
        }
        lines.join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub async fn execute(args: BreakerArgs, config: &Config, json_mode: bool) -> Result<ExitCode> {
    let store = super::open_store(config).await?;
    let breaker =
        CircuitBreakerService::new(store, Arc::new(SystemClock), config.circuit_breaker.clone());

    let message = match args.command {
        BreakerCommands::Status => None,
        BreakerCommands::Reset => {
            breaker.reset().await?;
            Some("Circuit breaker reset".to_string())
        }
    };

    let snapshot = breaker.state().await?;
    let out = BreakerOutput {
        message: message.unwrap_or_else(|| format!("Circuit is {}", snapshot.state)),
        breaker: snapshot,
    };
    output(&out, json_mode);
    Ok(ExitCode::SUCCESS)
}
