use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::cli::commands::breaker::BreakerArgs;
use crate::cli::commands::call::CallArgs;
use crate::cli::commands::status::StatusArgs;
use crate::cli::commands::sweep::SweepArgs;

#[derive(Parser, Debug)]
#[command(name = "ai-governor")]
#[command(about = "Cache, rate-limit and circuit-break generative-AI calls", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,

    /// Configuration file (defaults to .governor/config.yaml)
    #[arg(short, long, global = true, env = "GOVERNOR_CONFIG")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Make a governed upstream call
    Call(CallArgs),

    /// Show today's quota usage and breaker state
    Status(StatusArgs),

    /// Delete expired cache entries
    Sweep(SweepArgs),

    /// Inspect or reset the circuit breaker
    Breaker(BreakerArgs),
}
