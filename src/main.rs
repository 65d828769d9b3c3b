//! AI Governor CLI entry point.

use clap::Parser;
use std::process::ExitCode;

use ai_governor::cli::commands::{self, load_config};
use ai_governor::cli::{report_error, Cli, Commands};
use ai_governor::infrastructure::logging::{LogConfig, LoggerImpl};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(err) => return report_error(&err, cli.json),
    };

    // Held until main returns so buffered file logs are flushed.
    let _logger = match LoggerImpl::init(&LogConfig::from_logging_config(&config.logging)) {
        Ok(logger) => logger,
        Err(err) => return report_error(&err, cli.json),
    };

    let result = match cli.command {
        Commands::Call(args) => commands::call::execute(args, &config, cli.json).await,
        Commands::Status(args) => commands::status::execute(args, &config, cli.json).await,
        Commands::Sweep(args) => commands::sweep::execute(args, &config, cli.json).await,
        Commands::Breaker(args) => commands::breaker::execute(args, &config, cli.json).await,
    };

    result.unwrap_or_else(|err| report_error(&err, cli.json))
}
