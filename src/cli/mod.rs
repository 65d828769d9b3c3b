//! Command-line interface for operating the governor.

pub mod commands;
pub mod output;
pub mod types;

pub use types::{Cli, Commands};

use console::style;
use std::process::ExitCode;

/// Report a failed command on stdout (JSON mode) or stderr.
pub fn report_error(err: &anyhow::Error, json_mode: bool) -> ExitCode {
    if json_mode {
        let body = serde_json::json!({
            "success": false,
            "error": format!("{err:#}"),
        });
        println!("{}", serde_json::to_string_pretty(&body).unwrap_or_default());
    } else {
        eprintln!("{} {err:#}", style("error:").red().bold());
    }
    ExitCode::FAILURE
}
