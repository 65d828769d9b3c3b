//! `call`: one governed upstream request.

use anyhow::{Context, Result};
use clap::Args;
use console::style;
use serde::Serialize;
use std::process::ExitCode;
use std::sync::Arc;

use crate::adapters::{GeminiClient, GeminiConfig, SystemClock};
use crate::cli::output::{output, CommandOutput};
use crate::domain::errors::DomainError;
use crate::domain::models::ai_error::ApiResponse;
use crate::domain::models::cache::CacheKey;
use crate::domain::models::config::Config;
use crate::domain::models::usage::CallSource;
use crate::services::governor::{Governor, GovernorOutcome};
use crate::services::retry::RetryPolicy;

/// Exit status of a call that was denied or failed.
pub const DENIED_EXIT_CODE: u8 = 2;

#[derive(Args, Debug)]
pub struct CallArgs {
    /// Feature the call is made for (daily, weekly, summary, manual, treehouse, growth, task)
    #[arg(short, long, default_value = "manual")]
    pub source: String,

    /// Cache key component as NAME=VALUE, repeatable. Without keys the reply is not cached
    #[arg(short, long)]
    pub key: Vec<String>,

    /// Wait and retry denials that suggest a retry delay
    #[arg(long)]
    pub retry: bool,

    /// Prompt sent to the model
    pub prompt: String,
}

/// Upstream reply: free text, or a suggestion list for keyed calls.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Reply {
    Text(String),
    Suggestions(Vec<String>),
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallOutput {
    #[serde(flatten)]
    pub response: ApiResponse<Reply>,
    pub cached: bool,
}

impl CallOutput {
    fn from_outcome<T>(outcome: GovernorOutcome<T>, wrap: impl FnOnce(T) -> Reply) -> Self {
        let cached = outcome.is_cached();
        let response = match outcome {
            GovernorOutcome::Fresh(value) | GovernorOutcome::Cached(value) => {
                ApiResponse::ok(wrap(value))
            }
            GovernorOutcome::Denied(denial) => ApiResponse::denied(&denial),
        };
        Self { response, cached }
    }

    /// A store failure, reported to the caller as an `unknown` error.
    fn from_error(err: &DomainError) -> Self {
        Self {
            response: ApiResponse::from_error(err),
            cached: false,
        }
    }

    pub fn exit_code(&self) -> u8 {
        if self.response.success {
            0
        } else {
            DENIED_EXIT_CODE
        }
    }
}

impl CommandOutput for CallOutput {
    fn to_human(&self) -> String {
        if let Some(error) = &self.response.error {
            let mut lines = vec![
                format!("{} {}", style("✗").red().bold(), error.user_message),
                format!("  {}", error.action),
            ];
            if let Some(secs) = error.retry_after_seconds {
                lines.push(format!("  Retry in {secs}s"));
            }
            return lines.join("\n");
        }

        let mut lines = Vec::new();
        if self.cached {
            lines.push(style("(cached)").dim().to_string());
        }
        match &self.response.data {
            Some(Reply::Text(text)) => lines.push(text.clone()),
            Some(Reply::Suggestions(items)) => {
                lines.extend(items.iter().map(|item| format!("• {item}")));
            }
            None => {}
        }
        lines.join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub async fn execute(args: CallArgs, config: &Config, json_mode: bool) -> Result<ExitCode> {
    let source: CallSource = args.source.parse().context("Invalid --source")?;
    let key = CacheKey::parse_pairs(&args.key).context("Invalid --key")?;

    let store = super::open_store(config).await?;
    let governor = Governor::new(store, Arc::new(SystemClock), config);
    let client = GeminiClient::new(GeminiConfig::from_upstream_config(&config.upstream))
        .context("Failed to configure upstream client")?;
    let policy = if args.retry {
        RetryPolicy::from_config(&config.retry)
    } else {
        RetryPolicy::new(1, std::time::Duration::ZERO)
    };

    let governor = &governor;
    let client = &client;
    let source = &source;
    let prompt = args.prompt.as_str();

    let result = if key.is_empty() {
        policy
            .execute(move || governor.generate(client, source, prompt))
            .await
            .map(|outcome| CallOutput::from_outcome(outcome, Reply::Text))
    } else {
        let key = &key;
        policy
            .execute(move || governor.suggest(client, key, source, prompt))
            .await
            .map(|outcome| CallOutput::from_outcome(outcome, Reply::Suggestions))
    };

    let out = result.unwrap_or_else(|err| {
        tracing::error!(source = %source, error = %err, "Governed call failed");
        CallOutput::from_error(&err)
    });

    output(&out, json_mode);
    Ok(ExitCode::from(out.exit_code()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::ai_error::Denial;

    #[test]
    fn test_cached_suggestions_output() {
        let out = CallOutput::from_outcome(
            GovernorOutcome::Cached(vec!["Walk outside".to_string()]),
            Reply::Suggestions,
        );
        let json = out.to_json();
        assert_eq!(json["success"], true);
        assert_eq!(json["cached"], true);
        assert_eq!(json["data"][0], "Walk outside");
        assert!(out.to_human().contains("• Walk outside"));
    }

    #[test]
    fn test_denied_output() {
        let out = CallOutput::from_outcome::<String>(
            GovernorOutcome::Denied(Denial::daily_limit(200)),
            Reply::Text,
        );
        let json = out.to_json();
        assert_eq!(json["success"], false);
        assert_eq!(json["error"]["kind"], "daily_limit");
        assert_eq!(json["error"]["canRetry"], false);
        assert!(json.get("data").is_none());
        assert_eq!(out.exit_code(), DENIED_EXIT_CODE);
    }

    #[test]
    fn test_store_failure_output() {
        let out = CallOutput::from_error(&DomainError::StoreUnavailable("disk I/O error".to_string()));
        let json = out.to_json();
        assert_eq!(json["success"], false);
        assert_eq!(json["cached"], false);
        assert_eq!(json["error"]["kind"], "unknown");
        assert_eq!(json["error"]["canRetry"], true);
        assert_eq!(json["error"]["retryAfterSeconds"], 30);
        assert!(json["error"]["userMessage"].is_string());
        assert_eq!(out.exit_code(), DENIED_EXIT_CODE);
        assert!(out.to_human().contains("Retry in 30s"));
    }

    #[test]
    fn test_success_exit_code() {
        let out = CallOutput::from_outcome(GovernorOutcome::Fresh("hi".to_string()), Reply::Text);
        assert_eq!(out.exit_code(), 0);
        assert_eq!(out.to_human(), "hi");
    }
}
