pub mod analyze;
pub mod config;
pub mod kits;

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::{Local, NaiveDate};
use serde::Serialize;
use stockpilot_core::config::{AnalyticsConfig, ConfigOverrides, LoadOptions};
use stockpilot_core::domain::{parse_raw_transactions, RawTransaction};
use stockpilot_core::errors::ApplicationError;

#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

#[derive(Debug, Serialize)]
struct CommandOutcome {
    command: String,
    status: String,
    error_class: String,
    message: String,
}

impl CommandResult {
    pub fn failure(
        command: &str,
        error_class: &str,
        message: impl Into<String>,
        exit_code: u8,
    ) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "error".to_string(),
            error_class: error_class.to_string(),
            message: message.into(),
        };
        Self { exit_code, output: serialize_payload(payload) }
    }

    pub fn from_error(command: &str, error: &ApplicationError) -> Self {
        Self::failure(
            command,
            error.error_class(),
            format!("{} ({error})", error.user_message()),
            error.exit_code(),
        )
    }

    /// Successful command whose output is the pretty-printed `value`.
    pub fn report<T: Serialize>(command: &str, value: &T) -> Self {
        match serde_json::to_string_pretty(value) {
            Ok(output) => Self { exit_code: 0, output },
            Err(error) => Self::failure(command, "serialization", error.to_string(), 1),
        }
    }
}

fn serialize_payload(payload: CommandOutcome) -> String {
    serde_json::to_string(&payload).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"unknown\",\"status\":\"error\",\"error_class\":\"serialization\",\"message\":\"{}\"}}",
            error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
        )
    })
}

pub(crate) fn load_config(
    config_path: Option<PathBuf>,
    overrides: ConfigOverrides,
) -> Result<AnalyticsConfig, ApplicationError> {
    let require_file = config_path.is_some();
    let config = AnalyticsConfig::load(LoadOptions { config_path, require_file, overrides })?;
    Ok(config)
}

pub(crate) fn load_transactions(path: &Path) -> Result<Vec<RawTransaction>, ApplicationError> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read sales input `{}`", path.display()))
        .map_err(|error| ApplicationError::InputLoad(format!("{error:#}")))?;
    let transactions = parse_raw_transactions(&raw)?;
    tracing::debug!(
        event_name = "cli.input.loaded",
        path = %path.display(),
        record_count = transactions.len(),
        "sales input loaded"
    );
    Ok(transactions)
}

pub(crate) fn resolve_as_of(as_of: Option<NaiveDate>) -> NaiveDate {
    as_of.unwrap_or_else(|| Local::now().date_naive())
}
