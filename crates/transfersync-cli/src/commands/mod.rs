//! CLI subcommands and the state they share

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use transfersync_cache::{DatabasePool, SqliteStateRepository};
use transfersync_core::config::Config;

use crate::output::OutputFormat;

pub mod completions;
pub mod config;
pub mod history;
pub mod items;
pub mod resolve;
pub mod run;
pub mod status;

/// Global options every subcommand receives
#[derive(Debug, Clone)]
pub struct CliContext {
    pub format: OutputFormat,
    pub config_path: Option<PathBuf>,
}

impl CliContext {
    pub fn new(format: OutputFormat, config_path: Option<PathBuf>) -> Self {
        Self {
            format,
            config_path,
        }
    }

    /// `--config`, or the default location
    pub fn config_path(&self) -> PathBuf {
        self.config_path
            .clone()
            .unwrap_or_else(Config::default_path)
    }

    /// An explicit `--config` must exist; the default path falls back to defaults
    pub fn load_config(&self) -> Result<Config> {
        let path = self.config_path();
        if self.config_path.is_some() || path.exists() {
            Config::load(&path)
                .with_context(|| format!("Failed to load configuration from {}", path.display()))
        } else {
            Ok(Config::default())
        }
    }

    /// Opens the state database named in `config`
    pub async fn open_state(
        &self,
        config: &Config,
    ) -> Result<(DatabasePool, Arc<SqliteStateRepository>)> {
        let pool = DatabasePool::new(&config.state.database)
            .await
            .context("Failed to open state database")?;
        let repo = Arc::new(SqliteStateRepository::new(pool.pool().clone()));
        Ok((pool, repo))
    }
}

/// Parses an instant given on the command line
///
/// Accepts RFC 3339 (`2024-03-01T06:00:00Z`), `2024-03-01T06:00:00` and
/// `2024-03-01`, all taken as UTC.
pub fn parse_instant(input: &str) -> Result<DateTime<Utc>> {
    let input = input.trim();

    if let Ok(instant) = DateTime::parse_from_rfc3339(input) {
        return Ok(instant.with_timezone(&Utc));
    }
    if let Ok(datetime) = NaiveDateTime::parse_from_str(input, "%Y-%m-%dT%H:%M:%S") {
        return Ok(DateTime::<Utc>::from_naive_utc_and_offset(datetime, Utc));
    }
    if let Ok(date) = NaiveDate::parse_from_str(input, "%Y-%m-%d") {
        let datetime = date
            .and_hms_opt(0, 0, 0)
            .context("Failed to create datetime from date")?;
        return Ok(DateTime::<Utc>::from_naive_utc_and_offset(datetime, Utc));
    }

    anyhow::bail!(
        "Could not parse '{}' as an instant. Use 2024-03-01, 2024-03-01T06:00:00 or RFC 3339.",
        input
    )
}

/// Parses `--since`: a relative age (`30m`, `12h`, `2d`, `1w`) or an absolute instant
pub fn parse_since(input: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
    let trimmed = input.trim();
    match parse_relative_duration(trimmed)? {
        Some(duration) => now
            .checked_sub_signed(duration)
            .with_context(|| format!("'{}' reaches before the earliest supported instant", trimmed)),
        None => parse_instant(input),
    }
}

/// `Ok(None)` when `input` is not shaped like a relative age
fn parse_relative_duration(input: &str) -> Result<Option<chrono::Duration>> {
    if input.len() < 2 || !input.is_char_boundary(input.len() - 1) {
        return Ok(None);
    }

    let (num_str, unit) = input.split_at(input.len() - 1);
    let Ok(num) = num_str.parse::<u64>() else {
        return Ok(None);
    };
    let num = i64::try_from(num).with_context(|| format!("'{}' is out of range", input))?;

    let duration = match unit {
        "m" => chrono::Duration::try_minutes(num),
        "h" => chrono::Duration::try_hours(num),
        "d" => chrono::Duration::try_days(num),
        "w" => chrono::Duration::try_weeks(num),
        _ => return Ok(None),
    };
    duration
        .map(Some)
        .with_context(|| format!("'{}' is out of range", input))
}
