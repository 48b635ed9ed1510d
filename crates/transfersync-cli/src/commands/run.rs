//! Run command - Execute sync items immediately
//!
//! Provides the `transfersync run` CLI command which:
//! 1. Loads configuration and opens the state database
//! 2. Wires the same orchestrators the daemon uses
//! 3. Executes the selected items in parallel for one trigger instant
//! 4. Prints one summary per execution
//!
//! Ctrl+C cancels running executions; they end as `failed` without moving
//! their watermark.

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Args;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use transfersync_audit::{ExecutionReporter, JsonReportSink, ReasonCode};
use transfersync_cache::SqliteStateRepository;
use transfersync_core::config::Config;
use transfersync_core::domain::{ExecutionRecord, ExecutionStatus};
use transfersync_core::ports::{IExecutionLease, IReportSink, IWatermarkStore};
use transfersync_sync::bootstrap::build_registry;
use transfersync_sync::registry::RegisteredItem;

use super::{parse_instant, CliContext};
use crate::output::{get_formatter, plural, OutputFormatter};

#[derive(Debug, Args)]
pub struct RunCommand {
    /// Item key, or a unique prefix of one
    #[arg(long, required_unless_present = "all")]
    pub item: Option<String>,

    /// Run every configured item
    #[arg(long, conflicts_with = "item")]
    pub all: bool,

    /// Trigger instant used for template resolution and the new watermark
    /// (defaults to now)
    #[arg(long)]
    pub at: Option<String>,
}

fn reporter(config: &Config, repo: &Arc<SqliteStateRepository>) -> ExecutionReporter {
    let reporter =
        ExecutionReporter::new().with_sink("history", Arc::clone(repo) as Arc<dyn IReportSink>);
    if config.reports.enabled {
        reporter.with_sink("json", Arc::new(JsonReportSink::new(&config.reports.directory)))
    } else {
        reporter
    }
}

/// JSON summary of one finished execution
pub fn record_json(record: &ExecutionRecord) -> serde_json::Value {
    serde_json::json!({
        "execution_id": record.id().to_string(),
        "item_key": record.item_key().to_string(),
        "trigger_instant": record.trigger_instant().to_rfc3339(),
        "remote_folder": record.resolved_path().map(|p| p.to_string()),
        "status": record.status().map(|s| s.to_string()),
        "reason": ReasonCode::for_record(record).map(|r| r.as_str()),
        "watermark_advanced": record.watermark_advanced(),
        "transferred": record.transferred_count(),
        "skipped": record.skipped_count(),
        "failed": record.failed_count(),
    })
}

impl RunCommand {
    pub async fn execute(&self, ctx: &CliContext) -> Result<()> {
        let formatter = get_formatter(ctx.format);
        let config = ctx.load_config()?;
        let errors = config.validate();
        if !errors.is_empty() {
            for e in &errors {
                formatter.error(&format!("{}: {}", e.field, e.message));
            }
            anyhow::bail!("configuration has {} error(s)", errors.len());
        }

        let trigger_instant = match &self.at {
            Some(raw) => parse_instant(raw)?,
            None => Utc::now(),
        };

        let (pool, repo) = ctx.open_state(&config).await?;
        let registry = build_registry(
            &config,
            Arc::clone(&repo) as Arc<dyn IWatermarkStore>,
            Arc::clone(&repo) as Arc<dyn IExecutionLease>,
            Arc::new(reporter(&config, &repo)),
            trigger_instant,
        )
        .await
        .context("Failed to build sync items")?;

        let selected: Vec<RegisteredItem> = match &self.item {
            Some(raw) => match registry.find(raw) {
                Some(entry) => vec![entry.clone()],
                None => {
                    pool.close().await;
                    anyhow::bail!("No unique configured item matches '{}'", raw);
                }
            },
            None => registry.items().cloned().collect(),
        };

        let cancel = CancellationToken::new();
        let ctrl_c_token = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted; cancelling running executions");
                ctrl_c_token.cancel();
            }
        });

        info!(
            items = selected.len(),
            trigger = %trigger_instant,
            "Running sync items"
        );
        formatter.info(&format!(
            "Running {} at {}",
            plural(selected.len() as u64, "item"),
            trigger_instant.to_rfc3339()
        ));

        let mut tasks = JoinSet::new();
        for entry in selected {
            let token = cancel.child_token();
            tasks.spawn(async move {
                entry
                    .orchestrator
                    .execute(&entry.item, trigger_instant, &token)
                    .await
            });
        }

        let mut records = Vec::new();
        let mut errors = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(record)) => records.push(record),
                Ok(Err(e)) => errors.push(e.to_string()),
                Err(e) => errors.push(format!("execution task failed: {}", e)),
            }
        }
        pool.close().await;
        records.sort_by(|a, b| a.item_key().cmp(b.item_key()));

        if ctx.format.is_json() {
            let executions: Vec<_> = records.iter().map(record_json).collect();
            formatter.print_json(&serde_json::json!({
                "trigger_instant": trigger_instant.to_rfc3339(),
                "executions": executions,
                "errors": errors,
            }));
        } else {
            for record in &records {
                print_summary(record, &*formatter);
            }
            for error in &errors {
                formatter.error(error);
            }
        }

        let all_succeeded = errors.is_empty()
            && records
                .iter()
                .all(|r| r.status() == Some(ExecutionStatus::Succeeded));
        if !all_succeeded {
            anyhow::bail!("one or more executions did not succeed");
        }
        Ok(())
    }
}

fn print_summary(record: &ExecutionRecord, formatter: &dyn OutputFormatter) {
    let folder = record
        .resolved_path()
        .map(|p| p.to_string())
        .unwrap_or_else(|| "-".to_string());
    let counts = format!(
        "{} transferred, {} skipped, {} failed",
        plural(record.transferred_count(), "file"),
        record.skipped_count(),
        record.failed_count()
    );
    match record.status() {
        Some(ExecutionStatus::Succeeded) => {
            formatter.success(&format!("{} {}: {}", record.item_key(), folder, counts));
            if !record.watermark_advanced() {
                formatter.info("watermark unchanged (already at or past this trigger)");
            }
        }
        Some(status) => {
            let reason = ReasonCode::for_record(record)
                .map(|r| r.to_string())
                .unwrap_or_else(|| status.to_string());
            formatter.error(&format!(
                "{} {}: {} ({})",
                record.item_key(),
                folder,
                counts,
                reason
            ));
            if let Some(message) = record.failure().and_then(|f| f.message()) {
                formatter.info(message);
            }
            for entry in record.entries() {
                if let Some(outcome) = entry.outcome.as_ref().filter(|o| o.is_failure()) {
                    formatter.info(&format!("{}: {:?}", entry.path, outcome));
                }
            }
        }
        None => formatter.warn(&format!("{} did not finish", record.item_key())),
    }
}
