//! History command - Past executions from the state database
//!
//! Lists finished executions newest first, filtered by item, status and age.
//! `--id` prints one execution with every file decision and outcome.

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Args;
use transfersync_audit::ExecutionReport;
use transfersync_core::domain::{ExecutionId, ExecutionRecord, ExecutionStatus, ItemKey, SyncItem};
use transfersync_core::ports::{ExecutionFilter, IExecutionHistory};

use super::{parse_since, CliContext};
use crate::output::{get_formatter, plural, truncate, OutputFormatter};

#[derive(Debug, Args)]
pub struct HistoryCommand {
    /// Item key, or a unique prefix of one
    #[arg(long)]
    pub item: Option<String>,

    /// Only executions with this status (succeeded, partial_failure, failed)
    #[arg(long)]
    pub status: Option<String>,

    /// Only executions triggered since (e.g. "12h", "2d", "2024-03-01")
    #[arg(long)]
    pub since: Option<String>,

    /// Maximum number of executions to show
    #[arg(long, default_value = "20")]
    pub limit: u32,

    /// Show a single execution in detail
    #[arg(long, conflicts_with_all = ["item", "status", "since"])]
    pub id: Option<String>,
}

/// Matches `raw` against configured item keys by unique prefix
///
/// Falls back to parsing `raw` as a full key, so history of items removed
/// from the configuration stays reachable.
pub fn lookup_item_key(items: &[SyncItem], raw: &str) -> Result<ItemKey> {
    let matches: Vec<&SyncItem> = items
        .iter()
        .filter(|item| item.key().as_str().starts_with(raw))
        .collect();
    match matches.as_slice() {
        [item] => Ok(item.key().clone()),
        [] => ItemKey::new(raw).with_context(|| format!("No configured item matches '{}'", raw)),
        _ => anyhow::bail!(
            "'{}' matches {} items; use a longer prefix",
            raw,
            matches.len()
        ),
    }
}

impl HistoryCommand {
    pub async fn execute(&self, ctx: &CliContext) -> Result<()> {
        let formatter = get_formatter(ctx.format);
        let config = ctx.load_config()?;

        if !config.state.database.exists() {
            formatter.error(&format!(
                "No state database at {}",
                config.state.database.display()
            ));
            return Ok(());
        }

        let (pool, repo) = ctx.open_state(&config).await?;

        if let Some(raw_id) = &self.id {
            let id: ExecutionId = raw_id.parse()?;
            let record = repo
                .get_execution(&id)
                .await
                .context("Failed to read execution")?;
            pool.close().await;
            return match record {
                Some(record) => show_detail(&record, ctx, &*formatter),
                None => {
                    formatter.error(&format!("No execution with id {}", id));
                    Ok(())
                }
            };
        }

        let mut filter = ExecutionFilter::new().with_limit(self.limit);
        if let Some(raw) = &self.item {
            let items = config
                .sync_items()
                .context("Configuration contains invalid sync settings")?;
            filter = filter.with_item_key(lookup_item_key(&items, raw)?);
        }
        if let Some(raw) = &self.status {
            filter = filter.with_status(raw.parse::<ExecutionStatus>()?);
        }
        if let Some(raw) = &self.since {
            let since = parse_since(raw, Utc::now())
                .with_context(|| format!("Invalid --since value: '{}'", raw))?;
            filter = filter.with_since(since);
        }

        let records = repo
            .query_executions(&filter)
            .await
            .context("Failed to query execution history")?;
        pool.close().await;

        if ctx.format.is_json() {
            let reports = records
                .iter()
                .map(ExecutionReport::from_record)
                .collect::<Result<Vec<_>, _>>()?;
            formatter.print_json(&serde_json::json!({
                "count": reports.len(),
                "executions": reports,
            }));
            return Ok(());
        }

        if records.is_empty() {
            formatter.info("No executions found for the specified criteria.");
            return Ok(());
        }

        formatter.success(&format!("Execution history ({})", records.len()));
        formatter.info("");
        formatter.info("  Triggered            Item             Status          Xfer  Skip  Fail  Folder");
        formatter.info("  -------------------- ---------------- --------------- ----- ----- ----- ------");
        for record in &records {
            let status = record
                .status()
                .map(|s| s.to_string())
                .unwrap_or_else(|| record.state().to_string());
            let folder = record
                .resolved_path()
                .map(|p| p.to_string())
                .unwrap_or_else(|| "-".to_string());
            formatter.info(&format!(
                "  {:<20} {:<16} {:<15} {:>5} {:>5} {:>5}  {}",
                record.trigger_instant().format("%Y-%m-%d %H:%M:%S"),
                record.item_key(),
                status,
                record.transferred_count(),
                record.skipped_count(),
                record.failed_count(),
                truncate(&folder, 40)
            ));
        }
        if records.len() as u32 >= self.limit {
            formatter.info("");
            formatter.info(&format!(
                "Showing {} executions (limit). Use --limit to show more.",
                self.limit
            ));
        }
        Ok(())
    }
}

fn show_detail(
    record: &ExecutionRecord,
    ctx: &CliContext,
    formatter: &dyn OutputFormatter,
) -> Result<()> {
    let report = ExecutionReport::from_record(record)?;
    if ctx.format.is_json() {
        formatter.print_json(&serde_json::to_value(&report)?);
        return Ok(());
    }

    formatter.success(&format!("Execution {} ({})", report.execution_id, report.status));
    formatter.info(&format!("item:      {} ({})", report.item_key, report.connector));
    formatter.info(&format!("triggered: {}", report.trigger_instant.to_rfc3339()));
    if let Some(folder) = &report.remote_folder {
        formatter.info(&format!("folder:    {}", folder));
    }
    if let Some(reason) = report.reason {
        formatter.info(&format!("reason:    {}", reason));
    }
    if let Some(error) = &report.error {
        formatter.info(&format!("error:     {}", error));
    }
    formatter.info(&format!(
        "watermark: {}",
        if report.watermark_advanced {
            "advanced"
        } else {
            "unchanged"
        }
    ));
    formatter.info(&format!(
        "{} transferred, {} skipped, {} failed",
        plural(report.transferred, "file"),
        report.skipped,
        report.failed
    ));

    if !report.files.is_empty() {
        formatter.info("");
        for file in &report.files {
            let outcome = match (&file.reason, &file.message) {
                (Some(_), Some(message)) => format!("FAILED {}", message),
                _ => file.decision.to_string(),
            };
            formatter.info(&format!(
                "  {:<50} {}",
                truncate(&file.path, 50),
                outcome
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use transfersync_core::domain::{
        BucketName, ConnectorName, KeyPrefix, Schedule, TargetSpec,
    };

    use super::*;

    fn item(folder: &str) -> SyncItem {
        SyncItem::new(
            ConnectorName::new("partner-a").unwrap(),
            folder,
            false,
            TargetSpec {
                bucket: BucketName::new("landing").unwrap(),
                prefix: KeyPrefix::new(""),
                kms_key_id: None,
            },
            Schedule::parse("@hourly").unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn test_lookup_by_unique_prefix() {
        let items = vec![item("/a"), item("/b")];
        let key = items[0].key().as_str();

        // The full key always resolves, even if a shorter prefix is shared
        assert_eq!(lookup_item_key(&items, key).unwrap(), *items[0].key());
    }

    #[test]
    fn test_lookup_ambiguous_prefix() {
        let items = vec![item("/a"), item("/b")];
        assert!(lookup_item_key(&items, "").is_err());
    }

    #[test]
    fn test_lookup_unconfigured_full_key() {
        let gone = ItemKey::derive("old", "/legacy", "landing", "");
        assert_eq!(lookup_item_key(&[], gone.as_str()).unwrap(), gone);
        assert!(lookup_item_key(&[], "zz").is_err());
    }
}
