//! Status command - Watermarks and execution totals
//!
//! For every configured item shows the last committed watermark (or that it
//! has never synced) and whether an execution currently holds its lease,
//! followed by execution counts per final status.
//! Watermarks whose item is no longer configured are listed separately.

use std::collections::HashMap;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Args;
use transfersync_cache::ActiveLease;
use transfersync_core::domain::{ItemKey, SyncItem, Watermark};
use transfersync_core::ports::IWatermarkStore;

use super::CliContext;
use crate::output::{get_formatter, truncate};

#[derive(Debug, Args)]
pub struct StatusCommand {}

/// One configured item joined with its stored watermark
#[derive(Debug, PartialEq)]
pub struct ItemStatus {
    pub item_key: ItemKey,
    pub connector: String,
    pub source: String,
    pub watermark: Option<DateTime<Utc>>,
    /// When the running execution claimed the item, if one is running
    pub running_since: Option<DateTime<Utc>>,
}

/// Joins configured items with stored watermarks and active leases
///
/// Returns the per-item rows in configuration order and the keys of stored
/// watermarks that match no configured item.
pub fn join_watermarks(
    items: &[SyncItem],
    watermarks: Vec<(ItemKey, Watermark)>,
    leases: &[ActiveLease],
) -> (Vec<ItemStatus>, Vec<(ItemKey, DateTime<Utc>)>) {
    let mut stored: HashMap<ItemKey, Watermark> = watermarks.into_iter().collect();
    let rows = items
        .iter()
        .map(|item| ItemStatus {
            item_key: item.key().clone(),
            connector: item.connector().to_string(),
            source: item.source_template().to_string(),
            watermark: stored
                .remove(item.key())
                .map(|w| w.last_success_instant()),
            running_since: leases
                .iter()
                .find(|lease| lease.item_key == *item.key())
                .map(|lease| lease.acquired_at),
        })
        .collect();
    let mut orphans: Vec<_> = stored
        .into_iter()
        .map(|(key, w)| (key, w.last_success_instant()))
        .collect();
    orphans.sort_by(|a, b| a.0.as_str().cmp(b.0.as_str()));
    (rows, orphans)
}

impl StatusCommand {
    pub async fn execute(&self, ctx: &CliContext) -> Result<()> {
        let formatter = get_formatter(ctx.format);
        let config = ctx.load_config()?;
        let items = config
            .sync_items()
            .context("Configuration contains invalid sync settings")?;

        if !config.state.database.exists() {
            formatter.error(&format!(
                "No state database at {}. Start transfersyncd or run 'transfersync run' first.",
                config.state.database.display()
            ));
            return Ok(());
        }

        let (pool, repo) = ctx.open_state(&config).await?;
        let watermarks = repo
            .list()
            .await
            .context("Failed to read watermarks")?;
        let counts = repo
            .count_by_status()
            .await
            .context("Failed to count executions")?;
        let leases = repo
            .active_leases()
            .await
            .context("Failed to read execution leases")?;
        pool.close().await;

        let (rows, orphans) = join_watermarks(&items, watermarks, &leases);

        if ctx.format.is_json() {
            let items_json: Vec<_> = rows
                .iter()
                .map(|row| {
                    serde_json::json!({
                        "item_key": row.item_key.to_string(),
                        "connector": row.connector,
                        "source": row.source,
                        "watermark": row.watermark.map(|t| t.to_rfc3339()),
                        "running_since": row.running_since.map(|t| t.to_rfc3339()),
                    })
                })
                .collect();
            let orphans_json: Vec<_> = orphans
                .iter()
                .map(|(key, at)| {
                    serde_json::json!({"item_key": key.to_string(), "watermark": at.to_rfc3339()})
                })
                .collect();
            let counts_json: serde_json::Map<String, serde_json::Value> = counts
                .iter()
                .map(|(status, n)| (status.clone(), serde_json::json!(n)))
                .collect();
            formatter.print_json(&serde_json::json!({
                "items": items_json,
                "unconfigured_watermarks": orphans_json,
                "executions": counts_json,
            }));
            return Ok(());
        }

        formatter.success(&format!("Status ({} items)", rows.len()));
        formatter.info("");
        for row in &rows {
            let watermark = row
                .watermark
                .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
                .unwrap_or_else(|| "never synced".to_string());
            let running = row
                .running_since
                .map(|t| format!("  (running since {})", t.format("%H:%M:%S UTC")))
                .unwrap_or_default();
            formatter.info(&format!(
                "  {:<16} {:<16} {:<30} {}{}",
                row.item_key,
                truncate(&row.connector, 16),
                truncate(&row.source, 30),
                watermark,
                running
            ));
        }

        if !orphans.is_empty() {
            formatter.info("");
            formatter.warn(&format!(
                "{} stored watermark(s) belong to items no longer configured",
                orphans.len()
            ));
            for (key, at) in &orphans {
                formatter.info(&format!("  {}  {}", key, at.to_rfc3339()));
            }
        }

        formatter.info("");
        if counts.is_empty() {
            formatter.info("No executions recorded yet.");
        } else {
            formatter.info("Executions:");
            for (status, n) in &counts {
                formatter.info(&format!("  {:<16} {}", status, n));
            }
        }
        Ok(())
    }
}
