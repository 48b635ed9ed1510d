//! Items command - List configured sync items
//!
//! Shows every connector/folder/bucket mapping with its item key, schedule
//! and next firing. Item keys (or a unique prefix) are what `run` and
//! `history --item` accept.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Args;
use transfersync_core::domain::SyncItem;

use super::CliContext;
use crate::output::{get_formatter, truncate};

#[derive(Debug, Args)]
pub struct ItemsCommand {
    /// Only items of this connector
    #[arg(long)]
    pub connector: Option<String>,
}

pub fn item_json(item: &SyncItem, now: DateTime<Utc>) -> serde_json::Value {
    serde_json::json!({
        "item_key": item.key().to_string(),
        "connector": item.connector().to_string(),
        "source": item.source_template(),
        "recursive": item.recursive(),
        "bucket": item.target().bucket.to_string(),
        "prefix": item.target().prefix.to_string(),
        "schedule": item.schedule().to_string(),
        "next_firing": item.schedule().next_after(now).map(|t| t.to_rfc3339()),
    })
}

impl ItemsCommand {
    pub fn execute(&self, ctx: &CliContext) -> Result<()> {
        let formatter = get_formatter(ctx.format);
        let config = ctx.load_config()?;
        let items: Vec<SyncItem> = config
            .sync_items()
            .context("Configuration contains invalid sync settings")?
            .into_iter()
            .filter(|item| {
                self.connector
                    .as_deref()
                    .map_or(true, |name| item.connector().as_str() == name)
            })
            .collect();
        let now = Utc::now();

        if ctx.format.is_json() {
            let items_json: Vec<_> = items.iter().map(|item| item_json(item, now)).collect();
            formatter.print_json(&serde_json::json!({
                "count": items.len(),
                "items": items_json,
            }));
            return Ok(());
        }

        if items.is_empty() {
            formatter.info("No sync items configured.");
            return Ok(());
        }

        formatter.success(&format!("Sync items ({})", items.len()));
        formatter.info("");
        formatter.info("  Key              Connector        Source                         Target");
        formatter.info("  ---------------- ---------------- ------------------------------ ------");
        for item in &items {
            let target = if item.target().prefix.is_empty() {
                item.target().bucket.to_string()
            } else {
                format!("{}/{}", item.target().bucket, item.target().prefix)
            };
            formatter.info(&format!(
                "  {:<16} {:<16} {:<30} {}",
                item.key(),
                truncate(item.connector().as_str(), 16),
                truncate(item.source_template(), 30),
                target
            ));
            let next = item
                .schedule()
                .next_after(now)
                .map(|t| t.format("%Y-%m-%d %H:%M UTC").to_string())
                .unwrap_or_else(|| "never".to_string());
            formatter.info(&format!(
                "  {:<16} schedule: {}  next: {}{}",
                "",
                item.schedule(),
                next,
                if item.recursive() { "  (recursive)" } else { "" }
            ));
        }
        Ok(())
    }
}
