//! Resolve command - Preview how a folder template expands
//!
//! `transfersync resolve "/outbound/%year%/%month%" --at 2024-03-05`

use anyhow::Result;
use chrono::{DateTime, Utc};
use clap::Args;
use transfersync_core::domain::sync_item::normalize_folder;
use transfersync_core::domain::{template, RemotePath};

use super::{parse_instant, CliContext};
use crate::output::get_formatter;

#[derive(Debug, Args)]
pub struct ResolveCommand {
    /// Folder template, e.g. "/outbound/%year%/%month%/%day%"
    pub template: String,

    /// Reference instant (defaults to now)
    #[arg(long)]
    pub at: Option<String>,
}

/// Template expansion result
#[derive(Debug, PartialEq)]
pub struct Resolution {
    pub template: String,
    pub at: DateTime<Utc>,
    pub path: Result<RemotePath, String>,
}

pub fn resolve_template(raw: &str, at: DateTime<Utc>) -> Resolution {
    let template = normalize_folder(raw);
    let path = RemotePath::new(template::resolve(&template, at)).map_err(|e| e.to_string());
    Resolution { template, at, path }
}

impl ResolveCommand {
    pub fn execute(&self, ctx: &CliContext) -> Result<()> {
        let formatter = get_formatter(ctx.format);
        let at = match &self.at {
            Some(raw) => parse_instant(raw)?,
            None => Utc::now(),
        };
        let resolution = resolve_template(&self.template, at);

        if ctx.format.is_json() {
            formatter.print_json(&serde_json::json!({
                "template": resolution.template,
                "at": resolution.at.to_rfc3339(),
                "has_date_tags": template::has_date_tags(&resolution.template),
                "path": resolution.path.as_ref().ok().map(|p| p.to_string()),
                "error": resolution.path.as_ref().err(),
            }));
            return Ok(());
        }

        match &resolution.path {
            Ok(path) => {
                formatter.success(&path.to_string());
                formatter.info(&format!("template: {}", resolution.template));
                formatter.info(&format!("at:       {}", resolution.at.to_rfc3339()));
            }
            Err(e) => formatter.error(&format!(
                "'{}' does not resolve to a valid path: {}",
                resolution.template, e
            )),
        }
        Ok(())
    }
}
