//! Config command - Inspect and check the configuration file
//!
//! Provides the `transfersync config` CLI command which:
//! 1. Shows the effective configuration (YAML or JSON)
//! 2. Validates the file and lists every problem found
//! 3. Prints the path the CLI and daemon read from

use anyhow::{Context, Result};
use clap::Subcommand;
use tracing::info;
use transfersync_core::config::Config;

use super::CliContext;
use crate::output::get_formatter;

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Display the effective configuration
    Show,
    /// Validate the configuration file
    Validate,
    /// Print the configuration file path
    Path,
}

/// Outcome of validating a file on disk
#[derive(Debug, PartialEq)]
pub enum Validation {
    Missing,
    Unreadable(String),
    Invalid(Vec<String>),
    Valid { items: usize },
}

pub fn validate_file(path: &std::path::Path) -> Validation {
    if !path.exists() {
        return Validation::Missing;
    }
    let config = match Config::load(path) {
        Ok(config) => config,
        Err(e) => return Validation::Unreadable(format!("{:#}", e)),
    };
    let errors: Vec<String> = config
        .validate()
        .iter()
        .map(|e| format!("{}: {}", e.field, e.message))
        .collect();
    if !errors.is_empty() {
        return Validation::Invalid(errors);
    }
    match config.sync_items() {
        Ok(items) => Validation::Valid { items: items.len() },
        Err(e) => Validation::Invalid(vec![e.to_string()]),
    }
}

impl ConfigCommand {
    pub fn execute(&self, ctx: &CliContext) -> Result<()> {
        match self {
            ConfigCommand::Show => self.execute_show(ctx),
            ConfigCommand::Validate => self.execute_validate(ctx),
            ConfigCommand::Path => {
                let path = ctx.config_path();
                if ctx.format.is_json() {
                    get_formatter(ctx.format).print_json(&serde_json::json!({
                        "config_path": path.display().to_string(),
                        "exists": path.exists(),
                    }));
                } else {
                    println!("{}", path.display());
                }
                Ok(())
            }
        }
    }

    fn execute_show(&self, ctx: &CliContext) -> Result<()> {
        let formatter = get_formatter(ctx.format);
        let config_path = ctx.config_path();
        let config = ctx.load_config()?;

        info!(config_path = %config_path.display(), "Showing configuration");

        if ctx.format.is_json() {
            let json = serde_json::to_value(&config)
                .context("Failed to serialize configuration to JSON")?;
            formatter.print_json(&json);
        } else {
            formatter.success(&format!("Configuration ({})", config_path.display()));
            formatter.info("");
            let yaml = serde_yaml::to_string(&config)
                .context("Failed to serialize configuration to YAML")?;
            for line in yaml.lines() {
                formatter.info(line);
            }
        }
        Ok(())
    }

    fn execute_validate(&self, ctx: &CliContext) -> Result<()> {
        let formatter = get_formatter(ctx.format);
        let config_path = ctx.config_path();
        let validation = validate_file(&config_path);

        if ctx.format.is_json() {
            let (valid, errors, items) = match &validation {
                Validation::Missing => (false, vec!["configuration file not found".to_string()], 0),
                Validation::Unreadable(e) => (false, vec![e.clone()], 0),
                Validation::Invalid(errors) => (false, errors.clone(), 0),
                Validation::Valid { items } => (true, Vec::new(), *items),
            };
            formatter.print_json(&serde_json::json!({
                "valid": valid,
                "config_path": config_path.display().to_string(),
                "items": items,
                "errors": errors,
            }));
        } else {
            match &validation {
                Validation::Missing => formatter.error(&format!(
                    "Configuration file not found at {}",
                    config_path.display()
                )),
                Validation::Unreadable(e) => {
                    formatter.error(&format!("Cannot parse {}: {}", config_path.display(), e))
                }
                Validation::Invalid(errors) => {
                    formatter.error(&format!(
                        "Configuration has {} error(s):",
                        errors.len()
                    ));
                    for e in errors {
                        formatter.info(&format!("- {}", e));
                    }
                }
                Validation::Valid { items } => formatter.success(&format!(
                    "Configuration is valid ({} sync item{})",
                    items,
                    if *items == 1 { "" } else { "s" }
                )),
            }
        }

        if matches!(validation, Validation::Valid { .. }) {
            Ok(())
        } else {
            anyhow::bail!("configuration is not valid")
        }
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    const VALID: &str = r#"
sync:
  skew_tolerance_secs: 120
connectors:
  - name: partner-a
    url: sftp.partner-a.example:22
    mount_root: /mnt/partner-a
    schedule: "@hourly"
    sync_settings:
      - local_repository:
          bucket_name: landing
          prefix: partner-a
        remote_folders:
          folder: /outbound/%year%/%month%
      - local_repository:
          bucket_name: landing
          prefix: partner-a/archive
        remote_folders:
          folder: /archive
          recursive: true
        schedule: "@daily"
"#;

    fn write(dir: &TempDir, content: &str) -> std::path::PathBuf {
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_validate_valid_file() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, VALID);
        assert_eq!(validate_file(&path), Validation::Valid { items: 2 });
    }

    #[test]
    fn test_validate_missing_file() {
        let dir = TempDir::new().unwrap();
        assert_eq!(
            validate_file(&dir.path().join("absent.yaml")),
            Validation::Missing
        );
    }

    #[test]
    fn test_validate_unparseable_file() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "sync: [unterminated");
        assert!(matches!(validate_file(&path), Validation::Unreadable(_)));
    }

    #[test]
    fn test_validate_reports_field_errors() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, &VALID.replace("\"@hourly\"", "\"every tuesday\""));
        match validate_file(&path) {
            Validation::Invalid(errors) => {
                assert!(errors.iter().any(|e| e.starts_with("connectors[0].schedule")))
            }
            other => panic!("expected Invalid, got {:?}", other),
        }
    }
}
