//! TransferSync Daemon - scheduled remote-to-bucket synchronization
//!
//! This binary runs as a long-lived service and:
//! - loads and validates the YAML configuration
//! - opens the SQLite state database (watermarks and execution history)
//! - registers every configured sync item with its schedule
//! - runs the scheduler until SIGTERM/SIGINT, then lets running executions
//!   observe cancellation and report before exiting
//!
//! The configuration path defaults to `~/.config/transfersync/config.yaml`
//! and can be overridden with `TRANSFERSYNC_CONFIG`.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use transfersync_audit::{ExecutionReporter, JsonReportSink};
use transfersync_cache::{DatabasePool, SqliteStateRepository};
use transfersync_core::config::{Config, LoggingConfig};
use transfersync_core::ports::{IExecutionLease, IReportSink, IWatermarkStore};
use transfersync_sync::bootstrap::build_registry;
use transfersync_sync::scheduler::SyncScheduler;

const CONFIG_ENV: &str = "TRANSFERSYNC_CONFIG";

// ============================================================================
// DaemonService
// ============================================================================

/// Holds everything the daemon needs between startup and shutdown
struct DaemonService {
    config: Config,
    db_pool: DatabasePool,
    state_repo: Arc<SqliteStateRepository>,
    shutdown: CancellationToken,
}

impl DaemonService {
    /// Validates the configuration and opens the state database
    async fn new(config: Config, shutdown: CancellationToken) -> Result<Self> {
        let errors = config.validate();
        if !errors.is_empty() {
            for e in &errors {
                error!(field = %e.field, "{}", e.message);
            }
            anyhow::bail!("configuration has {} error(s)", errors.len());
        }

        let db_pool = DatabasePool::new(&config.state.database)
            .await
            .context("Failed to open state database")?;
        let state_repo = Arc::new(SqliteStateRepository::new(db_pool.pool().clone()));

        Ok(Self {
            config,
            db_pool,
            state_repo,
            shutdown,
        })
    }

    /// Report sinks: SQLite history always, JSON files when enabled
    fn reporter(&self) -> ExecutionReporter {
        let mut reporter = ExecutionReporter::new().with_sink(
            "history",
            Arc::clone(&self.state_repo) as Arc<dyn IReportSink>,
        );
        if self.config.reports.enabled {
            reporter = reporter.with_sink(
                "json",
                Arc::new(JsonReportSink::new(&self.config.reports.directory)),
            );
        }
        reporter
    }

    /// Runs the scheduler until the shutdown token fires
    async fn run(&self) -> Result<()> {
        let registry = build_registry(
            &self.config,
            Arc::clone(&self.state_repo) as Arc<dyn IWatermarkStore>,
            Arc::clone(&self.state_repo) as Arc<dyn IExecutionLease>,
            Arc::new(self.reporter()),
            Utc::now(),
        )
        .await
        .context("Failed to build schedule registry")?;

        if registry.is_empty() {
            warn!("No sync items configured; the daemon will idle until stopped");
        }
        for entry in registry.items() {
            info!(
                item_key = %entry.item.key(),
                connector = %entry.item.connector(),
                source = %entry.item.source_template(),
                bucket = %entry.item.target().bucket,
                next = ?entry.next_firing(),
                "Sync item scheduled"
            );
        }

        let (scheduler, _handle) = SyncScheduler::new(
            registry,
            Duration::from_secs(self.config.sync.tick_interval_secs),
            self.config.sync.max_concurrent_executions as usize,
        );
        let stats = scheduler.run(self.shutdown.clone()).await;

        info!(
            started = stats.started,
            succeeded = stats.succeeded,
            partial_failures = stats.partial_failures,
            failed = stats.failed,
            rejected = stats.rejected,
            "Scheduler finished"
        );

        self.db_pool.close().await;
        Ok(())
    }
}

// ============================================================================
// Startup helpers
// ============================================================================

fn config_path() -> (PathBuf, bool) {
    match std::env::var_os(CONFIG_ENV) {
        Some(path) => (PathBuf::from(path), true),
        None => (Config::default_path(), false),
    }
}

/// An explicitly requested file must exist; the default location may be absent
fn load_config(path: &std::path::Path, explicit: bool) -> Result<Config> {
    if explicit || path.exists() {
        Config::load(path)
    } else {
        Ok(Config::default())
    }
}

/// `RUST_LOG` wins over the configured level
fn env_filter(logging: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level))
}

fn init_tracing(logging: &LoggingConfig) {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter(logging))
        .with_target(true);
    if logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Waits for SIGTERM or SIGINT and triggers the cancellation token
async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C)");
        }
        _ = terminate => {
            info!("Received SIGTERM");
        }
    }

    token.cancel();
}

// ============================================================================
// Main entry point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let (path, explicit) = config_path();
    let config = load_config(&path, explicit)
        .with_context(|| format!("Failed to load configuration from {}", path.display()))?;

    init_tracing(&config.logging);
    info!(config_path = %path.display(), "TransferSync daemon starting (transfersyncd)");

    let shutdown_token = CancellationToken::new();
    let signal_token = shutdown_token.clone();
    tokio::spawn(async move {
        shutdown_signal(signal_token).await;
    });

    let service = DaemonService::new(config, shutdown_token).await?;
    let result = service.run().await;

    match &result {
        Ok(()) => info!("TransferSync daemon shut down gracefully"),
        Err(e) => error!(error = %e, "TransferSync daemon exiting with error"),
    }

    result
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use tempfile::TempDir;
    use transfersync_core::config::{
        ConfigBuilder, ConnectorConfig, LocalRepositoryConfig, RemoteFolderConfig,
        SyncSettingConfig,
    };

    use super::*;

    fn config_in(dir: &TempDir) -> Config {
        ConfigBuilder::new()
            .database(dir.path().join("state.db"))
            .reports_directory(dir.path().join("reports"))
            .storage_root(dir.path().join("buckets"))
            .connector(ConnectorConfig {
                name: "partner-a".into(),
                description: None,
                url: "sftp.partner-a.example:22".into(),
                mount_root: dir.path().join("mnt"),
                schedule: "@hourly".into(),
                sync_settings: vec![SyncSettingConfig {
                    local_repository: LocalRepositoryConfig {
                        bucket_name: "landing".into(),
                        prefix: "partner-a".into(),
                        kms_key_id: None,
                    },
                    remote_folders: RemoteFolderConfig {
                        folder: "/outbound/%year%".into(),
                        recursive: false,
                    },
                    schedule: None,
                }],
            })
            .build()
    }

    #[test]
    fn test_missing_default_config_falls_back_to_defaults() {
        let dir = TempDir::new().unwrap();
        let config = load_config(&dir.path().join("absent.yaml"), false).unwrap();
        assert_eq!(config.sync.max_concurrent_executions, 8);
    }

    #[test]
    fn test_missing_explicit_config_is_an_error() {
        let dir = TempDir::new().unwrap();
        assert!(load_config(&dir.path().join("absent.yaml"), true).is_err());
    }

    #[tokio::test]
    async fn test_invalid_config_is_rejected() {
        let dir = TempDir::new().unwrap();
        let mut config = config_in(&dir);
        config.sync.max_concurrent_executions = 0;

        assert!(DaemonService::new(config, CancellationToken::new())
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let dir = TempDir::new().unwrap();
        let token = CancellationToken::new();
        let service = DaemonService::new(config_in(&dir), token.clone())
            .await
            .unwrap();
        assert_eq!(service.reporter().len(), 2);

        token.cancel();
        service.run().await.unwrap();
        assert!(dir.path().join("state.db").exists());
    }
}
