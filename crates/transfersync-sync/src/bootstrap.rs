//! Wiring from configuration to a ready-to-run [`ScheduleRegistry`]
//!
//! Every connector gets its own orchestrator, since listing and dispatch
//! both read from that connector's mount. All orchestrators share one
//! in-flight registry and the given watermark store, lease store and report
//! sink.

use std::sync::Arc;

use anyhow::Context;
use chrono::{DateTime, Utc};
use tracing::info;

use transfersync_core::config::{Config, ConnectorConfig, StorageBackend, StorageConfig};
use transfersync_core::domain::ConnectorName;
use transfersync_core::ports::{
    IExecutionLease, IReportSink, ITransferDispatcher, IWatermarkStore,
};

use crate::filesystem::{DirectoryDispatcher, MountedDirectoryListing};
use crate::in_flight::InFlightRegistry;
use crate::orchestrator::ExecutionOrchestrator;
use crate::registry::ScheduleRegistry;

/// Builds the dispatcher for one connector according to the storage backend
pub async fn build_dispatcher(
    storage: &StorageConfig,
    connector: &ConnectorConfig,
) -> anyhow::Result<Arc<dyn ITransferDispatcher>> {
    match storage.backend {
        StorageBackend::Directory => Ok(Arc::new(DirectoryDispatcher::new(
            &connector.mount_root,
            &storage.root,
        ))),
        #[cfg(feature = "s3")]
        StorageBackend::S3 => Ok(Arc::new(
            crate::s3::S3Dispatcher::from_env(&connector.mount_root, storage.region.clone()).await,
        )),
        #[cfg(not(feature = "s3"))]
        StorageBackend::S3 => {
            anyhow::bail!("storage backend 's3' requires building with the 's3' feature")
        }
    }
}

/// Builds one orchestrator per connector and registers every sync item
pub async fn build_registry(
    config: &Config,
    store: Arc<dyn IWatermarkStore>,
    lease: Arc<dyn IExecutionLease>,
    sink: Arc<dyn IReportSink>,
    now: DateTime<Utc>,
) -> anyhow::Result<ScheduleRegistry> {
    let in_flight = InFlightRegistry::new();
    let tolerance = config.skew_tolerance();
    let lease_ttl = config.lease_ttl();
    let items = config
        .sync_items()
        .context("invalid sync settings in configuration")?;

    let mut registry = ScheduleRegistry::new();
    for connector in &config.connectors {
        let name = ConnectorName::new(&connector.name)?;
        let listing = Arc::new(MountedDirectoryListing::new(&connector.mount_root));
        let dispatcher = build_dispatcher(&config.storage, connector).await?;
        let orchestrator = Arc::new(
            ExecutionOrchestrator::new(
                listing,
                dispatcher,
                Arc::clone(&store),
                Arc::clone(&sink),
                tolerance,
            )
            .with_in_flight(in_flight.clone())
            .with_lease(Arc::clone(&lease), lease_ttl),
        );

        for item in items.iter().filter(|item| *item.connector() == name) {
            registry.register(item.clone(), Arc::clone(&orchestrator), now);
        }
        info!(
            connector = %name,
            mount = %connector.mount_root.display(),
            "Connector ready"
        );
    }

    Ok(registry)
}
