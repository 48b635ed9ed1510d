//! Per-item execution orchestrator
//!
//! The [`ExecutionOrchestrator`] runs one execution of one sync item for one
//! trigger instant:
//!
//! 1. **Resolve**: expand date tags in the source template
//! 2. **List**: enumerate the remote folder (once)
//! 3. **Decide**: compare each entry with the stored watermark
//! 4. **Dispatch**: copy every entry decided for transfer
//! 5. **Finalize**: advance the watermark only if no transfer failed
//! 6. **Report**: emit the finished record to the report sink
//!
//! Failures never leave the execution: a listing or store error ends it in
//! `Failed`, a transfer error only marks that file. There are no internal
//! retries; the next scheduled firing is the recovery path.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use transfersync_core::domain::{
    decide, DomainError, ExecutionRecord, ExecutionStatus, FailureCause, ItemKey, RemoteEntry,
    SkewTolerance, SyncItem, TargetLocation, TransferOutcome, Watermark,
};
use transfersync_core::ports::{
    IDirectoryListing, IExecutionLease, IReportSink, ITransferDispatcher, IWatermarkStore,
};

use crate::in_flight::{HeldLease, InFlightRegistry};
use crate::SyncError;

/// Default number of files copied concurrently within one execution
pub const DEFAULT_TRANSFER_CONCURRENCY: usize = 10;

/// Default lifetime of an execution lease in the shared state store
pub const DEFAULT_LEASE_TTL: Duration = Duration::from_secs(300);

/// Coordinates listing, decision, dispatch, commit and reporting for sync items
///
/// One orchestrator may serve many items; executions of different items run
/// independently and share nothing but the watermark store, which is keyed
/// by item.
pub struct ExecutionOrchestrator {
    listing: Arc<dyn IDirectoryListing>,
    dispatcher: Arc<dyn ITransferDispatcher>,
    store: Arc<dyn IWatermarkStore>,
    sink: Arc<dyn IReportSink>,
    tolerance: SkewTolerance,
    transfer_concurrency: usize,
    in_flight: InFlightRegistry,
    lease: Option<Arc<dyn IExecutionLease>>,
    lease_ttl: Duration,
}

impl ExecutionOrchestrator {
    pub fn new(
        listing: Arc<dyn IDirectoryListing>,
        dispatcher: Arc<dyn ITransferDispatcher>,
        store: Arc<dyn IWatermarkStore>,
        sink: Arc<dyn IReportSink>,
        tolerance: SkewTolerance,
    ) -> Self {
        Self {
            listing,
            dispatcher,
            store,
            sink,
            tolerance,
            transfer_concurrency: DEFAULT_TRANSFER_CONCURRENCY,
            in_flight: InFlightRegistry::new(),
            lease: None,
            lease_ttl: DEFAULT_LEASE_TTL,
        }
    }

    /// Caps concurrent file copies within one execution (minimum 1)
    pub fn with_transfer_concurrency(mut self, concurrency: usize) -> Self {
        self.transfer_concurrency = concurrency.max(1);
        self
    }

    /// Shares an in-flight registry with other orchestrators
    pub fn with_in_flight(mut self, in_flight: InFlightRegistry) -> Self {
        self.in_flight = in_flight;
        self
    }

    /// Also claims a lease in `lease` for every execution, excluding
    /// executions of the same item in other processes sharing that store
    pub fn with_lease(mut self, lease: Arc<dyn IExecutionLease>, ttl: Duration) -> Self {
        self.lease = Some(lease);
        self.lease_ttl = ttl;
        self
    }

    /// Returns true if `item` has an execution running on this orchestrator
    pub fn is_running(&self, item: &ItemKey) -> bool {
        self.in_flight.is_running(item)
    }

    /// Runs one execution of `item` triggered at `trigger_instant`
    ///
    /// Returns the finished record whatever its status. Only two situations
    /// return an error: the item already has an execution in flight (here or,
    /// with a lease store, in another process), or the state machine was
    /// driven out of order. A lease store that cannot be reached fails the
    /// execution before anything is listed.
    #[tracing::instrument(skip(self, item, cancel), fields(item_key = %item.key()))]
    pub async fn execute(
        &self,
        item: &SyncItem,
        trigger_instant: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Result<ExecutionRecord, SyncError> {
        let mut record =
            ExecutionRecord::new(item.key().clone(), item.connector().as_str(), trigger_instant);

        let Some(_guard) = self.in_flight.try_acquire(item.key(), *record.id()) else {
            warn!(
                trigger = %trigger_instant,
                "Execution already in flight, rejecting trigger"
            );
            return Err(SyncError::AlreadyRunning(item.key().clone()));
        };

        let mut lease = None;
        if let Some(store) = &self.lease {
            match HeldLease::claim(Arc::clone(store), item.key(), *record.id(), self.lease_ttl).await
            {
                Ok(Some(held)) => lease = Some(held),
                Ok(None) => {
                    warn!(
                        trigger = %trigger_instant,
                        "Execution in flight in another process, rejecting trigger"
                    );
                    return Err(SyncError::AlreadyRunning(item.key().clone()));
                }
                Err(e) => record.fail(FailureCause::Store {
                    message: format!("failed to claim execution lease: {e:#}"),
                })?,
            }
        }

        info!(
            execution_id = %record.id(),
            trigger = %trigger_instant,
            source = %item.source_template(),
            "Execution started"
        );

        if record.status().is_none() {
            self.drive(&mut record, item, cancel).await?;
        }

        let summary = record.summary();
        match (record.status(), summary) {
            (Some(ExecutionStatus::Failed), _) => warn!(
                execution_id = %record.id(),
                cause = %record.failure().map(ToString::to_string).unwrap_or_default(),
                "Execution failed"
            ),
            (Some(status), Some(summary)) => info!(
                execution_id = %record.id(),
                %status,
                transferred = summary.transferred,
                skipped = summary.skipped,
                failed = summary.failed,
                watermark_advanced = record.watermark_advanced(),
                "Execution finished"
            ),
            _ => {}
        }

        if let Err(e) = self.sink.emit(&record).await {
            warn!(execution_id = %record.id(), error = %e, "Failed to emit execution report");
        }
        if let Some(lease) = lease {
            lease.release().await;
        }

        Ok(record)
    }

    /// Walks the state machine; every failure is recorded on `record`
    async fn drive(
        &self,
        record: &mut ExecutionRecord,
        item: &SyncItem,
        cancel: &CancellationToken,
    ) -> Result<(), DomainError> {
        if cancel.is_cancelled() {
            return record.fail(FailureCause::Cancelled);
        }

        // --- Resolved ---
        let root = match item.resolve_source(record.trigger_instant()) {
            Ok(path) => path,
            Err(e) => {
                return record.fail(FailureCause::Resolution {
                    message: e.to_string(),
                })
            }
        };
        record.mark_resolved(root.clone())?;
        debug!(path = %root, "Source resolved");

        // --- Listed ---
        let listing = tokio::select! {
            biased;
            _ = cancel.cancelled() => return record.fail(FailureCause::Cancelled),
            result = self.listing.list(&root, item.recursive()) => result,
        };
        let entries = match listing {
            Ok(entries) => entries,
            Err(e) => {
                return record.fail(FailureCause::Listing {
                    message: format!("{e:#}"),
                })
            }
        };
        record.mark_listed()?;
        debug!(count = entries.len(), "Remote folder listed");

        // --- Decided ---
        let watermark = match self.store.get(item.key()).await {
            Ok(watermark) => watermark,
            Err(e) => {
                return record.fail(FailureCause::Store {
                    message: format!("failed to read watermark: {e:#}"),
                })
            }
        };
        let decisions = decide(&entries, watermark.as_ref(), self.tolerance);
        record.record_decisions(&entries, &decisions)?;

        // --- Dispatching ---
        record.start_dispatch()?;
        let transfers: Vec<(usize, RemoteEntry, TargetLocation)> = entries
            .into_iter()
            .zip(decisions)
            .enumerate()
            .filter(|(_, (_, decision))| decision.is_transfer())
            .map(|(index, (entry, _))| {
                let target = item.target_for(&entry);
                (index, entry, target)
            })
            .collect();

        if !self.dispatch(record, transfers, cancel).await? {
            return record.fail(FailureCause::Cancelled);
        }

        // --- Finalizing ---
        record.start_finalizing()?;
        if cancel.is_cancelled() {
            return record.fail(FailureCause::Cancelled);
        }
        if !record.may_commit_watermark() {
            record.complete(false)?;
            return Ok(());
        }

        let trigger = record.trigger_instant();
        let next = match &watermark {
            Some(current) => current.advanced_to(trigger).ok(),
            None => Some(Watermark::new(trigger)),
        };
        let Some(next) = next else {
            // The stored watermark is already later than this trigger.
            warn!(trigger = %trigger, "Stored watermark is newer than trigger, not committing");
            record.complete(false)?;
            return Ok(());
        };

        if let Err(e) = self.store.put(item.key(), &next).await {
            return record.fail(FailureCause::Store {
                message: format!("failed to write watermark: {e:#}"),
            });
        }
        record.complete(true)?;
        Ok(())
    }

    /// Copies every planned transfer, recording one outcome per file
    ///
    /// Returns `false` if cancellation interrupted the dispatch.
    async fn dispatch(
        &self,
        record: &mut ExecutionRecord,
        transfers: Vec<(usize, RemoteEntry, TargetLocation)>,
        cancel: &CancellationToken,
    ) -> Result<bool, DomainError> {
        let planned: Vec<(usize, String)> = transfers
            .iter()
            .map(|(index, _, target)| (*index, target.key.clone()))
            .collect();
        let mut pending = transfers.into_iter();
        let mut tasks = JoinSet::new();

        loop {
            while tasks.len() < self.transfer_concurrency {
                let Some((index, entry, target)) = pending.next() else {
                    break;
                };
                let dispatcher = Arc::clone(&self.dispatcher);
                tasks.spawn(async move {
                    let result = dispatcher.transfer(&entry, &target).await;
                    (index, entry, target, result)
                });
            }

            let joined = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tasks.shutdown().await;
                    return Ok(false);
                }
                joined = tasks.join_next() => joined,
            };

            let Some(joined) = joined else {
                break;
            };
            match joined {
                Ok((index, entry, target, Ok(()))) => {
                    debug!(path = %entry.path(), target = %target, "Transferred");
                    record.record_outcome(index, target.key, TransferOutcome::Transferred)?;
                }
                Ok((index, entry, target, Err(e))) => {
                    warn!(path = %entry.path(), target = %target, error = %e, "Transfer failed");
                    record.record_outcome(
                        index,
                        target.key,
                        TransferOutcome::Failed {
                            message: format!("{e:#}"),
                        },
                    )?;
                }
                Err(e) => {
                    // Outcome attributed below, once the surviving tasks are done.
                    warn!(error = %e, "Transfer task aborted");
                }
            }
        }

        // A panicked task leaves its entry without an outcome.
        for (index, key) in planned {
            if record.entries()[index].outcome.is_none() {
                record.record_outcome(
                    index,
                    key,
                    TransferOutcome::Failed {
                        message: "transfer task aborted".to_string(),
                    },
                )?;
            }
        }

        Ok(true)
    }
}
