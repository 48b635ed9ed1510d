//! Sync scheduler - turns due schedules and manual requests into executions
//!
//! ## Flow
//!
//! ```text
//! interval tick ──→ ScheduleRegistry::due() ──┐
//!                                             ├──→ dispatch ──→ JoinSet<execution>
//! SchedulerHandle ──→ mpsc::Receiver ─────────┘          │
//!                                                  Semaphore (max concurrent)
//! ```
//!
//! Executions of different items run in parallel up to the configured limit.
//! A trigger for an item that is already dispatched is rejected. Shutdown
//! cancels every running execution and waits for their reports.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use transfersync_core::domain::{ExecutionId, ExecutionRecord, ExecutionStatus, ItemKey};

use crate::in_flight::InFlightRegistry;
use crate::registry::{ScheduleRegistry, Trigger};
use crate::SyncError;

const TRIGGER_CHANNEL_CAPACITY: usize = 64;

/// Counters accumulated over one scheduler run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    pub started: u64,
    pub rejected: u64,
    pub succeeded: u64,
    pub partial_failures: u64,
    pub failed: u64,
}

impl SchedulerStats {
    fn record(&mut self, status: Option<ExecutionStatus>) {
        match status {
            Some(ExecutionStatus::Succeeded) => self.succeeded += 1,
            Some(ExecutionStatus::PartialFailure) => self.partial_failures += 1,
            Some(ExecutionStatus::Failed) | None => self.failed += 1,
        }
    }
}

/// Cloneable handle for requesting executions outside the schedule
#[derive(Debug, Clone)]
pub struct SchedulerHandle {
    trigger_tx: mpsc::Sender<Trigger>,
}

impl SchedulerHandle {
    /// Queues `trigger` for dispatch
    pub async fn trigger(&self, trigger: Trigger) -> Result<(), SyncError> {
        let key = trigger.item_key.clone();
        self.trigger_tx
            .send(trigger)
            .await
            .map_err(|_| SyncError::UnknownItem(format!("scheduler stopped, dropping {key}")))
    }

    /// Requests an execution of `item_key` with the current instant as trigger
    pub async fn trigger_now(&self, item_key: ItemKey) -> Result<(), SyncError> {
        self.trigger(Trigger::new(item_key, Utc::now())).await
    }
}

/// Drives every registered item according to its schedule
pub struct SyncScheduler {
    registry: ScheduleRegistry,
    trigger_rx: mpsc::Receiver<Trigger>,
    tick: Duration,
    limit: Arc<Semaphore>,
    dispatched: InFlightRegistry,
}

impl SyncScheduler {
    /// Creates a scheduler over `registry`
    ///
    /// `tick` is how often due schedules are checked; `max_concurrent` caps
    /// executions running at the same time (minimum 1).
    pub fn new(
        registry: ScheduleRegistry,
        tick: Duration,
        max_concurrent: usize,
    ) -> (Self, SchedulerHandle) {
        let (trigger_tx, trigger_rx) = mpsc::channel(TRIGGER_CHANNEL_CAPACITY);
        let max_concurrent = max_concurrent.max(1);

        info!(
            items = registry.len(),
            tick_ms = tick.as_millis() as u64,
            max_concurrent,
            "Creating sync scheduler"
        );

        let scheduler = Self {
            registry,
            trigger_rx,
            tick,
            limit: Arc::new(Semaphore::new(max_concurrent)),
            dispatched: InFlightRegistry::new(),
        };
        (scheduler, SchedulerHandle { trigger_tx })
    }

    /// Items currently dispatched (waiting for a slot or running)
    pub fn dispatched(&self) -> usize {
        self.dispatched.len()
    }

    /// Main loop; returns once `cancel` fires and every execution has ended
    pub async fn run(mut self, cancel: CancellationToken) -> SchedulerStats {
        info!("Sync scheduler starting");

        let mut stats = SchedulerStats::default();
        let mut tasks: JoinSet<Option<Result<ExecutionRecord, SyncError>>> = JoinSet::new();
        let mut timer = tokio::time::interval(self.tick);
        timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut handles_open = true;

        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    info!(running = tasks.len(), "Shutdown requested, waiting for executions");
                    break;
                }

                _ = timer.tick() => {
                    for trigger in self.registry.due(Utc::now()) {
                        self.dispatch(trigger, &mut tasks, &cancel, &mut stats);
                    }
                }

                trigger = self.trigger_rx.recv(), if handles_open => {
                    match trigger {
                        Some(trigger) => {
                            debug!(item_key = %trigger.item_key, "Manual trigger received");
                            self.dispatch(trigger, &mut tasks, &cancel, &mut stats);
                        }
                        None => {
                            debug!("All scheduler handles dropped");
                            handles_open = false;
                        }
                    }
                }

                Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                    Self::collect(joined, &mut stats);
                }
            }
        }

        while let Some(joined) = tasks.join_next().await {
            Self::collect(joined, &mut stats);
        }

        info!(
            started = stats.started,
            rejected = stats.rejected,
            succeeded = stats.succeeded,
            partial_failures = stats.partial_failures,
            failed = stats.failed,
            "Sync scheduler stopped"
        );
        stats
    }

    fn dispatch(
        &self,
        trigger: Trigger,
        tasks: &mut JoinSet<Option<Result<ExecutionRecord, SyncError>>>,
        cancel: &CancellationToken,
        stats: &mut SchedulerStats,
    ) {
        let Some(entry) = self.registry.get(&trigger.item_key) else {
            warn!(item_key = %trigger.item_key, "Trigger for unknown item ignored");
            stats.rejected += 1;
            return;
        };
        let Some(guard) = self
            .dispatched
            .try_acquire(&trigger.item_key, ExecutionId::new())
        else {
            warn!(
                item_key = %trigger.item_key,
                trigger = %trigger.instant,
                "Item still running, trigger rejected"
            );
            stats.rejected += 1;
            return;
        };

        stats.started += 1;
        let item = entry.item.clone();
        let orchestrator = Arc::clone(&entry.orchestrator);
        let limit = Arc::clone(&self.limit);
        let token = cancel.child_token();

        tasks.spawn(async move {
            let _guard = guard;
            let _permit = tokio::select! {
                biased;
                _ = token.cancelled() => {
                    debug!(item_key = %item.key(), "Cancelled while waiting for a slot");
                    return None;
                }
                permit = limit.acquire_owned() => permit.ok()?,
            };
            Some(orchestrator.execute(&item, trigger.instant, &token).await)
        });
    }

    fn collect(
        joined: Result<Option<Result<ExecutionRecord, SyncError>>, tokio::task::JoinError>,
        stats: &mut SchedulerStats,
    ) {
        match joined {
            Ok(Some(Ok(record))) => stats.record(record.status()),
            Ok(Some(Err(SyncError::AlreadyRunning(key)))) => {
                debug!(item_key = %key, "Execution rejected by orchestrator");
                stats.rejected += 1;
            }
            Ok(Some(Err(e))) => {
                warn!(error = %e, "Execution aborted");
                stats.failed += 1;
            }
            Ok(None) => stats.rejected += 1,
            Err(e) => {
                warn!(error = %e, "Execution task panicked");
                stats.failed += 1;
            }
        }
    }
}
