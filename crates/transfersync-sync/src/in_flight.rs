//! In-flight execution tracking
//!
//! At most one execution per item may run at a time. A trigger arriving while
//! the item is busy is rejected, not queued: the next scheduled firing will
//! pick up anything the rejected one would have seen.
//!
//! Two layers enforce this:
//!
//! - [`InFlightRegistry`]: a lock-free map shared by the orchestrators of one
//!   process.
//! - [`HeldLease`]: a lease in the shared state store, so the daemon and a
//!   manual `run` from the CLI exclude each other too.

use std::sync::Arc;
use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use transfersync_core::domain::{ExecutionId, ItemKey};
use transfersync_core::ports::IExecutionLease;

/// Shared set of items that currently have a running execution
#[derive(Debug, Clone, Default)]
pub struct InFlightRegistry {
    running: Arc<DashMap<ItemKey, ExecutionId>>,
}

impl InFlightRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks `item` as running `execution`
    ///
    /// Returns `None` if the item already has an execution in flight. The
    /// returned guard releases the item when dropped.
    pub fn try_acquire(&self, item: &ItemKey, execution: ExecutionId) -> Option<InFlightGuard> {
        match self.running.entry(item.clone()) {
            Entry::Occupied(_) => None,
            Entry::Vacant(slot) => {
                slot.insert(execution);
                Some(InFlightGuard {
                    running: Arc::clone(&self.running),
                    item: item.clone(),
                })
            }
        }
    }

    /// Returns true if `item` has an execution in flight
    pub fn is_running(&self, item: &ItemKey) -> bool {
        self.running.contains_key(item)
    }

    /// The execution currently running for `item`, if any
    pub fn current(&self, item: &ItemKey) -> Option<ExecutionId> {
        self.running.get(item).map(|entry| *entry.value())
    }

    /// Number of items with an execution in flight
    pub fn len(&self) -> usize {
        self.running.len()
    }

    pub fn is_empty(&self) -> bool {
        self.running.is_empty()
    }
}

/// Releases the item's in-flight slot on drop
#[derive(Debug)]
pub struct InFlightGuard {
    running: Arc<DashMap<ItemKey, ExecutionId>>,
    item: ItemKey,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.running.remove(&self.item);
    }
}

/// An execution lease claimed in the state store
///
/// While held, a background task renews the lease every third of its
/// lifetime. [`HeldLease::release`] drops it once the execution is over; if
/// the holder is dropped without releasing (the execution future was
/// aborted), the release is spawned on the current runtime instead.
pub struct HeldLease {
    store: Arc<dyn IExecutionLease>,
    item: ItemKey,
    execution: ExecutionId,
    heartbeat: JoinHandle<()>,
    released: bool,
}

impl HeldLease {
    /// Claims `item` for `execution`; `Ok(None)` if another holder has it
    pub async fn claim(
        store: Arc<dyn IExecutionLease>,
        item: &ItemKey,
        execution: ExecutionId,
        ttl: Duration,
    ) -> anyhow::Result<Option<Self>> {
        if !store.try_claim(item, &execution, ttl).await? {
            return Ok(None);
        }
        let heartbeat = tokio::spawn(renew_until_aborted(
            Arc::clone(&store),
            item.clone(),
            execution,
            ttl,
        ));
        Ok(Some(Self {
            store,
            item: item.clone(),
            execution,
            heartbeat,
            released: false,
        }))
    }

    /// Stops renewing and removes the lease
    pub async fn release(mut self) {
        self.heartbeat.abort();
        self.released = true;
        if let Err(e) = self.store.release(&self.item, &self.execution).await {
            warn!(item_key = %self.item, error = %e, "Failed to release execution lease");
        }
    }
}

impl Drop for HeldLease {
    fn drop(&mut self) {
        self.heartbeat.abort();
        if self.released {
            return;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(item_key = %self.item, "No runtime to release execution lease, it will expire");
            return;
        };
        let store = Arc::clone(&self.store);
        let item = self.item.clone();
        let execution = self.execution;
        runtime.spawn(async move {
            if let Err(e) = store.release(&item, &execution).await {
                warn!(item_key = %item, error = %e, "Failed to release execution lease");
            }
        });
    }
}

async fn renew_until_aborted(
    store: Arc<dyn IExecutionLease>,
    item: ItemKey,
    execution: ExecutionId,
    ttl: Duration,
) {
    let period = (ttl / 3).max(Duration::from_millis(10));
    let mut timer = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
    loop {
        timer.tick().await;
        match store.renew(&item, &execution, ttl).await {
            Ok(true) => debug!(item_key = %item, "Execution lease renewed"),
            Ok(false) => warn!(item_key = %item, "Execution lease lost before renewal"),
            Err(e) => warn!(item_key = %item, error = %e, "Failed to renew execution lease"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(s: &str) -> ItemKey {
        ItemKey::derive("c", s, "b", "")
    }

    #[test]
    fn test_second_acquire_is_rejected() {
        let registry = InFlightRegistry::new();
        let first = registry.try_acquire(&key("a"), ExecutionId::new());
        assert!(first.is_some());
        assert!(registry.try_acquire(&key("a"), ExecutionId::new()).is_none());
        assert!(registry.is_running(&key("a")));
    }

    #[test]
    fn test_guard_drop_releases() {
        let registry = InFlightRegistry::new();
        let id = ExecutionId::new();
        let guard = registry.try_acquire(&key("a"), id).unwrap();
        assert_eq!(registry.current(&key("a")), Some(id));
        drop(guard);
        assert!(!registry.is_running(&key("a")));
        assert!(registry.try_acquire(&key("a"), ExecutionId::new()).is_some());
    }

    #[test]
    fn test_items_are_independent() {
        let registry = InFlightRegistry::new();
        let _a = registry.try_acquire(&key("a"), ExecutionId::new()).unwrap();
        let _b = registry.try_acquire(&key("b"), ExecutionId::new()).unwrap();
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_clones_share_state() {
        let registry = InFlightRegistry::new();
        let clone = registry.clone();
        let _guard = registry.try_acquire(&key("a"), ExecutionId::new()).unwrap();
        assert!(clone.is_running(&key("a")));
    }
}
