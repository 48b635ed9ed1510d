//! Schedule registry
//!
//! Maps every sync item to its schedule, the orchestrator that runs it, and
//! the next instant it is due. The registry is a plain mapping: deciding
//! *when* to look at it belongs to the [`SyncScheduler`](crate::scheduler::SyncScheduler).

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use transfersync_core::domain::{ItemKey, SyncItem};

use crate::orchestrator::ExecutionOrchestrator;

/// "Item X triggered at instant T"
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trigger {
    pub item_key: ItemKey,
    pub instant: DateTime<Utc>,
}

impl Trigger {
    pub fn new(item_key: ItemKey, instant: DateTime<Utc>) -> Self {
        Self { item_key, instant }
    }
}

/// A registered item together with its runtime bookkeeping
#[derive(Clone)]
pub struct RegisteredItem {
    pub item: SyncItem,
    pub orchestrator: Arc<ExecutionOrchestrator>,
    next_firing: Option<DateTime<Utc>>,
}

impl RegisteredItem {
    /// Next instant the item is due, `None` once its schedule is exhausted
    pub fn next_firing(&self) -> Option<DateTime<Utc>> {
        self.next_firing
    }
}

/// Item key → schedule, orchestrator and next firing
#[derive(Default, Clone)]
pub struct ScheduleRegistry {
    entries: BTreeMap<ItemKey, RegisteredItem>,
}

impl ScheduleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `item`; its first firing is the first schedule match after `now`
    ///
    /// Re-registering an existing key replaces the previous entry.
    pub fn register(
        &mut self,
        item: SyncItem,
        orchestrator: Arc<ExecutionOrchestrator>,
        now: DateTime<Utc>,
    ) {
        let next_firing = item.schedule().next_after(now);
        info!(
            item_key = %item.key(),
            schedule = %item.schedule(),
            next = ?next_firing,
            "Registered sync item"
        );
        self.entries.insert(
            item.key().clone(),
            RegisteredItem {
                item,
                orchestrator,
                next_firing,
            },
        );
    }

    /// Removes an item; returns true if it was registered
    pub fn unregister(&mut self, key: &ItemKey) -> bool {
        self.entries.remove(key).is_some()
    }

    pub fn get(&self, key: &ItemKey) -> Option<&RegisteredItem> {
        self.entries.get(key)
    }

    /// Finds an item by full key or unambiguous key prefix
    pub fn find(&self, key_or_prefix: &str) -> Option<&RegisteredItem> {
        let mut matches = self
            .entries
            .iter()
            .filter(|(key, _)| key.as_str().starts_with(key_or_prefix));
        match (matches.next(), matches.next()) {
            (Some((_, entry)), None) => Some(entry),
            _ => None,
        }
    }

    /// Registered items, ordered by key
    pub fn items(&self) -> impl Iterator<Item = &RegisteredItem> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Collects every item due at `now` and advances its next firing
    ///
    /// The trigger instant is the nominal firing time, not `now`, so late
    /// ticks do not shift watermarks. When several firings were missed
    /// only the latest one is delivered.
    pub fn due(&mut self, now: DateTime<Utc>) -> Vec<Trigger> {
        let mut triggers = Vec::new();
        for (key, entry) in self.entries.iter_mut() {
            let Some(next) = entry.next_firing else {
                continue;
            };
            if next > now {
                continue;
            }

            let schedule = entry.item.schedule();
            // Latest firing at or before `now`
            let latest = schedule
                .previous_before(now + chrono::Duration::nanoseconds(1))
                .filter(|latest| *latest >= next)
                .unwrap_or(next);
            if latest > next {
                warn!(
                    item_key = %key,
                    missed_from = %next,
                    delivering = %latest,
                    "Missed firings collapsed into one trigger"
                );
            }

            entry.next_firing = schedule.next_after(latest);
            debug!(item_key = %key, instant = %latest, next = ?entry.next_firing, "Item due");
            triggers.push(Trigger::new(key.clone(), latest));
        }
        triggers
    }

    /// Earliest pending firing across all items
    pub fn next_due(&self) -> Option<DateTime<Utc>> {
        self.entries.values().filter_map(|e| e.next_firing).min()
    }
}
