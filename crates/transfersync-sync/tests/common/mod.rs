//! In-memory port implementations shared by the sync integration tests

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use tokio::sync::{Barrier, Notify, Semaphore};

use transfersync_core::domain::{
    BucketName, ConnectorName, ExecutionId, ExecutionRecord, ItemKey, KeyPrefix, RemoteEntry, RemotePath,
    Schedule, SkewTolerance, SyncItem, TargetLocation, TargetSpec, Watermark,
};
use transfersync_core::ports::{
    IDirectoryListing, IExecutionLease, IReportSink, ITransferDispatcher, IWatermarkStore,
};
use transfersync_sync::orchestrator::ExecutionOrchestrator;

// ============================================================================
// Listing
// ============================================================================

/// Serves a fixed set of entries; a request returns those under the path
#[derive(Default)]
pub struct FakeListing {
    entries: Mutex<Vec<RemoteEntry>>,
    error: Mutex<Option<String>>,
    requests: Mutex<Vec<(String, bool)>>,
}

impl FakeListing {
    pub fn set_entries(&self, entries: Vec<RemoteEntry>) {
        *self.entries.lock().unwrap() = entries;
    }

    pub fn fail_with(&self, message: &str) {
        *self.error.lock().unwrap() = Some(message.to_string());
    }

    pub fn requests(&self) -> Vec<(String, bool)> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl IDirectoryListing for FakeListing {
    async fn list(&self, path: &RemotePath, recursive: bool) -> anyhow::Result<Vec<RemoteEntry>> {
        self.requests
            .lock()
            .unwrap()
            .push((path.as_str().to_string(), recursive));
        if let Some(message) = self.error.lock().unwrap().clone() {
            anyhow::bail!(message);
        }
        Ok(self
            .entries
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.path().relative_to(path).is_some())
            .cloned()
            .collect())
    }
}

// ============================================================================
// Dispatcher
// ============================================================================

/// Records every transfer; selected source paths fail
#[derive(Default)]
pub struct FakeDispatcher {
    failing: Mutex<HashSet<String>>,
    calls: Mutex<Vec<(String, String)>>,
    /// Signalled when a transfer starts
    pub started: Arc<Notify>,
    /// When set, every transfer waits until the gate is closed by `release`
    gate: Mutex<Option<Arc<Semaphore>>>,
    /// When set, every transfer waits on the barrier before finishing
    barrier: Mutex<Option<Arc<Barrier>>>,
    active: AtomicUsize,
    peak: AtomicUsize,
}

impl FakeDispatcher {
    pub fn fail_path(&self, path: &str) {
        self.failing.lock().unwrap().insert(path.to_string());
    }

    pub fn clear_failures(&self) {
        self.failing.lock().unwrap().clear();
    }

    pub fn hold(&self) {
        *self.gate.lock().unwrap() = Some(Arc::new(Semaphore::new(0)));
    }

    pub fn release(&self) {
        if let Some(gate) = self.gate.lock().unwrap().take() {
            gate.close();
        }
    }

    pub fn rendezvous(&self, parties: usize) {
        *self.barrier.lock().unwrap() = Some(Arc::new(Barrier::new(parties)));
    }

    /// (source path, target key) per transfer, in call order
    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }

    /// Highest number of transfers observed running at once
    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn transferred_paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.calls().into_iter().map(|(p, _)| p).collect();
        paths.sort();
        paths
    }
}

#[async_trait::async_trait]
impl ITransferDispatcher for FakeDispatcher {
    async fn transfer(&self, entry: &RemoteEntry, target: &TargetLocation) -> anyhow::Result<()> {
        self.calls
            .lock()
            .unwrap()
            .push((entry.path().as_str().to_string(), target.key.clone()));
        self.started.notify_one();

        let running = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(running, Ordering::SeqCst);
        for _ in 0..3 {
            tokio::task::yield_now().await;
        }
        self.active.fetch_sub(1, Ordering::SeqCst);

        let gate = self.gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            // Closing the semaphore wakes every waiter at once.
            let _ = gate.acquire().await;
        }
        let barrier = self.barrier.lock().unwrap().clone();
        if let Some(barrier) = barrier {
            barrier.wait().await;
        }

        if self.failing.lock().unwrap().contains(entry.path().as_str()) {
            anyhow::bail!("connection reset while copying {}", entry.path());
        }
        Ok(())
    }
}

// ============================================================================
// Watermark store
// ============================================================================

/// Monotonic in-memory watermark store with switchable failures
#[derive(Default)]
pub struct MemoryWatermarkStore {
    watermarks: Mutex<HashMap<ItemKey, Watermark>>,
    pub fail_get: AtomicBool,
    pub fail_put: AtomicBool,
    puts: AtomicUsize,
}

impl MemoryWatermarkStore {
    pub fn seed(&self, key: &ItemKey, watermark: Watermark) {
        self.watermarks
            .lock()
            .unwrap()
            .insert(key.clone(), watermark);
    }

    pub fn current(&self, key: &ItemKey) -> Option<Watermark> {
        self.watermarks.lock().unwrap().get(key).cloned()
    }

    pub fn put_count(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl IWatermarkStore for MemoryWatermarkStore {
    async fn get(&self, item: &ItemKey) -> anyhow::Result<Option<Watermark>> {
        if self.fail_get.load(Ordering::SeqCst) {
            anyhow::bail!("database is locked");
        }
        Ok(self.current(item))
    }

    async fn put(&self, item: &ItemKey, watermark: &Watermark) -> anyhow::Result<()> {
        if self.fail_put.load(Ordering::SeqCst) {
            anyhow::bail!("disk I/O error");
        }
        let mut watermarks = self.watermarks.lock().unwrap();
        if let Some(stored) = watermarks.get(item) {
            if !stored.accepts(watermark) {
                anyhow::bail!("watermark regression");
            }
        }
        watermarks.insert(item.clone(), watermark.clone());
        self.puts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn list(&self) -> anyhow::Result<Vec<(ItemKey, Watermark)>> {
        Ok(self
            .watermarks
            .lock()
            .unwrap()
            .iter()
            .map(|(k, w)| (k.clone(), w.clone()))
            .collect())
    }
}

// ============================================================================
// Execution lease
// ============================================================================

/// Lease store shared "with another process": tests can hold items directly
#[derive(Default)]
pub struct MemoryLease {
    held: Mutex<HashMap<ItemKey, ExecutionId>>,
    pub fail: AtomicBool,
    claims: AtomicUsize,
    renewals: AtomicUsize,
}

impl MemoryLease {
    /// Holds `key` for an execution nobody in this process runs
    pub fn hold_elsewhere(&self, key: &ItemKey) {
        self.held
            .lock()
            .unwrap()
            .insert(key.clone(), ExecutionId::new());
    }

    pub fn holder(&self, key: &ItemKey) -> Option<ExecutionId> {
        self.held.lock().unwrap().get(key).copied()
    }

    pub fn claim_count(&self) -> usize {
        self.claims.load(Ordering::SeqCst)
    }

    pub fn renewal_count(&self) -> usize {
        self.renewals.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl IExecutionLease for MemoryLease {
    async fn try_claim(
        &self,
        item: &ItemKey,
        execution: &ExecutionId,
        _ttl: Duration,
    ) -> anyhow::Result<bool> {
        if self.fail.load(Ordering::SeqCst) {
            anyhow::bail!("database is locked");
        }
        self.claims.fetch_add(1, Ordering::SeqCst);
        let mut held = self.held.lock().unwrap();
        if held.contains_key(item) {
            return Ok(false);
        }
        held.insert(item.clone(), *execution);
        Ok(true)
    }

    async fn renew(
        &self,
        item: &ItemKey,
        execution: &ExecutionId,
        _ttl: Duration,
    ) -> anyhow::Result<bool> {
        self.renewals.fetch_add(1, Ordering::SeqCst);
        Ok(self.holder(item) == Some(*execution))
    }

    async fn release(&self, item: &ItemKey, execution: &ExecutionId) -> anyhow::Result<()> {
        let mut held = self.held.lock().unwrap();
        if held.get(item) == Some(execution) {
            held.remove(item);
        }
        Ok(())
    }
}

// ============================================================================
// Report sink
// ============================================================================

#[derive(Default)]
pub struct CollectingSink {
    records: Mutex<Vec<ExecutionRecord>>,
    pub fail: AtomicBool,
}

impl CollectingSink {
    pub fn records(&self) -> Vec<ExecutionRecord> {
        self.records.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl IReportSink for CollectingSink {
    async fn emit(&self, record: &ExecutionRecord) -> anyhow::Result<()> {
        self.records.lock().unwrap().push(record.clone());
        if self.fail.load(Ordering::SeqCst) {
            anyhow::bail!("report bucket unreachable");
        }
        Ok(())
    }
}

// ============================================================================
// Harness
// ============================================================================

pub struct Harness {
    pub listing: Arc<FakeListing>,
    pub dispatcher: Arc<FakeDispatcher>,
    pub store: Arc<MemoryWatermarkStore>,
    pub lease: Arc<MemoryLease>,
    pub sink: Arc<CollectingSink>,
    pub orchestrator: Arc<ExecutionOrchestrator>,
}

impl Harness {
    pub fn new(tolerance: SkewTolerance) -> Self {
        Self::build(tolerance, None)
    }

    /// Orchestrator that also claims leases in `self.lease`
    pub fn with_lease(tolerance: SkewTolerance, ttl: Duration) -> Self {
        Self::build(tolerance, Some(ttl))
    }

    fn build(tolerance: SkewTolerance, lease_ttl: Option<Duration>) -> Self {
        let listing = Arc::new(FakeListing::default());
        let dispatcher = Arc::new(FakeDispatcher::default());
        let store = Arc::new(MemoryWatermarkStore::default());
        let lease = Arc::new(MemoryLease::default());
        let sink = Arc::new(CollectingSink::default());
        let mut orchestrator = ExecutionOrchestrator::new(
            listing.clone(),
            dispatcher.clone(),
            store.clone(),
            sink.clone(),
            tolerance,
        );
        if let Some(ttl) = lease_ttl {
            orchestrator = orchestrator.with_lease(lease.clone(), ttl);
        }
        Self {
            listing,
            dispatcher,
            store,
            lease,
            sink,
            orchestrator: Arc::new(orchestrator),
        }
    }
}

pub fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
}

pub fn entry(path: &str, modified: DateTime<Utc>) -> RemoteEntry {
    RemoteEntry::new(RemotePath::new(path).unwrap(), modified, 42)
}

pub fn item(folder: &str) -> SyncItem {
    item_with(folder, false, "")
}

pub fn item_with(folder: &str, recursive: bool, prefix: &str) -> SyncItem {
    SyncItem::new(
        ConnectorName::new("partner-a").unwrap(),
        folder,
        recursive,
        TargetSpec {
            bucket: BucketName::new("landing").unwrap(),
            prefix: KeyPrefix::new(prefix),
            kms_key_id: None,
        },
        Schedule::parse("@hourly").unwrap(),
    )
    .unwrap()
}
