//! Execution lease port (driven/secondary port)
//!
//! A lease marks an item as having an execution in flight in a store shared
//! by every process working on the same state (daemon and CLI). It backs up
//! the in-process guard so two processes never run the same item at once.
//!
//! ## Design Notes
//!
//! - Leases expire `ttl` after their last claim or renewal, so a crashed
//!   holder blocks its item for at most one `ttl`.
//! - Holders renew well before expiry while the execution runs.
//! - `release` and `renew` only touch the lease held by `execution`.

use std::time::Duration;

use crate::domain::{ExecutionId, ItemKey};

/// Port trait for cross-process execution leases
#[async_trait::async_trait]
pub trait IExecutionLease: Send + Sync {
    /// Claims `item` for `execution`
    ///
    /// Returns `Ok(false)` if another execution holds an unexpired lease.
    async fn try_claim(
        &self,
        item: &ItemKey,
        execution: &ExecutionId,
        ttl: Duration,
    ) -> anyhow::Result<bool>;

    /// Extends the lease held by `execution`; `Ok(false)` if it no longer holds it
    async fn renew(
        &self,
        item: &ItemKey,
        execution: &ExecutionId,
        ttl: Duration,
    ) -> anyhow::Result<bool>;

    /// Drops the lease held by `execution`, if any
    async fn release(&self, item: &ItemKey, execution: &ExecutionId) -> anyhow::Result<()>;
}
