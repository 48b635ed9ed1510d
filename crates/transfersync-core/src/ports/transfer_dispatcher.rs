//! Transfer dispatcher port (driven/secondary port)

use crate::domain::{RemoteEntry, TargetLocation};

/// Port trait for copying one remote file to object storage
///
/// Implementations must overwrite an existing object at the same location,
/// so that re-dispatching a file after a partial failure is harmless.
#[async_trait::async_trait]
pub trait ITransferDispatcher: Send + Sync {
    /// Copies `entry` to `target`
    async fn transfer(&self, entry: &RemoteEntry, target: &TargetLocation) -> anyhow::Result<()>;
}
