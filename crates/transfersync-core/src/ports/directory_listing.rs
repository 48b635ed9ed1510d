//! Directory listing port (driven/secondary port)
//!
//! Adapters wrap whatever gives access to the remote endpoint: a mounted
//! remote filesystem, an SFTP client, a managed connector API.

use crate::domain::{RemoteEntry, RemotePath};

/// Port trait for enumerating remote files
///
/// ## Contract
///
/// - Returns only files; directories are descended into when `recursive`
///   is set and ignored otherwise.
/// - Listing has no side effects and may be repeated freely.
/// - Any error is reported by the orchestrator as a listing failure.
#[async_trait::async_trait]
pub trait IDirectoryListing: Send + Sync {
    /// Lists the files under `path`
    async fn list(&self, path: &RemotePath, recursive: bool) -> anyhow::Result<Vec<RemoteEntry>>;
}
