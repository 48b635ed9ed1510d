//! TransferSync Sync - execution orchestration and scheduling
//!
//! Provides:
//! - Per-item execution state machine (list, decide, dispatch, commit, report)
//! - At-most-one in-flight execution per item, across processes when a lease
//!   store is wired in
//! - Schedule registry and the trigger loop that drives it
//! - Adapters for mounted remote trees, directory buckets and (feature `s3`) Amazon S3
//!
//! ## Modules
//!
//! - [`orchestrator`] - Runs one execution of one sync item
//! - [`in_flight`] - Guards against overlapping executions of the same item
//! - [`registry`] - Maps items to schedules and orchestrators
//! - [`scheduler`] - Tick loop turning due schedules into executions
//! - [`filesystem`] - Mounted-directory listing and directory dispatcher
//! - [`bootstrap`] - Builds a registry from configuration

pub mod bootstrap;
pub mod filesystem;
pub mod in_flight;
pub mod orchestrator;
pub mod registry;
#[cfg(feature = "s3")]
pub mod s3;
pub mod scheduler;

use std::path::PathBuf;

use thiserror::Error;
use transfersync_core::domain::{DomainError, ItemKey};

/// Errors that can occur during synchronization operations
#[derive(Debug, Error)]
pub enum SyncError {
    /// An I/O error occurred during file operations
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// The specified path does not exist
    #[error("Path not found: {0}")]
    PathNotFound(PathBuf),

    /// The path escapes the directory it must stay in
    #[error("Path escapes its root: {0}")]
    PathEscapesRoot(String),

    /// Another execution of the same item is still running
    #[error("Execution already in flight for item {0}")]
    AlreadyRunning(ItemKey),

    /// No item with this key is registered
    #[error("Unknown item: {0}")]
    UnknownItem(String),

    /// A domain-level error propagated from transfersync-core
    #[error("Domain error: {0}")]
    DomainError(#[from] DomainError),
}
