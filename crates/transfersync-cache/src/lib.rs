//! TransferSync Cache - Local state persistence
//!
//! SQLite-based storage for:
//! - Per-item watermarks (monotonic, durable across restarts)
//! - Execution history (one immutable row per finished execution)
//! - Execution leases (one live claim per item, shared across processes)
//!
//! ## Architecture
//!
//! This crate implements the `IWatermarkStore`, `IExecutionLease`,
//! `IReportSink` and `IExecutionHistory` ports from `transfersync-core`
//! using SQLite as the storage backend. It is a driven (secondary) adapter
//! in the hexagonal architecture.
//!
//! ## Usage
//!
//! ```no_run
//! use std::path::Path;
//! use transfersync_cache::{DatabasePool, SqliteStateRepository};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let pool = DatabasePool::new(Path::new("/var/lib/transfersync/state.db")).await?;
//! let repo = SqliteStateRepository::new(pool.pool().clone());
//! // Use repo as IWatermarkStore / IReportSink...
//! # Ok(())
//! # }
//! ```

pub mod pool;
pub mod repository;

pub use pool::DatabasePool;
pub use repository::{ActiveLease, SqliteStateRepository};

/// Errors that can occur during cache operations
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// Failed to establish a database connection
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// A database query failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Schema migration failed
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// Serialization or deserialization of domain types failed
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// A write was refused because it would break a stored invariant
    #[error("Rejected write: {0}")]
    Rejected(String),
}

impl From<sqlx::Error> for CacheError {
    fn from(e: sqlx::Error) -> Self {
        CacheError::QueryFailed(e.to_string())
    }
}
