//! Domain entities and business logic
//!
//! This module contains the core domain types for TransferSync:
//! - Newtypes for type-safe identifiers and validated values
//! - Sync items, remote entries and watermarks
//! - The execution record and its state machine
//! - Path template resolution and the sync decision rule
//! - Trigger schedules
//! - Domain-specific error types

pub mod decision;
pub mod errors;
pub mod execution;
pub mod newtypes;
pub mod remote_entry;
pub mod schedule;
pub mod sync_item;
pub mod template;
pub mod watermark;

// Re-export commonly used types
pub use decision::{decide, decide_entry, Decision, SkewTolerance};
pub use errors::DomainError;
pub use execution::{
    EntryRecord, ExecutionRecord, ExecutionState, ExecutionStatus, ExecutionSummary, FailureCause,
    TransferOutcome,
};
pub use newtypes::*;
pub use remote_entry::RemoteEntry;
pub use schedule::Schedule;
pub use sync_item::{SyncItem, TargetLocation, TargetSpec};
pub use template::resolve;
pub use watermark::Watermark;
