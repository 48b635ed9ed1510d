//! Port definitions (hexagonal architecture interfaces)
//!
//! This module defines the port traits that form the boundaries of the
//! hexagonal architecture. Ports are interfaces that the domain core
//! depends on, but whose implementations live in adapter crates.
//!
//! ## Ports Overview
//!
//! - [`IDirectoryListing`] - Listing files under a resolved remote path
//! - [`ITransferDispatcher`] - Copying one remote file to its target location
//! - [`IWatermarkStore`] - Durable per-item watermarks
//! - [`IExecutionLease`] - Cross-process claim on an item's execution slot
//! - [`IReportSink`] - Receives one summary per finished execution
//! - [`IExecutionHistory`] - Queries over past execution records

pub mod directory_listing;
pub mod execution_lease;
pub mod execution_history;
pub mod report_sink;
pub mod transfer_dispatcher;
pub mod watermark_store;

pub use directory_listing::IDirectoryListing;
pub use execution_lease::IExecutionLease;
pub use execution_history::{ExecutionFilter, IExecutionHistory};
pub use report_sink::IReportSink;
pub use transfer_dispatcher::ITransferDispatcher;
pub use watermark_store::IWatermarkStore;
