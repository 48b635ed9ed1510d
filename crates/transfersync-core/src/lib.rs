//! TransferSync Core - Domain logic and business rules
//!
//! This crate contains the hexagonal architecture core with:
//! - **Domain entities** - `SyncItem`, `RemoteEntry`, `Watermark`, `ExecutionRecord`
//! - **Pure functions** - path template resolution and the skew-tolerant sync decision
//! - **Schedules** - cron presets and six-field cron expressions
//! - **Port definitions** - Traits for adapters: `IDirectoryListing`, `ITransferDispatcher`,
//!   `IWatermarkStore`, `IReportSink`
//! - **Configuration** - YAML connectors and sync settings
//!
//! # Architecture
//!
//! The domain module contains pure business logic with no I/O.
//! Ports define trait interfaces that adapter crates implement.

pub mod config;
pub mod domain;
pub mod ports;
