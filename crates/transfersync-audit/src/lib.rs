//! TransferSync Audit - execution reports
//!
//! Provides:
//! - `ExecutionReporter`: fans each finished execution out to several sinks
//! - `JsonReportSink`: one JSON report file per execution
//! - `ExecutionReport`: the serialized report document
//! - `ReasonCode`: stable codes explaining failed executions and transfers

pub mod json_sink;
pub mod reason;
pub mod report;
pub mod reporter;

pub use json_sink::JsonReportSink;
pub use reason::ReasonCode;
pub use report::{ExecutionReport, FileReport};
pub use reporter::ExecutionReporter;

use thiserror::Error;

/// Errors raised while producing execution reports
#[derive(Debug, Error)]
pub enum ReportError {
    /// The record has not reached a terminal state yet
    #[error("Execution {0} is not finished")]
    Unfinished(String),

    /// A report for this execution was already written
    #[error("Report already exists: {0}")]
    AlreadyWritten(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
