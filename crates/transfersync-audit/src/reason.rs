//! Reason codes for execution reports
//!
//! Report consumers match on these codes instead of parsing error messages.

use std::fmt;

use serde::{Deserialize, Serialize};
use transfersync_core::domain::{ExecutionRecord, ExecutionStatus, FailureCause, TransferOutcome};

/// Structured reason codes for failed executions and transfers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasonCode {
    /// The source template did not resolve to a valid remote path
    InvalidSourcePath,
    /// The remote folder could not be listed
    ListingFailed,
    /// The watermark store could not be read or written
    WatermarkStoreFailed,
    /// The execution was cancelled before committing
    Cancelled,
    /// At least one file could not be copied
    TransferFailed,
}

impl ReasonCode {
    /// Code for an execution that ended in `Failed`
    pub fn from_failure(cause: &FailureCause) -> Self {
        match cause {
            FailureCause::Resolution { .. } => ReasonCode::InvalidSourcePath,
            FailureCause::Listing { .. } => ReasonCode::ListingFailed,
            FailureCause::Store { .. } => ReasonCode::WatermarkStoreFailed,
            FailureCause::Cancelled => ReasonCode::Cancelled,
        }
    }

    /// Code for one file, `None` when it was copied
    pub fn from_outcome(outcome: &TransferOutcome) -> Option<Self> {
        outcome.is_failure().then_some(ReasonCode::TransferFailed)
    }

    /// Code explaining a finished record, `None` when it succeeded
    pub fn for_record(record: &ExecutionRecord) -> Option<Self> {
        match record.status()? {
            ExecutionStatus::Succeeded => None,
            ExecutionStatus::PartialFailure => Some(ReasonCode::TransferFailed),
            ExecutionStatus::Failed => record.failure().map(Self::from_failure),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ReasonCode::InvalidSourcePath => "invalid_source_path",
            ReasonCode::ListingFailed => "listing_failed",
            ReasonCode::WatermarkStoreFailed => "watermark_store_failed",
            ReasonCode::Cancelled => "cancelled",
            ReasonCode::TransferFailed => "transfer_failed",
        }
    }
}

impl fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
