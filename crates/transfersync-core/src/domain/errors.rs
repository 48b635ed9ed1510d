//! Domain error types
//!
//! This module defines error types specific to domain operations,
//! including validation failures, invalid state transitions, and path errors.

use thiserror::Error;

/// Errors that can occur in domain operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Invalid remote path format or content
    #[error("Invalid remote path: {0}")]
    InvalidRemotePath(String),

    /// Invalid bucket name
    #[error("Invalid bucket name: {0}")]
    InvalidBucketName(String),

    /// Invalid connector name
    #[error("Invalid connector name: {0}")]
    InvalidConnectorName(String),

    /// Invalid item key format
    #[error("Invalid item key: {0}")]
    InvalidItemKey(String),

    /// Invalid schedule or cron expression
    #[error("Invalid schedule: {0}")]
    InvalidSchedule(String),

    /// Invalid state transition attempt
    #[error("Invalid state transition from {from} to {to}")]
    InvalidState {
        /// The current state
        from: String,
        /// The attempted target state
        to: String,
    },

    /// A watermark write would move the instant backwards
    #[error("Watermark regression: stored {stored}, attempted {attempted}")]
    WatermarkRegression {
        /// The currently stored instant (RFC 3339)
        stored: String,
        /// The rejected instant (RFC 3339)
        attempted: String,
    },

    /// Generic validation failure
    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    /// ID parsing error
    #[error("Invalid ID format: {0}")]
    InvalidId(String),
}
