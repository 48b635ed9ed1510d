//! Watermark domain entity
//!
//! The watermark records, per sync item, the instant of the last execution
//! that completed with zero transfer failures. It only ever moves forward.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::DomainError;

/// Per-item high-water mark for change detection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Watermark {
    last_success_instant: DateTime<Utc>,
    cursor: Option<String>,
}

impl Watermark {
    /// Creates a watermark without a cursor
    pub fn new(last_success_instant: DateTime<Utc>) -> Self {
        Self {
            last_success_instant,
            cursor: None,
        }
    }

    /// Creates a watermark carrying an opaque continuation cursor
    pub fn with_cursor(last_success_instant: DateTime<Utc>, cursor: impl Into<String>) -> Self {
        Self {
            last_success_instant,
            cursor: Some(cursor.into()),
        }
    }

    /// Instant of the last successful execution
    pub fn last_success_instant(&self) -> DateTime<Utc> {
        self.last_success_instant
    }

    /// Opaque continuation cursor, if any
    pub fn cursor(&self) -> Option<&str> {
        self.cursor.as_deref()
    }

    /// Returns the watermark that results from a successful execution at `instant`
    ///
    /// The cursor is carried over. Fails if `instant` is earlier than the
    /// current value; an equal instant is accepted (re-delivered trigger).
    pub fn advanced_to(&self, instant: DateTime<Utc>) -> Result<Watermark, DomainError> {
        if instant < self.last_success_instant {
            return Err(DomainError::WatermarkRegression {
                stored: self.last_success_instant.to_rfc3339(),
                attempted: instant.to_rfc3339(),
            });
        }
        Ok(Watermark {
            last_success_instant: instant,
            cursor: self.cursor.clone(),
        })
    }

    /// Returns true if replacing `self` with `next` would not move time backwards
    pub fn accepts(&self, next: &Watermark) -> bool {
        next.last_success_instant >= self.last_success_instant
    }
}
