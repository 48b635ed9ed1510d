//! Skew-tolerant change detection
//!
//! For every listed entry the engine computes
//! `delta = entry.last_modified - watermark.last_success_instant` and decides:
//!
//! - no watermark yet: [`Decision::Transfer`] (first sync copies everything)
//! - `delta > tolerance`: [`Decision::Transfer`]
//! - otherwise: [`Decision::Skip`]
//!
//! The comparison is strict, so an entry exactly on the boundary is skipped.
//! Entries dated in the future follow the same rule.

use chrono::Duration;
use serde::{Deserialize, Serialize};

use super::remote_entry::RemoteEntry;
use super::watermark::Watermark;

/// Outcome of the change-detection rule for one entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    /// The entry must be copied to the target
    Transfer,
    /// The entry is considered already synchronised
    Skip,
}

impl Decision {
    /// Returns true for [`Decision::Transfer`]
    pub fn is_transfer(&self) -> bool {
        matches!(self, Decision::Transfer)
    }
}

impl std::fmt::Display for Decision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Decision::Transfer => write!(f, "transfer"),
            Decision::Skip => write!(f, "skip"),
        }
    }
}

/// Non-negative window absorbing scheduler and clock skew
///
/// Forward-only: files modified up to `tolerance` after the watermark are
/// still treated as seen by the previous run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SkewTolerance(Duration);

impl SkewTolerance {
    /// Strict comparison against the watermark
    pub fn zero() -> Self {
        Self(Duration::zero())
    }

    /// Tolerance of `secs` seconds
    pub fn from_secs(secs: u32) -> Self {
        Self(Duration::seconds(i64::from(secs)))
    }

    /// Tolerance of `mins` minutes
    pub fn from_mins(mins: u32) -> Self {
        Self(Duration::minutes(i64::from(mins)))
    }

    /// The tolerance as a chrono duration
    pub fn as_duration(&self) -> Duration {
        self.0
    }
}

impl Default for SkewTolerance {
    fn default() -> Self {
        Self::zero()
    }
}

/// Decides a single entry
pub fn decide_entry(
    entry: &RemoteEntry,
    watermark: Option<&Watermark>,
    tolerance: SkewTolerance,
) -> Decision {
    let Some(watermark) = watermark else {
        return Decision::Transfer;
    };
    let delta = entry.last_modified() - watermark.last_success_instant();
    if delta > tolerance.as_duration() {
        Decision::Transfer
    } else {
        Decision::Skip
    }
}

/// Decides every entry, preserving input order
pub fn decide(
    entries: &[RemoteEntry],
    watermark: Option<&Watermark>,
    tolerance: SkewTolerance,
) -> Vec<Decision> {
    entries
        .iter()
        .map(|entry| decide_entry(entry, watermark, tolerance))
        .collect()
}
