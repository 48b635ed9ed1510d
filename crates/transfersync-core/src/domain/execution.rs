//! ExecutionRecord domain entity and its state machine
//!
//! One record is created per firing of one sync item. The record walks the
//! states below and, once terminal, never changes again:
//!
//! ```text
//! Triggered -> Resolved -> Listed -> Decided -> Dispatching -> Finalizing
//!                                                                 |
//!                                          Succeeded | PartialFailure | Failed
//! ```
//!
//! Every non-terminal state may also move directly to `Failed`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::decision::Decision;
use super::errors::DomainError;
use super::newtypes::{ExecutionId, ItemKey, RemotePath};
use super::remote_entry::RemoteEntry;

// ============================================================================
// ExecutionState
// ============================================================================

/// Lifecycle state of one execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionState {
    /// Trigger received, nothing done yet
    Triggered,
    /// Source template resolved to a concrete remote path
    Resolved,
    /// Remote listing obtained
    Listed,
    /// Every entry has a transfer/skip decision
    Decided,
    /// Transfers in progress
    Dispatching,
    /// Deciding whether to commit the watermark
    Finalizing,
    /// All transfers done and watermark advanced
    Succeeded,
    /// At least one transfer failed; watermark untouched
    PartialFailure,
    /// Aborted before the commit; watermark untouched
    Failed,
}

impl ExecutionState {
    /// Returns the state name for error messages
    pub fn name(&self) -> &'static str {
        match self {
            ExecutionState::Triggered => "Triggered",
            ExecutionState::Resolved => "Resolved",
            ExecutionState::Listed => "Listed",
            ExecutionState::Decided => "Decided",
            ExecutionState::Dispatching => "Dispatching",
            ExecutionState::Finalizing => "Finalizing",
            ExecutionState::Succeeded => "Succeeded",
            ExecutionState::PartialFailure => "PartialFailure",
            ExecutionState::Failed => "Failed",
        }
    }

    /// Returns true for `Succeeded`, `PartialFailure` and `Failed`
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ExecutionState::Succeeded | ExecutionState::PartialFailure | ExecutionState::Failed
        )
    }

    /// Returns true if the state machine allows moving from `self` to `target`
    pub fn can_transition_to(&self, target: ExecutionState) -> bool {
        use ExecutionState::*;

        if self.is_terminal() {
            return false;
        }
        if target == Failed {
            return true;
        }

        matches!(
            (self, target),
            (Triggered, Resolved)
                | (Resolved, Listed)
                | (Listed, Decided)
                | (Decided, Dispatching)
                | (Dispatching, Finalizing)
                | (Finalizing, Succeeded)
                | (Finalizing, PartialFailure)
        )
    }
}

impl std::fmt::Display for ExecutionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// ExecutionStatus / FailureCause / TransferOutcome
// ============================================================================

/// Final status of a finished execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Succeeded,
    PartialFailure,
    Failed,
}

impl ExecutionStatus {
    /// Stable lowercase name, used in storage and reports
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionStatus::Succeeded => "succeeded",
            ExecutionStatus::PartialFailure => "partial_failure",
            ExecutionStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ExecutionStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "succeeded" => Ok(ExecutionStatus::Succeeded),
            "partial_failure" => Ok(ExecutionStatus::PartialFailure),
            "failed" => Ok(ExecutionStatus::Failed),
            other => Err(DomainError::ValidationFailed(format!(
                "unknown execution status: {other}"
            ))),
        }
    }
}

/// Why an execution ended in `Failed`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureCause {
    /// The resolved source path was not a valid remote path
    Resolution { message: String },
    /// The directory listing could not be obtained
    Listing { message: String },
    /// The watermark could not be read or written
    Store { message: String },
    /// Cancellation was observed before the watermark commit
    Cancelled,
}

impl FailureCause {
    /// Short category name
    pub fn kind(&self) -> &'static str {
        match self {
            FailureCause::Resolution { .. } => "resolution",
            FailureCause::Listing { .. } => "listing",
            FailureCause::Store { .. } => "store",
            FailureCause::Cancelled => "cancelled",
        }
    }

    /// Human-readable detail, if any
    pub fn message(&self) -> Option<&str> {
        match self {
            FailureCause::Resolution { message }
            | FailureCause::Listing { message }
            | FailureCause::Store { message } => Some(message),
            FailureCause::Cancelled => None,
        }
    }
}

impl std::fmt::Display for FailureCause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.message() {
            Some(message) => write!(f, "{} error: {}", self.kind(), message),
            None => write!(f, "{}", self.kind()),
        }
    }
}

/// Result of dispatching one file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum TransferOutcome {
    Transferred,
    Failed { message: String },
}

impl TransferOutcome {
    /// Returns true if the transfer failed
    pub fn is_failure(&self) -> bool {
        matches!(self, TransferOutcome::Failed { .. })
    }
}

// ============================================================================
// EntryRecord
// ============================================================================

/// Decision and outcome recorded for one listed entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryRecord {
    pub path: RemotePath,
    pub last_modified: DateTime<Utc>,
    pub size_bytes: u64,
    pub decision: Decision,
    /// Object key the entry was (or would have been) written to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome: Option<TransferOutcome>,
}

impl EntryRecord {
    fn from_entry(entry: &RemoteEntry, decision: Decision) -> Self {
        Self {
            path: entry.path().clone(),
            last_modified: entry.last_modified(),
            size_bytes: entry.size_bytes(),
            decision,
            target_key: None,
            outcome: None,
        }
    }
}

// ============================================================================
// ExecutionSummary
// ============================================================================

/// Counts emitted to report sinks for a finished execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionSummary {
    pub status: ExecutionStatus,
    pub transferred: u64,
    pub skipped: u64,
    pub failed: u64,
}

// ============================================================================
// ExecutionRecord
// ============================================================================

/// History of one execution of one sync item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    id: ExecutionId,
    item_key: ItemKey,
    connector: String,
    trigger_instant: DateTime<Utc>,
    state: ExecutionState,
    resolved_path: Option<RemotePath>,
    entries: Vec<EntryRecord>,
    failure: Option<FailureCause>,
    watermark_advanced: bool,
    started_at: DateTime<Utc>,
    finished_at: Option<DateTime<Utc>>,
}

impl ExecutionRecord {
    /// Creates a record in the `Triggered` state
    pub fn new(item_key: ItemKey, connector: impl Into<String>, trigger_instant: DateTime<Utc>) -> Self {
        Self {
            id: ExecutionId::new(),
            item_key,
            connector: connector.into(),
            trigger_instant,
            state: ExecutionState::Triggered,
            resolved_path: None,
            entries: Vec::new(),
            failure: None,
            watermark_advanced: false,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    // --- accessors ---

    pub fn id(&self) -> &ExecutionId {
        &self.id
    }

    pub fn item_key(&self) -> &ItemKey {
        &self.item_key
    }

    /// Name of the connector owning the item
    pub fn connector(&self) -> &str {
        &self.connector
    }

    pub fn trigger_instant(&self) -> DateTime<Utc> {
        self.trigger_instant
    }

    pub fn state(&self) -> ExecutionState {
        self.state
    }

    pub fn resolved_path(&self) -> Option<&RemotePath> {
        self.resolved_path.as_ref()
    }

    pub fn entries(&self) -> &[EntryRecord] {
        &self.entries
    }

    pub fn failure(&self) -> Option<&FailureCause> {
        self.failure.as_ref()
    }

    /// Returns true if this execution committed a new watermark
    pub fn watermark_advanced(&self) -> bool {
        self.watermark_advanced
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.finished_at
    }

    /// Final status, available once the record is terminal
    pub fn status(&self) -> Option<ExecutionStatus> {
        match self.state {
            ExecutionState::Succeeded => Some(ExecutionStatus::Succeeded),
            ExecutionState::PartialFailure => Some(ExecutionStatus::PartialFailure),
            ExecutionState::Failed => Some(ExecutionStatus::Failed),
            _ => None,
        }
    }

    // --- counts ---

    /// Entries decided as transfer that completed successfully
    pub fn transferred_count(&self) -> u64 {
        self.entries
            .iter()
            .filter(|e| matches!(e.outcome, Some(TransferOutcome::Transferred)))
            .count() as u64
    }

    /// Entries decided as skip
    pub fn skipped_count(&self) -> u64 {
        self.entries
            .iter()
            .filter(|e| e.decision == Decision::Skip)
            .count() as u64
    }

    /// Entries whose transfer failed
    pub fn failed_count(&self) -> u64 {
        self.entries
            .iter()
            .filter(|e| e.outcome.as_ref().is_some_and(TransferOutcome::is_failure))
            .count() as u64
    }

    /// Summary counts; `None` until the execution is finished
    pub fn summary(&self) -> Option<ExecutionSummary> {
        Some(ExecutionSummary {
            status: self.status()?,
            transferred: self.transferred_count(),
            skipped: self.skipped_count(),
            failed: self.failed_count(),
        })
    }

    // --- transitions ---

    /// Moves to `target`, rejecting transitions the state machine forbids
    pub fn transition_to(&mut self, target: ExecutionState) -> Result<(), DomainError> {
        if !self.state.can_transition_to(target) {
            return Err(DomainError::InvalidState {
                from: self.state.name().to_string(),
                to: target.name().to_string(),
            });
        }
        self.state = target;
        if target.is_terminal() {
            self.finished_at = Some(Utc::now());
        }
        Ok(())
    }

    /// `Triggered -> Resolved`
    pub fn mark_resolved(&mut self, path: RemotePath) -> Result<(), DomainError> {
        self.transition_to(ExecutionState::Resolved)?;
        self.resolved_path = Some(path);
        Ok(())
    }

    /// `Resolved -> Listed`
    pub fn mark_listed(&mut self) -> Result<(), DomainError> {
        self.transition_to(ExecutionState::Listed)
    }

    /// `Listed -> Decided`, recording one decision per entry
    pub fn record_decisions(
        &mut self,
        entries: &[RemoteEntry],
        decisions: &[Decision],
    ) -> Result<(), DomainError> {
        if entries.len() != decisions.len() {
            return Err(DomainError::ValidationFailed(format!(
                "{} entries but {} decisions",
                entries.len(),
                decisions.len()
            )));
        }
        self.transition_to(ExecutionState::Decided)?;
        self.entries = entries
            .iter()
            .zip(decisions)
            .map(|(entry, decision)| EntryRecord::from_entry(entry, *decision))
            .collect();
        Ok(())
    }

    /// `Decided -> Dispatching`
    pub fn start_dispatch(&mut self) -> Result<(), DomainError> {
        self.transition_to(ExecutionState::Dispatching)
    }

    /// Records the target key and outcome for the entry at `index`
    pub fn record_outcome(
        &mut self,
        index: usize,
        target_key: impl Into<String>,
        outcome: TransferOutcome,
    ) -> Result<(), DomainError> {
        if self.state != ExecutionState::Dispatching {
            return Err(DomainError::InvalidState {
                from: self.state.name().to_string(),
                to: "record outcome".to_string(),
            });
        }
        let entry = self.entries.get_mut(index).ok_or_else(|| {
            DomainError::ValidationFailed(format!("no entry at index {index}"))
        })?;
        if !entry.decision.is_transfer() {
            return Err(DomainError::ValidationFailed(format!(
                "entry {} was not decided for transfer",
                entry.path
            )));
        }
        if entry.outcome.is_some() {
            return Err(DomainError::ValidationFailed(format!(
                "outcome for {} already recorded",
                entry.path
            )));
        }
        entry.target_key = Some(target_key.into());
        entry.outcome = Some(outcome);
        Ok(())
    }

    /// `Dispatching -> Finalizing`
    pub fn start_finalizing(&mut self) -> Result<(), DomainError> {
        self.transition_to(ExecutionState::Finalizing)
    }

    /// Returns true if the watermark may be committed: zero failed transfers
    pub fn may_commit_watermark(&self) -> bool {
        self.state == ExecutionState::Finalizing && self.failed_count() == 0
    }

    /// `Finalizing -> Succeeded | PartialFailure`
    ///
    /// `watermark_advanced` reports whether the commit took place.
    pub fn complete(&mut self, watermark_advanced: bool) -> Result<ExecutionStatus, DomainError> {
        let target = if self.failed_count() == 0 {
            ExecutionState::Succeeded
        } else {
            ExecutionState::PartialFailure
        };
        self.transition_to(target)?;
        self.watermark_advanced = watermark_advanced;
        Ok(if target == ExecutionState::Succeeded {
            ExecutionStatus::Succeeded
        } else {
            ExecutionStatus::PartialFailure
        })
    }

    /// Any non-terminal state `-> Failed`
    pub fn fail(&mut self, cause: FailureCause) -> Result<(), DomainError> {
        self.transition_to(ExecutionState::Failed)?;
        self.failure = Some(cause);
        Ok(())
    }
}
