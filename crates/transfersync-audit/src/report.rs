//! Report document written for each finished execution

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use transfersync_core::domain::{Decision, ExecutionRecord, ExecutionStatus, TransferOutcome};

use crate::reason::ReasonCode;
use crate::ReportError;

/// Per-file line of a report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileReport {
    pub path: String,
    pub last_modified: DateTime<Utc>,
    pub size_bytes: u64,
    pub decision: Decision,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<ReasonCode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Summary of one execution as published to report consumers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionReport {
    pub execution_id: String,
    pub item_key: String,
    pub connector: String,
    pub trigger_instant: DateTime<Utc>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_folder: Option<String>,
    pub status: ExecutionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<ReasonCode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub watermark_advanced: bool,
    pub transferred: u64,
    pub skipped: u64,
    pub failed: u64,
    pub files: Vec<FileReport>,
}

impl ExecutionReport {
    /// Builds the report of a terminal record
    pub fn from_record(record: &ExecutionRecord) -> Result<Self, ReportError> {
        let summary = record
            .summary()
            .ok_or_else(|| ReportError::Unfinished(record.id().to_string()))?;

        let files = record
            .entries()
            .iter()
            .map(|entry| {
                let (reason, message) = match &entry.outcome {
                    Some(outcome @ TransferOutcome::Failed { message }) => {
                        (ReasonCode::from_outcome(outcome), Some(message.clone()))
                    }
                    _ => (None, None),
                };
                FileReport {
                    path: entry.path.to_string(),
                    last_modified: entry.last_modified,
                    size_bytes: entry.size_bytes,
                    decision: entry.decision,
                    target_key: entry.target_key.clone(),
                    reason,
                    message,
                }
            })
            .collect();

        Ok(Self {
            execution_id: record.id().to_string(),
            item_key: record.item_key().to_string(),
            connector: record.connector().to_string(),
            trigger_instant: record.trigger_instant(),
            started_at: record.started_at(),
            finished_at: record.finished_at(),
            remote_folder: record.resolved_path().map(ToString::to_string),
            status: summary.status,
            reason: ReasonCode::for_record(record),
            error: record
                .failure()
                .and_then(|f| f.message())
                .map(str::to_string),
            watermark_advanced: record.watermark_advanced(),
            transferred: summary.transferred,
            skipped: summary.skipped,
            failed: summary.failed,
            files,
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use transfersync_core::domain::{FailureCause, ItemKey, RemoteEntry, RemotePath};

    use super::*;

    fn trigger() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 6, 0, 0).unwrap()
    }

    #[test]
    fn test_partial_failure_report() {
        let mut record =
            ExecutionRecord::new(ItemKey::derive("c", "/in", "b", ""), "c", trigger());
        record.mark_resolved(RemotePath::new("/in").unwrap()).unwrap();
        record.mark_listed().unwrap();
        let entries = vec![
            RemoteEntry::new(RemotePath::new("/in/a").unwrap(), trigger(), 1),
            RemoteEntry::new(RemotePath::new("/in/b").unwrap(), trigger(), 2),
        ];
        record
            .record_decisions(&entries, &[Decision::Transfer, Decision::Transfer])
            .unwrap();
        record.start_dispatch().unwrap();
        record
            .record_outcome(0, "a", TransferOutcome::Transferred)
            .unwrap();
        record
            .record_outcome(
                1,
                "b",
                TransferOutcome::Failed {
                    message: "broken pipe".into(),
                },
            )
            .unwrap();
        record.start_finalizing().unwrap();
        record.complete(false).unwrap();

        let report = ExecutionReport::from_record(&record).unwrap();
        assert_eq!(report.status, ExecutionStatus::PartialFailure);
        assert_eq!(report.reason, Some(ReasonCode::TransferFailed));
        assert_eq!(report.remote_folder.as_deref(), Some("/in"));
        assert_eq!((report.transferred, report.failed), (1, 1));
        assert_eq!(report.files[0].reason, None);
        assert_eq!(report.files[1].reason, Some(ReasonCode::TransferFailed));
        assert_eq!(report.files[1].message.as_deref(), Some("broken pipe"));
    }

    #[test]
    fn test_failed_report_carries_error() {
        let mut record =
            ExecutionRecord::new(ItemKey::derive("c", "/in", "b", ""), "c", trigger());
        record
            .fail(FailureCause::Listing {
                message: "no route to host".into(),
            })
            .unwrap();

        let report = ExecutionReport::from_record(&record).unwrap();
        assert_eq!(report.status, ExecutionStatus::Failed);
        assert_eq!(report.reason, Some(ReasonCode::ListingFailed));
        assert_eq!(report.error.as_deref(), Some("no route to host"));
        assert!(report.files.is_empty());

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["reason"], "listing_failed");
        assert!(json.get("remote_folder").is_none());
    }

    #[test]
    fn test_unfinished_record_is_rejected() {
        let record = ExecutionRecord::new(ItemKey::derive("c", "/in", "b", ""), "c", trigger());
        assert!(matches!(
            ExecutionReport::from_record(&record),
            Err(ReportError::Unfinished(_))
        ));
    }
}
