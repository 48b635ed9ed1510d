//! JSON report files
//!
//! Layout: `<root>/<connector>/<remote-folder>/<execution-id>.json`, where
//! `<remote-folder>` is the resolved folder with `/` replaced by `-`.
//! Files are created exclusively, so a report is never rewritten.

use std::path::{Path, PathBuf};

use tokio::io::AsyncWriteExt;
use tracing::debug;
use transfersync_core::domain::ExecutionRecord;
use transfersync_core::ports::IReportSink;

use crate::report::ExecutionReport;
use crate::ReportError;

/// Folder used when the execution failed before its path was resolved
const UNRESOLVED_FOLDER: &str = "unresolved";

/// Writes one pretty-printed [`ExecutionReport`] per execution
#[derive(Debug, Clone)]
pub struct JsonReportSink {
    root: PathBuf,
}

impl JsonReportSink {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Location of the report for `record`
    pub fn report_path(&self, record: &ExecutionRecord) -> PathBuf {
        let folder = record
            .resolved_path()
            .map(|p| p.safe_folder_name())
            .unwrap_or_else(|| UNRESOLVED_FOLDER.to_string());
        self.root
            .join(record.connector())
            .join(folder)
            .join(format!("{}.json", record.id()))
    }

    /// Writes the report, failing if one already exists for this execution
    pub async fn write(&self, record: &ExecutionRecord) -> Result<PathBuf, ReportError> {
        let report = ExecutionReport::from_record(record)?;
        let json = serde_json::to_vec_pretty(&report)?;
        let path = self.report_path(record);

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = match tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
        {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                return Err(ReportError::AlreadyWritten(path.display().to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        file.write_all(&json).await?;
        file.write_all(b"\n").await?;
        file.flush().await?;

        debug!(path = %path.display(), "Report written");
        Ok(path)
    }
}

#[async_trait::async_trait]
impl IReportSink for JsonReportSink {
    async fn emit(&self, record: &ExecutionRecord) -> anyhow::Result<()> {
        self.write(record).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use tempfile::TempDir;
    use transfersync_core::domain::{FailureCause, ItemKey, RemotePath};

    use super::*;

    fn finished(path: Option<&str>) -> ExecutionRecord {
        let mut record = ExecutionRecord::new(
            ItemKey::derive("partner-a", "/out/%year%", "landing", ""),
            "partner-a",
            Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap(),
        );
        match path {
            Some(path) => {
                record.mark_resolved(RemotePath::new(path).unwrap()).unwrap();
                record.mark_listed().unwrap();
                record.record_decisions(&[], &[]).unwrap();
                record.start_dispatch().unwrap();
                record.start_finalizing().unwrap();
                record.complete(true).unwrap();
            }
            None => record.fail(FailureCause::Cancelled).unwrap(),
        }
        record
    }

    #[tokio::test]
    async fn test_report_layout() {
        let dir = TempDir::new().unwrap();
        let sink = JsonReportSink::new(dir.path());
        let record = finished(Some("/out/2024"));

        let path = sink.write(&record).await.unwrap();
        assert_eq!(
            path,
            dir.path()
                .join("partner-a")
                .join("out-2024")
                .join(format!("{}.json", record.id()))
        );

        let written: ExecutionReport =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(written, ExecutionReport::from_record(&record).unwrap());
    }

    #[tokio::test]
    async fn test_unresolved_execution_goes_to_fallback_folder() {
        let dir = TempDir::new().unwrap();
        let sink = JsonReportSink::new(dir.path());
        let record = finished(None);

        let path = sink.write(&record).await.unwrap();
        assert!(path.starts_with(dir.path().join("partner-a").join(UNRESOLVED_FOLDER)));
    }

    #[tokio::test]
    async fn test_report_is_write_once() {
        let dir = TempDir::new().unwrap();
        let sink = JsonReportSink::new(dir.path());
        let record = finished(Some("/out"));

        sink.emit(&record).await.unwrap();
        let err = sink.write(&record).await.unwrap_err();
        assert!(matches!(err, ReportError::AlreadyWritten(_)));
    }

    #[tokio::test]
    async fn test_unfinished_record_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let sink = JsonReportSink::new(dir.path());
        let record = ExecutionRecord::new(
            ItemKey::derive("c", "/in", "b", ""),
            "c",
            Utc::now(),
        );

        assert!(sink.emit(&record).await.is_err());
        assert!(std::fs::read_dir(dir.path()).unwrap().next().is_none());
    }
}
