//! ExecutionReporter - fan-out over several report sinks
//!
//! The orchestrator sees a single [`IReportSink`]. The reporter forwards
//! every record to each configured sink in order. Sink errors are logged via
//! `tracing::warn!` and never propagated, so one broken sink neither hides
//! the record from the others nor affects the execution outcome.

use std::sync::Arc;

use tracing::{info, warn};
use transfersync_core::domain::{ExecutionRecord, ExecutionStatus};
use transfersync_core::ports::IReportSink;

use crate::reason::ReasonCode;

/// Forwards each finished execution to every registered sink
#[derive(Default, Clone)]
pub struct ExecutionReporter {
    sinks: Vec<(String, Arc<dyn IReportSink>)>,
}

impl ExecutionReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a sink under a name used in log messages
    pub fn with_sink(mut self, name: impl Into<String>, sink: Arc<dyn IReportSink>) -> Self {
        self.sinks.push((name.into(), sink));
        self
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

#[async_trait::async_trait]
impl IReportSink for ExecutionReporter {
    async fn emit(&self, record: &ExecutionRecord) -> anyhow::Result<()> {
        let reason = ReasonCode::for_record(record);
        match record.status() {
            Some(ExecutionStatus::Succeeded) => info!(
                execution_id = %record.id(),
                item_key = %record.item_key(),
                transferred = record.transferred_count(),
                skipped = record.skipped_count(),
                "Execution report"
            ),
            _ => warn!(
                execution_id = %record.id(),
                item_key = %record.item_key(),
                state = %record.state(),
                reason = reason.map(|r| r.as_str()).unwrap_or("none"),
                failed = record.failed_count(),
                "Execution report"
            ),
        }

        for (name, sink) in &self.sinks {
            if let Err(e) = sink.emit(record).await {
                warn!(sink = %name, execution_id = %record.id(), error = %e, "Report sink failed");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use chrono::Utc;
    use transfersync_core::domain::{FailureCause, ItemKey};

    use super::*;

    #[derive(Default)]
    struct Recording {
        ids: Mutex<Vec<String>>,
        broken: bool,
    }

    #[async_trait::async_trait]
    impl IReportSink for Recording {
        async fn emit(&self, record: &ExecutionRecord) -> anyhow::Result<()> {
            if self.broken {
                anyhow::bail!("sink offline");
            }
            self.ids.lock().unwrap().push(record.id().to_string());
            Ok(())
        }
    }

    fn failed_record() -> ExecutionRecord {
        let mut record = ExecutionRecord::new(ItemKey::derive("c", "/in", "b", ""), "c", Utc::now());
        record.fail(FailureCause::Cancelled).unwrap();
        record
    }

    #[tokio::test]
    async fn test_fan_out_reaches_every_sink() {
        let first = Arc::new(Recording::default());
        let second = Arc::new(Recording::default());
        let reporter = ExecutionReporter::new()
            .with_sink("first", first.clone())
            .with_sink("second", second.clone());
        let record = failed_record();

        reporter.emit(&record).await.unwrap();

        assert_eq!(reporter.len(), 2);
        assert_eq!(*first.ids.lock().unwrap(), vec![record.id().to_string()]);
        assert_eq!(*second.ids.lock().unwrap(), vec![record.id().to_string()]);
    }

    #[tokio::test]
    async fn test_broken_sink_is_swallowed() {
        let broken = Arc::new(Recording {
            broken: true,
            ..Default::default()
        });
        let healthy = Arc::new(Recording::default());
        let reporter = ExecutionReporter::new()
            .with_sink("broken", broken)
            .with_sink("healthy", healthy.clone());

        assert!(reporter.emit(&failed_record()).await.is_ok());
        assert_eq!(healthy.ids.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_empty_reporter_accepts_records() {
        let reporter = ExecutionReporter::new();
        assert!(reporter.is_empty());
        assert!(reporter.emit(&failed_record()).await.is_ok());
    }
}
