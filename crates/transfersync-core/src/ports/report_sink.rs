//! Report sink port (driven/secondary port)

use crate::domain::ExecutionRecord;

/// Port trait receiving the summary of each finished execution
///
/// The orchestrator emits exactly once per execution, after the record is
/// terminal. A sink error is logged by the caller and never changes the
/// execution outcome.
#[async_trait::async_trait]
pub trait IReportSink: Send + Sync {
    /// Publishes a finished execution record
    async fn emit(&self, record: &ExecutionRecord) -> anyhow::Result<()>;
}
