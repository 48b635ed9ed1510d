//! Execution history port (driven/secondary port)

use chrono::{DateTime, Utc};

use crate::domain::{ExecutionId, ExecutionRecord, ExecutionStatus, ItemKey};

/// Filter criteria for querying past executions
///
/// All fields are optional; unset fields do not filter. Results are ordered
/// newest first.
#[derive(Debug, Clone, Default)]
pub struct ExecutionFilter {
    pub item_key: Option<ItemKey>,
    pub status: Option<ExecutionStatus>,
    pub since: Option<DateTime<Utc>>,
    pub limit: Option<u32>,
}

impl ExecutionFilter {
    /// Creates a new empty filter (matches all executions)
    pub fn new() -> Self {
        Self::default()
    }

    /// Restricts results to one item
    pub fn with_item_key(mut self, item_key: ItemKey) -> Self {
        self.item_key = Some(item_key);
        self
    }

    /// Restricts results to one final status
    pub fn with_status(mut self, status: ExecutionStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Only executions triggered at or after `since`
    pub fn with_since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }

    /// Caps the number of returned records
    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Port trait for reading back finished executions
#[async_trait::async_trait]
pub trait IExecutionHistory: Send + Sync {
    /// Returns one record by id
    async fn get_execution(&self, id: &ExecutionId) -> anyhow::Result<Option<ExecutionRecord>>;

    /// Returns records matching `filter`, newest first
    async fn query_executions(&self, filter: &ExecutionFilter)
        -> anyhow::Result<Vec<ExecutionRecord>>;
}
