//! SQLite implementation of the watermark store, report sink and history ports
//!
//! ## Type Mapping
//!
//! | Domain Type      | SQL Type | Strategy                                        |
//! |------------------|----------|-------------------------------------------------|
//! | ItemKey          | TEXT     | hex string via `.as_str()` / `ItemKey::new()`   |
//! | ExecutionId      | TEXT     | UUID string via `.to_string()` / `FromStr`      |
//! | DateTime<Utc>    | TEXT     | RFC 3339 via `to_rfc3339()`, plus an INTEGER microsecond column where ordering matters |
//! | ExecutionStatus  | TEXT     | `as_str()` / `FromStr`                          |
//! | ExecutionRecord  | TEXT     | serde_json serialization of the whole record    |
//! | lease expiry     | INTEGER  | microseconds since the epoch                    |

use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use transfersync_core::domain::{
    DomainError, ExecutionId, ExecutionRecord, ItemKey, Watermark,
};
use transfersync_core::ports::{
    ExecutionFilter, IExecutionHistory, IExecutionLease, IReportSink, IWatermarkStore,
};

use crate::CacheError;

/// SQLite-backed persistence for TransferSync state
///
/// One instance can serve as watermark store, execution lease, report sink
/// and history reader at the same time; all operations go through the shared
/// pool.
#[derive(Clone)]
pub struct SqliteStateRepository {
    pool: SqlitePool,
}

impl SqliteStateRepository {
    /// Creates a new repository instance with the given connection pool
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

// ============================================================================
// Helper functions for type conversion
// ============================================================================

/// Parse a DateTime<Utc> from an RFC 3339 string
fn parse_datetime(s: &str) -> Result<DateTime<Utc>, CacheError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            CacheError::SerializationError(format!("Failed to parse datetime '{}': {}", s, e))
        })
}

fn parse_item_key(s: &str) -> Result<ItemKey, CacheError> {
    ItemKey::new(s).map_err(|e| CacheError::SerializationError(e.to_string()))
}

fn watermark_from_row(row: &SqliteRow) -> Result<(ItemKey, Watermark), CacheError> {
    let key: String = row.get("item_key");
    let instant: String = row.get("last_success_instant");
    let cursor: Option<String> = row.get("cursor");

    let instant = parse_datetime(&instant)?;
    let watermark = match cursor {
        Some(cursor) => Watermark::with_cursor(instant, cursor),
        None => Watermark::new(instant),
    };
    Ok((parse_item_key(&key)?, watermark))
}

/// Expiry of a lease claimed or renewed now with `ttl`
fn lease_expiry_micros(now: DateTime<Utc>, ttl: Duration) -> i64 {
    let ttl = i64::try_from(ttl.as_micros()).unwrap_or(i64::MAX);
    now.timestamp_micros().saturating_add(ttl)
}

/// An unexpired execution lease
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveLease {
    pub item_key: ItemKey,
    pub execution_id: ExecutionId,
    pub acquired_at: DateTime<Utc>,
}

fn record_from_row(row: &SqliteRow) -> Result<ExecutionRecord, CacheError> {
    let json: String = row.get("record");
    serde_json::from_str(&json).map_err(|e| {
        CacheError::SerializationError(format!("Failed to deserialize execution record: {}", e))
    })
}

// ============================================================================
// IWatermarkStore
// ============================================================================

#[async_trait::async_trait]
impl IWatermarkStore for SqliteStateRepository {
    async fn get(&self, item: &ItemKey) -> anyhow::Result<Option<Watermark>> {
        let row = sqlx::query(
            "SELECT item_key, last_success_instant, cursor FROM watermarks WHERE item_key = ?",
        )
        .bind(item.as_str())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(ref r) => Ok(Some(watermark_from_row(r)?.1)),
            None => Ok(None),
        }
    }

    async fn put(&self, item: &ItemKey, watermark: &Watermark) -> anyhow::Result<()> {
        let instant = watermark.last_success_instant();

        // The WHERE clause on the upsert keeps the stored value monotonic even
        // when two writers race.
        let result = sqlx::query(
            "INSERT INTO watermarks \
             (item_key, last_success_instant, last_success_micros, cursor, updated_at) \
             VALUES (?, ?, ?, ?, ?) \
             ON CONFLICT(item_key) DO UPDATE SET \
               last_success_instant = excluded.last_success_instant, \
               last_success_micros = excluded.last_success_micros, \
               cursor = excluded.cursor, \
               updated_at = excluded.updated_at \
             WHERE excluded.last_success_micros >= watermarks.last_success_micros",
        )
        .bind(item.as_str())
        .bind(instant.to_rfc3339())
        .bind(instant.timestamp_micros())
        .bind(watermark.cursor())
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            let stored = self
                .get(item)
                .await?
                .map(|w| w.last_success_instant().to_rfc3339())
                .unwrap_or_default();
            let err = DomainError::WatermarkRegression {
                stored,
                attempted: instant.to_rfc3339(),
            };
            return Err(CacheError::Rejected(err.to_string()).into());
        }

        tracing::debug!(
            item_key = %item,
            instant = %instant,
            "Watermark stored"
        );
        Ok(())
    }

    async fn list(&self) -> anyhow::Result<Vec<(ItemKey, Watermark)>> {
        let rows = sqlx::query(
            "SELECT item_key, last_success_instant, cursor FROM watermarks ORDER BY item_key",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut watermarks = Vec::with_capacity(rows.len());
        for row in &rows {
            watermarks.push(watermark_from_row(row)?);
        }
        Ok(watermarks)
    }
}

// ============================================================================
// IExecutionLease
// ============================================================================

#[async_trait::async_trait]
impl IExecutionLease for SqliteStateRepository {
    async fn try_claim(
        &self,
        item: &ItemKey,
        execution: &ExecutionId,
        ttl: Duration,
    ) -> anyhow::Result<bool> {
        let now = Utc::now();

        let expired = sqlx::query(
            "DELETE FROM execution_leases WHERE item_key = ? AND expires_micros <= ?",
        )
        .bind(item.as_str())
        .bind(now.timestamp_micros())
        .execute(&self.pool)
        .await?;
        if expired.rows_affected() > 0 {
            tracing::warn!(item_key = %item, "Took over an expired execution lease");
        }

        // Plain INSERT: a live lease held by anyone else fails on the primary key.
        let result = sqlx::query(
            "INSERT INTO execution_leases (item_key, execution_id, acquired_at, expires_micros) \
             VALUES (?, ?, ?, ?)",
        )
        .bind(item.as_str())
        .bind(execution.to_string())
        .bind(now.to_rfc3339())
        .bind(lease_expiry_micros(now, ttl))
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => {
                tracing::debug!(item_key = %item, execution_id = %execution, "Execution lease claimed");
                Ok(true)
            }
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                tracing::debug!(item_key = %item, "Execution lease held elsewhere");
                Ok(false)
            }
            Err(e) => Err(CacheError::QueryFailed(format!(
                "Failed to claim execution lease: {}",
                e
            ))
            .into()),
        }
    }

    async fn renew(
        &self,
        item: &ItemKey,
        execution: &ExecutionId,
        ttl: Duration,
    ) -> anyhow::Result<bool> {
        let result = sqlx::query(
            "UPDATE execution_leases SET expires_micros = ? \
             WHERE item_key = ? AND execution_id = ?",
        )
        .bind(lease_expiry_micros(Utc::now(), ttl))
        .bind(item.as_str())
        .bind(execution.to_string())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn release(&self, item: &ItemKey, execution: &ExecutionId) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM execution_leases WHERE item_key = ? AND execution_id = ?")
            .bind(item.as_str())
            .bind(execution.to_string())
            .execute(&self.pool)
            .await?;

        tracing::debug!(item_key = %item, execution_id = %execution, "Execution lease released");
        Ok(())
    }
}

// ============================================================================
// IReportSink
// ============================================================================

#[async_trait::async_trait]
impl IReportSink for SqliteStateRepository {
    async fn emit(&self, record: &ExecutionRecord) -> anyhow::Result<()> {
        let summary = record.summary().ok_or_else(|| {
            CacheError::Rejected(format!(
                "execution {} is not finished (state {})",
                record.id(),
                record.state()
            ))
        })?;
        let json = serde_json::to_string(record)
            .map_err(|e| anyhow::anyhow!("Failed to serialize execution record: {}", e))?;

        // Plain INSERT: a second emit for the same id fails on the primary key.
        sqlx::query(
            "INSERT INTO execution_history \
             (id, item_key, connector, trigger_instant, trigger_micros, status, \
              transferred, skipped, failed, failure_kind, record, finished_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(record.id().to_string())
        .bind(record.item_key().as_str())
        .bind(record.connector())
        .bind(record.trigger_instant().to_rfc3339())
        .bind(record.trigger_instant().timestamp_micros())
        .bind(summary.status.as_str())
        .bind(summary.transferred as i64)
        .bind(summary.skipped as i64)
        .bind(summary.failed as i64)
        .bind(record.failure().map(|f| f.kind()))
        .bind(&json)
        .bind(record.finished_at().map(|dt| dt.to_rfc3339()))
        .execute(&self.pool)
        .await
        .map_err(|e| CacheError::QueryFailed(format!("Failed to record execution: {}", e)))?;

        tracing::trace!(execution_id = %record.id(), "Execution recorded");
        Ok(())
    }
}

// ============================================================================
// IExecutionHistory
// ============================================================================

#[async_trait::async_trait]
impl IExecutionHistory for SqliteStateRepository {
    async fn get_execution(&self, id: &ExecutionId) -> anyhow::Result<Option<ExecutionRecord>> {
        let row = sqlx::query("SELECT record FROM execution_history WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(ref r) => Ok(Some(record_from_row(r)?)),
            None => Ok(None),
        }
    }

    async fn query_executions(
        &self,
        filter: &ExecutionFilter,
    ) -> anyhow::Result<Vec<ExecutionRecord>> {
        let mut sql = String::from("SELECT record FROM execution_history WHERE 1=1");
        let mut text_binds: Vec<String> = Vec::new();

        if let Some(ref key) = filter.item_key {
            sql.push_str(" AND item_key = ?");
            text_binds.push(key.as_str().to_string());
        }

        if let Some(status) = filter.status {
            sql.push_str(" AND status = ?");
            text_binds.push(status.as_str().to_string());
        }

        let mut query_since = None;
        if let Some(since) = filter.since {
            sql.push_str(" AND trigger_micros >= ?");
            query_since = Some(since.timestamp_micros());
        }

        sql.push_str(" ORDER BY trigger_micros DESC, finished_at DESC");
        if let Some(limit) = filter.limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }

        let mut query = sqlx::query(&sql);
        for bind in &text_binds {
            query = query.bind(bind);
        }
        if let Some(micros) = query_since {
            query = query.bind(micros);
        }

        let rows = query.fetch_all(&self.pool).await?;

        let mut records = Vec::with_capacity(rows.len());
        for row in &rows {
            records.push(record_from_row(row)?);
        }
        Ok(records)
    }
}

impl SqliteStateRepository {
    /// Counts stored executions per final status
    pub async fn count_by_status(&self) -> Result<Vec<(String, u64)>, CacheError> {
        let rows = sqlx::query(
            "SELECT status, COUNT(*) AS n FROM execution_history GROUP BY status ORDER BY status",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let status: String = row.get("status");
                let n: i64 = row.get("n");
                transfersync_core::domain::ExecutionStatus::from_str(&status)
                    .map_err(|e| CacheError::SerializationError(e.to_string()))?;
                Ok((status, n as u64))
            })
            .collect()
    }

    /// Leases that have not expired, ordered by item key
    pub async fn active_leases(&self) -> Result<Vec<ActiveLease>, CacheError> {
        let rows = sqlx::query(
            "SELECT item_key, execution_id, acquired_at FROM execution_leases \
             WHERE expires_micros > ? ORDER BY item_key",
        )
        .bind(Utc::now().timestamp_micros())
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let key: String = row.get("item_key");
                let id: String = row.get("execution_id");
                let acquired: String = row.get("acquired_at");
                Ok(ActiveLease {
                    item_key: parse_item_key(&key)?,
                    execution_id: ExecutionId::from_str(&id)
                        .map_err(|e| CacheError::SerializationError(e.to_string()))?,
                    acquired_at: parse_datetime(&acquired)?,
                })
            })
            .collect()
    }
}
