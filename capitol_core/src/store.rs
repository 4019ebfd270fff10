//! The minimal capability set the core requires of any key-value store.
//!
//! Adapters live outside the core (see the integrations crate). The core only
//! guarantees that the fields its canonical records carry satisfy whatever
//! indexes the concrete store maintains.

use crate::validate::CanonicalRecord;
use async_trait::async_trait;

/// Store-level failure tags, consumed by the batch writer's retry logic.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("throughput exceeded")]
    ThroughputExceeded,
    #[error("transient store failure: {0}")]
    Transient(String),
    #[error("store operation timed out")]
    Timeout,
    #[error("conditional check failed")]
    ConditionalCheckFailed,
    #[error("store rejected item: {0}")]
    ValidationRejected(String),
    #[error("store auth failed: {0}")]
    AuthFailed(String),
    #[error("table missing: {0}")]
    TableMissing(String),
}

impl StoreError {
    /// Whether the whole batch should be retried with backoff.
    pub fn retryable(&self) -> bool {
        matches!(
            self,
            StoreError::ThroughputExceeded | StoreError::Transient(_) | StoreError::Timeout
        )
    }

    /// Whether the error is fatal for the entire run.
    pub fn fatal(&self) -> bool {
        matches!(self, StoreError::AuthFailed(_) | StoreError::TableMissing(_))
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TableStatus {
    Exists,
    Missing,
}

/// Outcome of one item inside a batch write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemOutcome {
    pub id: String,
    pub result: Result<(), StoreError>,
}

/// Range predicate for prefix queries against a store index.
#[derive(Debug, Clone, PartialEq)]
pub enum RangePredicate {
    Any,
    BeginsWith(String),
    Between(String, String),
}

#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn describe_table(&self, table: &str) -> Result<TableStatus, StoreError>;

    async fn put_item(&self, record: &CanonicalRecord) -> Result<(), StoreError>;

    /// Write up to one logical batch of records.
    ///
    /// Adapters split the slice into storage-native calls as needed and
    /// report one outcome per input record. A batch-level `Err` means no
    /// per-item information is available (the writer retries or aborts on
    /// the error's class).
    async fn batch_put(&self, records: &[CanonicalRecord])
        -> Result<Vec<ItemOutcome>, StoreError>;

    async fn query_prefix(
        &self,
        index: &str,
        hash: &str,
        range: RangePredicate,
    ) -> Result<Vec<serde_json::Value>, StoreError>;
}
