//! Deduplicating batch writer.
//!
//! Suppresses same-run duplicates through the processed-ID set, groups
//! survivors into logical batches and issues them with per-item accounting
//! and bounded, jittered retries. The in-memory set is authoritative for the
//! run; the writer never reads the store to detect duplicates.

use crate::config::RateLimitConfig;
use crate::store::{RecordStore, StoreError};
use crate::validate::CanonicalRecord;
use crate::{Error, Result};
use rand::Rng;
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::Mutex;
use tokio_util::sync::CancellationToken;

/// In-session registry of ids already offered to the store.
///
/// Holds identifiers only. The memory bound is advisory: crossing it forces a
/// reset with a warning rather than failing the run.
pub struct ProcessedIdSet {
    inner: Mutex<Inner>,
    threshold_bytes: usize,
}

struct Inner {
    ids: HashSet<String>,
    approx_bytes: usize,
}

impl ProcessedIdSet {
    pub fn new(memory_threshold_mb: u64) -> Self {
        Self {
            inner: Mutex::new(Inner {
                ids: HashSet::new(),
                approx_bytes: 0,
            }),
            threshold_bytes: (memory_threshold_mb as usize).saturating_mul(1024 * 1024),
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.inner.lock().expect("dedup set poisoned").ids.contains(id)
    }

    /// Record an id as stored. Returns false if it was already present.
    pub fn insert(&self, id: &str) -> bool {
        let mut inner = self.inner.lock().expect("dedup set poisoned");
        if !inner.ids.insert(id.to_string()) {
            return false;
        }
        // Identifier bytes plus hash-set bookkeeping, good enough for an
        // advisory bound.
        inner.approx_bytes += id.len() + 48;
        if self.threshold_bytes > 0 && inner.approx_bytes > self.threshold_bytes {
            let dropped = inner.ids.len();
            inner.ids.clear();
            inner.approx_bytes = 0;
            tracing::warn!(
                dropped,
                threshold_mb = self.threshold_bytes / (1024 * 1024),
                "processed-ID set exceeded memory threshold; forced reset"
            );
        }
        true
    }

    /// Clear the set at a configured boundary. Returns the number dropped.
    pub fn reset(&self) -> usize {
        let mut inner = self.inner.lock().expect("dedup set poisoned");
        let dropped = inner.ids.len();
        inner.ids.clear();
        inner.approx_bytes = 0;
        dropped
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("dedup set poisoned").ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Accumulated result of one `write` call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteOutcome {
    pub stored: u64,
    pub duplicates_skipped: u64,
    pub failed_store: u64,
    pub retries: u64,
    /// Items dropped or failed, with their error tags.
    pub failed: Vec<(String, StoreError)>,
}

pub struct BatchWriter {
    store: Arc<dyn RecordStore>,
    dedup: Arc<ProcessedIdSet>,
    dedup_enabled: bool,
    batch_size: usize,
    max_retries: u32,
    backoff: RateLimitConfig,
}

impl BatchWriter {
    pub fn new(
        store: Arc<dyn RecordStore>,
        dedup: Arc<ProcessedIdSet>,
        dedup_enabled: bool,
        batch_size: usize,
        backoff: RateLimitConfig,
    ) -> Self {
        Self {
            store,
            dedup,
            dedup_enabled,
            batch_size: batch_size.max(1),
            max_retries: backoff.max_retries,
            backoff,
        }
    }

    /// Write a sequence of canonical records.
    ///
    /// Ids already in the processed-ID set, or appearing earlier in the same
    /// call, are skipped. Ids enter the set only once their write succeeded.
    /// Cancellation drops the not-yet-issued remainder and returns what was
    /// accounted so far; fatal store errors abort with a run-level error.
    #[tracing::instrument(level = "debug", skip_all, fields(records = records.len()))]
    pub async fn write(
        &self,
        records: Vec<CanonicalRecord>,
        cancel: &CancellationToken,
    ) -> Result<WriteOutcome> {
        let mut outcome = WriteOutcome::default();

        let mut survivors = Vec::with_capacity(records.len());
        let mut seen_in_call: HashSet<String> = HashSet::new();
        for record in records {
            if self.dedup_enabled
                && (self.dedup.contains(&record.id) || !seen_in_call.insert(record.id.clone()))
            {
                outcome.duplicates_skipped += 1;
                continue;
            }
            survivors.push(record);
        }

        let mut queue = survivors;
        while !queue.is_empty() {
            if cancel.is_cancelled() {
                // Partially-built batches are dropped on cancel.
                return Ok(outcome);
            }
            let rest = queue.split_off(queue.len().min(self.batch_size));
            let batch = std::mem::replace(&mut queue, rest);
            self.write_batch(batch, cancel, &mut outcome).await?;
        }

        Ok(outcome)
    }

    async fn write_batch(
        &self,
        batch: Vec<CanonicalRecord>,
        cancel: &CancellationToken,
        outcome: &mut WriteOutcome,
    ) -> Result<()> {
        let mut pending = batch;
        let mut attempt: u32 = 0;

        loop {
            match self.store.batch_put(&pending).await {
                Ok(item_outcomes) => {
                    let mut retry_items = Vec::new();
                    for (record, item) in pending.into_iter().zip(item_outcomes) {
                        match item.result {
                            Ok(()) => {
                                outcome.stored += 1;
                                if self.dedup_enabled {
                                    self.dedup.insert(&record.id);
                                }
                            }
                            Err(e) if e.fatal() => return Err(fatal_error(e)),
                            Err(e) if e.retryable() => retry_items.push(record),
                            Err(e) => {
                                // Per-item permanent: drop the one item,
                                // record it, continue.
                                tracing::warn!(id = %record.id, error = %e, "item rejected by store");
                                outcome.failed_store += 1;
                                outcome.failed.push((record.id, e));
                            }
                        }
                    }
                    if retry_items.is_empty() {
                        return Ok(());
                    }
                    pending = retry_items;
                    attempt += 1;
                    if attempt > self.max_retries {
                        return self.fail_remaining(pending, StoreError::ThroughputExceeded, outcome);
                    }
                    outcome.retries += 1;
                    if !self.backoff_sleep(attempt - 1, cancel).await {
                        return Ok(());
                    }
                }
                Err(e) if e.fatal() => return Err(fatal_error(e)),
                Err(e) if e.retryable() => {
                    attempt += 1;
                    if attempt > self.max_retries {
                        return self.fail_remaining(pending, e, outcome);
                    }
                    outcome.retries += 1;
                    if !self.backoff_sleep(attempt - 1, cancel).await {
                        return Ok(());
                    }
                }
                Err(e) => {
                    // Permanent batch error: the batch fails whole.
                    return self.fail_remaining(pending, e, outcome);
                }
            }
        }
    }

    fn fail_remaining(
        &self,
        pending: Vec<CanonicalRecord>,
        error: StoreError,
        outcome: &mut WriteOutcome,
    ) -> Result<()> {
        tracing::warn!(
            count = pending.len(),
            error = %error,
            "batch failed without further retries"
        );
        for record in pending {
            outcome.failed_store += 1;
            outcome.failed.push((record.id, error.clone()));
        }
        Ok(())
    }

    /// Jittered exponential backoff; returns false when cancelled mid-sleep.
    async fn backoff_sleep(&self, attempt: u32, cancel: &CancellationToken) -> bool {
        let base = self.backoff.retry_backoff(attempt);
        let jittered = base.mul_f64(rand::thread_rng().gen_range(0.75..1.25));
        tokio::select! {
            _ = cancel.cancelled() => false,
            _ = tokio::time::sleep(jittered) => true,
        }
    }
}

fn fatal_error(e: StoreError) -> Error {
    match e {
        StoreError::AuthFailed(msg) => Error::Unauthorized(msg),
        StoreError::TableMissing(table) => Error::TableMissing(table),
        other => Error::BackendMessage(other.to_string()),
    }
}
