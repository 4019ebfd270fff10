//! The run driver: the single entry point of the ingestion core.
//!
//! A run partitions its date window into (family, sub-window) work items,
//! drives them through a fixed worker set and aggregates the outcome into a
//! structured report. All shared state (governor, processed-ID set, metrics)
//! is run-scoped and handed to workers explicitly.

mod worker;

use crate::config::IngestConfig;
use crate::governor::RateGovernor;
use crate::models::{DateWindow, Family, RunMode, RunRequest, TerminalState};
use crate::report::{RunMetrics, RunReport};
use crate::store::{RecordStore, StoreError, TableStatus};
use crate::traversal::ApiClient;
use crate::validate::Validator;
use crate::writer::{BatchWriter, ProcessedIdSet};
use crate::{Error, Result};
use chrono::Utc;
use std::collections::VecDeque;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// One (family, sub-window) unit of work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    pub family: Family,
    pub window: DateWindow,
}

pub(crate) struct RunContext {
    pub config: IngestConfig,
    pub client: Arc<dyn ApiClient>,
    pub governor: Arc<RateGovernor>,
    pub validator: Validator,
    pub writer: Arc<BatchWriter>,
    pub dedup: Arc<ProcessedIdSet>,
    pub metrics: Arc<RunMetrics>,
    pub queue: Mutex<VecDeque<WorkItem>>,
    /// Child of the caller's token; also cancelled on a fatal error so the
    /// other workers stand down.
    pub run_token: CancellationToken,
    pub fatal: Mutex<Option<Error>>,
    pub any_partial: AtomicBool,
}

pub struct RunDriver {
    config: IngestConfig,
    client: Arc<dyn ApiClient>,
    store: Arc<dyn RecordStore>,
}

impl RunDriver {
    pub fn new(
        config: IngestConfig,
        client: Arc<dyn ApiClient>,
        store: Arc<dyn RecordStore>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            client,
            store,
        })
    }

    /// Execute one run to completion, cancellation or fatal error.
    ///
    /// Item-level failures are recorded and never abort the run; run-level
    /// failures (auth, missing table, invalid request) return `Err`
    /// immediately. Cancellation ends the run with its current counters and
    /// a `cancelled` terminal state.
    #[tracing::instrument(level = "info", skip(self, cancel), fields(mode = ?request.mode))]
    pub async fn execute(
        &self,
        request: RunRequest,
        cancel: CancellationToken,
    ) -> Result<RunReport> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        request.validate()?;

        self.preflight().await?;

        let window = self.resolve_window(&request);
        let items = self.partition(&request, window);
        tracing::info!(
            run_id = %run_id,
            from = %window.from,
            to = %window.to,
            work_items = items.len(),
            "run starting"
        );

        let dedup_cfg = &self.config.store.deduplication;
        let dedup = Arc::new(ProcessedIdSet::new(dedup_cfg.memory_threshold_mb));
        let writer = Arc::new(BatchWriter::new(
            self.store.clone(),
            dedup.clone(),
            dedup_cfg.enabled,
            self.config.ingest.batch_size,
            self.config.api.rate_limit.clone(),
        ));

        let worker_count = self
            .config
            .ingest
            .parallel
            .max_workers
            .min(items.len().max(1));
        let ctx = Arc::new(RunContext {
            config: self.config.clone(),
            client: self.client.clone(),
            governor: Arc::new(RateGovernor::new(&self.config.api)),
            validator: Validator::new(self.config.ingest.date_ranges.min_date),
            writer,
            dedup,
            metrics: Arc::new(RunMetrics::new()),
            queue: Mutex::new(items.into()),
            run_token: cancel.child_token(),
            fatal: Mutex::new(None),
            any_partial: AtomicBool::new(false),
        });

        let mut handles = Vec::with_capacity(worker_count);
        for worker_id in 0..worker_count {
            let ctx = ctx.clone();
            handles.push(tokio::spawn(worker::run_worker(ctx, worker_id)));
        }
        for handle in handles {
            let _ = handle.await;
        }

        if let Some(err) = ctx.fatal.lock().expect("fatal slot poisoned").take() {
            tracing::error!(run_id = %run_id, error = %err, "run aborted");
            return Err(err);
        }

        let terminal = if cancel.is_cancelled() {
            TerminalState::Cancelled
        } else if ctx.any_partial.load(std::sync::atomic::Ordering::Relaxed) {
            TerminalState::Partial
        } else {
            TerminalState::Ok
        };

        let report = RunReport {
            run_id,
            terminal,
            started_at,
            finished_at: Utc::now(),
            totals: ctx.metrics.totals(),
            families: ctx.metrics.per_family(),
            endpoint_health: ctx.governor.health_map(),
        };
        tracing::info!(
            run_id = %run_id,
            terminal = ?report.terminal,
            stored = report.totals.stored,
            duplicates_skipped = report.totals.duplicates_skipped,
            failed_validation = report.totals.failed_validation,
            "run finished"
        );
        Ok(report)
    }

    /// Verify store access before dispatching any upstream work.
    async fn preflight(&self) -> Result<()> {
        let table = &self.config.store.table_name;
        match self.store.describe_table(table).await {
            Ok(TableStatus::Exists) => Ok(()),
            Ok(TableStatus::Missing) => Err(Error::TableMissing(table.clone())),
            Err(StoreError::AuthFailed(msg)) => Err(Error::Unauthorized(msg)),
            Err(StoreError::TableMissing(t)) => Err(Error::TableMissing(t)),
            Err(e) => Err(Error::BackendMessage(format!("describe_table: {e}"))),
        }
    }

    fn resolve_window(&self, request: &RunRequest) -> DateWindow {
        let today = Utc::now().date_naive();
        let window = match request.mode {
            RunMode::Refresh => request.window.expect("validated refresh window"),
            RunMode::Incremental => {
                let days = request
                    .lookback_days
                    .unwrap_or(self.config.ingest.default_lookback_days);
                DateWindow::new(today - chrono::Duration::days(days as i64), today)
            }
            RunMode::Bulk => DateWindow::new(self.config.ingest.date_ranges.min_date, today),
        };
        window.clamped(self.config.ingest.date_ranges.min_date)
    }

    /// Family-major, oldest-window-first work order: stable family order
    /// breaks ties between simultaneously eligible families, and within a
    /// family the oldest sub-window goes first.
    fn partition(&self, request: &RunRequest, window: DateWindow) -> Vec<WorkItem> {
        let max_range_days = self.config.ingest.date_ranges.max_range_days;
        request
            .families
            .families()
            .into_iter()
            .flat_map(|family| {
                window
                    .split(max_range_days)
                    .into_iter()
                    .map(move |window| WorkItem { family, window })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FamilySelection;
    use chrono::NaiveDate;
    use std::result::Result;

    fn driver_config() -> IngestConfig {
        IngestConfig::default()
    }

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn partition_is_family_major_and_oldest_first() {
        struct NoopClient;
        #[async_trait::async_trait]
        impl ApiClient for NoopClient {
            async fn fetch_page(
                &self,
                _family: Family,
                _window: &DateWindow,
                _offset: u32,
                _limit: u32,
            ) -> crate::traversal::FetchResult {
                crate::traversal::FetchResult::Timeout
            }
        }
        struct NoopStore;
        #[async_trait::async_trait]
        impl RecordStore for NoopStore {
            async fn describe_table(&self, _t: &str) -> Result<TableStatus, StoreError> {
                Ok(TableStatus::Exists)
            }
            async fn put_item(
                &self,
                _r: &crate::validate::CanonicalRecord,
            ) -> Result<(), StoreError> {
                Ok(())
            }
            async fn batch_put(
                &self,
                _r: &[crate::validate::CanonicalRecord],
            ) -> Result<Vec<crate::store::ItemOutcome>, StoreError> {
                Ok(vec![])
            }
            async fn query_prefix(
                &self,
                _i: &str,
                _h: &str,
                _p: crate::store::RangePredicate,
            ) -> Result<Vec<serde_json::Value>, StoreError> {
                Ok(vec![])
            }
        }

        let mut config = driver_config();
        config.ingest.date_ranges.max_range_days = 10;
        let driver =
            RunDriver::new(config, Arc::new(NoopClient), Arc::new(NoopStore)).unwrap();

        let request = RunRequest::refresh(
            DateWindow::new(d(2024, 1, 1), d(2024, 1, 25)),
            FamilySelection::Only(vec![Family::Amendment, Family::Bill]),
        );
        let window = driver.resolve_window(&request);
        let items = driver.partition(&request, window);

        assert_eq!(items.len(), 6);
        // Bill precedes amendment in stable family order.
        assert!(items[..3].iter().all(|i| i.family == Family::Bill));
        assert!(items[3..].iter().all(|i| i.family == Family::Amendment));
        // Oldest window first within each family.
        assert_eq!(items[0].window.from, d(2024, 1, 1));
        assert_eq!(items[1].window.from, d(2024, 1, 11));
        assert_eq!(items[2].window.from, d(2024, 1, 21));
    }
}
