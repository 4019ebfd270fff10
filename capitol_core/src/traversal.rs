//! Paginated traversal of upstream list endpoints.
//!
//! A `Traversal` walks one (family, window) pair page by page. Every dispatch
//! goes through the shared governor, and every classified outcome is reported
//! back to it, so per-page retries automatically pick up the adaptive wait.

use crate::governor::{DispatchOutcome, RateGovernor, WaitOutcome};
use crate::models::{DateWindow, Family};
use async_trait::async_trait;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// One upstream list page.
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub records: Vec<serde_json::Value>,
    /// Offset of the next page; `None` when the upstream signaled the end of
    /// the window.
    pub next_offset: Option<u32>,
}

/// Classified result of a single page fetch.
///
/// The client does the HTTP-level classification (status codes, network
/// errors, body parsing); the traversal engine and governor only ever see
/// these tags.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchResult {
    Page(Page),
    /// 5xx, connection reset, DNS failure.
    Transient(String),
    /// HTTP 429 or an upstream quota signal.
    RateLimited { retry_after: Option<Duration> },
    /// Connect or read deadline exceeded.
    Timeout,
    /// Non-retryable 4xx or a malformed response body.
    Permanent(String),
    /// 401/403; run-fatal once surfaced.
    AuthFailed(String),
}

/// A paginated upstream listing source.
#[async_trait]
pub trait ApiClient: Send + Sync {
    async fn fetch_page(
        &self,
        family: Family,
        window: &DateWindow,
        offset: u32,
        limit: u32,
    ) -> FetchResult;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    /// Non-retryable upstream response, with the page offset it occurred at.
    Permanent { message: String, offset: u32 },
    /// Authentication rejected; the run driver aborts the whole run.
    Auth(String),
    /// Retryable failures exceeded `max_retries` before any page landed.
    RetriesExhausted { offset: u32 },
}

/// Terminal outcome of one traversal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraversalOutcome {
    Completed,
    Partial { reason: String, last_offset: u32 },
    Failed { kind: FailureKind },
    Cancelled,
}

/// One step of the lazy page walk.
#[derive(Debug, Clone, PartialEq)]
pub enum PageStep {
    Records(Vec<serde_json::Value>),
    Done(TraversalOutcome),
}

pub struct Traversal<'a> {
    client: &'a dyn ApiClient,
    governor: &'a RateGovernor,
    family: Family,
    window: DateWindow,
    limit: u32,
    max_retries: u32,
    page_cap: u32,
    offset: u32,
    pages_fetched: u32,
    end_signaled: bool,
    finished: Option<TraversalOutcome>,
    retries: u64,
    rate_limit_waits: u64,
}

impl<'a> Traversal<'a> {
    pub fn new(
        client: &'a dyn ApiClient,
        governor: &'a RateGovernor,
        family: Family,
        window: DateWindow,
        limit: u32,
        max_retries: u32,
        page_cap: u32,
    ) -> Self {
        Self {
            client,
            governor,
            family,
            window,
            limit,
            max_retries,
            page_cap,
            offset: 0,
            pages_fetched: 0,
            end_signaled: false,
            finished: None,
            retries: 0,
            rate_limit_waits: 0,
        }
    }

    /// Upstream page requests that returned a page so far.
    pub fn pages_fetched(&self) -> u32 {
        self.pages_fetched
    }

    /// Re-attempts caused by retryable page failures so far.
    pub fn retries(&self) -> u64 {
        self.retries
    }

    /// Rate-limit responses observed so far.
    pub fn rate_limit_waits(&self) -> u64 {
        self.rate_limit_waits
    }

    /// Advance to the next page.
    ///
    /// Emits each in-window record exactly once, in upstream list order.
    /// After a `Done` step the traversal is finished; further calls return
    /// the same outcome.
    #[tracing::instrument(level = "debug", skip(self, cancel), fields(family = %self.family, offset = self.offset))]
    pub async fn next_page(&mut self, cancel: &CancellationToken) -> PageStep {
        if let Some(outcome) = &self.finished {
            return PageStep::Done(outcome.clone());
        }
        if self.window.is_empty() || self.end_signaled {
            return self.finish(TraversalOutcome::Completed);
        }
        if self.page_cap > 0 && self.pages_fetched >= self.page_cap {
            return self.finish(TraversalOutcome::Partial {
                reason: "page cap reached".to_string(),
                last_offset: self.offset,
            });
        }

        let mut attempts: u32 = 0;
        loop {
            match self.governor.acquire(self.family, cancel).await {
                WaitOutcome::Proceed { .. } => {}
                WaitOutcome::Cancelled => return self.finish(TraversalOutcome::Cancelled),
            }

            match self
                .client
                .fetch_page(self.family, &self.window, self.offset, self.limit)
                .await
            {
                FetchResult::Page(page) => {
                    self.governor.record(self.family, &DispatchOutcome::Ok);
                    self.pages_fetched += 1;

                    if page.records.is_empty() {
                        return self.finish(TraversalOutcome::Completed);
                    }

                    match page.next_offset {
                        // Guard against a stuck upstream cursor: offsets must
                        // advance or the same records would be emitted twice.
                        Some(next) if next > self.offset => self.offset = next,
                        Some(_) => self.offset += self.limit.max(1),
                        None => self.end_signaled = true,
                    }
                    return PageStep::Records(page.records);
                }
                FetchResult::Transient(message) => {
                    self.governor
                        .record(self.family, &DispatchOutcome::Transient);
                    tracing::warn!(family = %self.family, offset = self.offset, %message, "transient page failure");
                    if !self.bump_attempt(&mut attempts) {
                        return self.give_up();
                    }
                }
                FetchResult::Timeout => {
                    self.governor.record(self.family, &DispatchOutcome::Timeout);
                    tracing::warn!(family = %self.family, offset = self.offset, "page fetch timed out");
                    if !self.bump_attempt(&mut attempts) {
                        return self.give_up();
                    }
                }
                FetchResult::RateLimited { retry_after } => {
                    self.governor
                        .record(self.family, &DispatchOutcome::RateLimited { retry_after });
                    self.rate_limit_waits += 1;
                    tracing::info!(family = %self.family, offset = self.offset, ?retry_after, "rate limited");
                    if !self.bump_attempt(&mut attempts) {
                        return self.give_up();
                    }
                }
                FetchResult::Permanent(message) => {
                    self.governor
                        .record(self.family, &DispatchOutcome::Permanent);
                    tracing::error!(family = %self.family, offset = self.offset, %message, "permanent page failure");
                    return self.finish(TraversalOutcome::Failed {
                        kind: FailureKind::Permanent {
                            message,
                            offset: self.offset,
                        },
                    });
                }
                FetchResult::AuthFailed(message) => {
                    self.governor
                        .record(self.family, &DispatchOutcome::Permanent);
                    return self.finish(TraversalOutcome::Failed {
                        kind: FailureKind::Auth(message),
                    });
                }
            }
        }
    }

    /// Returns false once the retry budget is spent.
    fn bump_attempt(&mut self, attempts: &mut u32) -> bool {
        *attempts += 1;
        if *attempts > self.max_retries {
            return false;
        }
        self.retries += 1;
        true
    }

    fn give_up(&mut self) -> PageStep {
        let outcome = if self.pages_fetched > 0 {
            TraversalOutcome::Partial {
                reason: "retries exhausted".to_string(),
                last_offset: self.offset,
            }
        } else {
            TraversalOutcome::Failed {
                kind: FailureKind::RetriesExhausted {
                    offset: self.offset,
                },
            }
        };
        self.finish(outcome)
    }

    fn finish(&mut self, outcome: TraversalOutcome) -> PageStep {
        self.finished = Some(outcome.clone());
        PageStep::Done(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ApiConfig;
    use chrono::NaiveDate;
    use std::sync::Mutex;

    struct ScriptedClient {
        script: Mutex<Vec<FetchResult>>,
    }

    impl ScriptedClient {
        fn new(script: Vec<FetchResult>) -> Self {
            Self {
                script: Mutex::new(script),
            }
        }
    }

    #[async_trait]
    impl ApiClient for ScriptedClient {
        async fn fetch_page(
            &self,
            _family: Family,
            _window: &DateWindow,
            _offset: u32,
            _limit: u32,
        ) -> FetchResult {
            let mut script = self.script.lock().unwrap();
            if script.is_empty() {
                FetchResult::Page(Page {
                    records: vec![],
                    next_offset: None,
                })
            } else {
                script.remove(0)
            }
        }
    }

    fn window() -> DateWindow {
        let d = NaiveDate::from_ymd_opt(2024, 1, 20).unwrap();
        DateWindow::new(d, d)
    }

    fn governor() -> RateGovernor {
        let mut api = ApiConfig::default();
        api.rate_limit.requests_per_second = 1000.0;
        RateGovernor::new(&api)
    }

    fn page(ids: &[&str], next_offset: Option<u32>) -> FetchResult {
        FetchResult::Page(Page {
            records: ids
                .iter()
                .map(|id| serde_json::json!({ "number": id }))
                .collect(),
            next_offset,
        })
    }

    async fn drain(traversal: &mut Traversal<'_>) -> (Vec<serde_json::Value>, TraversalOutcome) {
        let cancel = CancellationToken::new();
        let mut records = Vec::new();
        loop {
            match traversal.next_page(&cancel).await {
                PageStep::Records(batch) => records.extend(batch),
                PageStep::Done(outcome) => return (records, outcome),
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn walks_pages_in_order_until_empty_page() {
        let client = ScriptedClient::new(vec![
            page(&["1", "2"], Some(2)),
            page(&["3", "4"], Some(4)),
            page(&[], None),
        ]);
        let gov = governor();
        let mut t = Traversal::new(&client, &gov, Family::Bill, window(), 2, 3, 0);
        let (records, outcome) = drain(&mut t).await;
        assert_eq!(outcome, TraversalOutcome::Completed);
        let nums: Vec<_> = records.iter().map(|r| r["number"].clone()).collect();
        assert_eq!(nums, vec!["1", "2", "3", "4"]);
        assert_eq!(t.retries(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn end_of_window_signal_completes_without_extra_fetch() {
        let client = ScriptedClient::new(vec![page(&["1"], None)]);
        let gov = governor();
        let mut t = Traversal::new(&client, &gov, Family::Bill, window(), 250, 3, 0);
        let (records, outcome) = drain(&mut t).await;
        assert_eq!(records.len(), 1);
        assert_eq!(outcome, TraversalOutcome::Completed);
    }

    #[tokio::test(start_paused = true)]
    async fn retries_transient_pages_then_succeeds() {
        let client = ScriptedClient::new(vec![
            FetchResult::Transient("503".to_string()),
            FetchResult::Transient("503".to_string()),
            page(&["1", "2", "3", "4"], None),
        ]);
        let gov = governor();
        let mut t = Traversal::new(&client, &gov, Family::Bill, window(), 250, 3, 0);
        let (records, outcome) = drain(&mut t).await;
        assert_eq!(outcome, TraversalOutcome::Completed);
        assert_eq!(records.len(), 4);
        assert_eq!(t.retries(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_max_retries_never_retries() {
        let client = ScriptedClient::new(vec![FetchResult::Transient("503".to_string())]);
        let gov = governor();
        let mut t = Traversal::new(&client, &gov, Family::Bill, window(), 250, 0, 0);
        let (records, outcome) = drain(&mut t).await;
        assert!(records.is_empty());
        assert_eq!(
            outcome,
            TraversalOutcome::Failed {
                kind: FailureKind::RetriesExhausted { offset: 0 }
            }
        );
        assert_eq!(t.retries(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn permanent_failure_is_fatal_with_offset() {
        let client = ScriptedClient::new(vec![
            page(&["1"], Some(1)),
            FetchResult::Permanent("404 not found".to_string()),
        ]);
        let gov = governor();
        let mut t = Traversal::new(&client, &gov, Family::Bill, window(), 1, 3, 0);
        let (records, outcome) = drain(&mut t).await;
        assert_eq!(records.len(), 1);
        assert_eq!(
            outcome,
            TraversalOutcome::Failed {
                kind: FailureKind::Permanent {
                    message: "404 not found".to_string(),
                    offset: 1
                }
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn exhaustion_after_progress_is_partial() {
        let client = ScriptedClient::new(vec![
            page(&["1"], Some(1)),
            FetchResult::Transient("reset".to_string()),
            FetchResult::Transient("reset".to_string()),
        ]);
        let gov = governor();
        let mut t = Traversal::new(&client, &gov, Family::Bill, window(), 1, 1, 0);
        let (records, outcome) = drain(&mut t).await;
        assert_eq!(records.len(), 1);
        assert_eq!(
            outcome,
            TraversalOutcome::Partial {
                reason: "retries exhausted".to_string(),
                last_offset: 1
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn empty_window_completes_with_zero_records() {
        let client = ScriptedClient::new(vec![page(&["should not be fetched"], None)]);
        let gov = governor();
        let d = NaiveDate::from_ymd_opt(2024, 2, 2).unwrap();
        let empty = DateWindow::new(d, d.pred_opt().unwrap());
        let mut t = Traversal::new(&client, &gov, Family::Bill, empty, 250, 3, 0);
        let (records, outcome) = drain(&mut t).await;
        assert!(records.is_empty());
        assert_eq!(outcome, TraversalOutcome::Completed);
    }

    #[tokio::test(start_paused = true)]
    async fn page_cap_yields_partial() {
        let client = ScriptedClient::new(vec![page(&["1"], Some(1)), page(&["2"], Some(2))]);
        let gov = governor();
        let mut t = Traversal::new(&client, &gov, Family::Bill, window(), 1, 3, 1);
        let (records, outcome) = drain(&mut t).await;
        assert_eq!(records.len(), 1);
        assert!(matches!(outcome, TraversalOutcome::Partial { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_surfaces_as_cancelled() {
        let client = ScriptedClient::new(vec![page(&["1"], Some(1))]);
        let mut api = ApiConfig::default();
        api.rate_limit.requests_per_second = 0.01; // 100s between dispatches
        let gov = RateGovernor::new(&api);
        let cancel = CancellationToken::new();

        let mut t = Traversal::new(&client, &gov, Family::Bill, window(), 1, 3, 0);
        // First page dispatches immediately.
        assert!(matches!(t.next_page(&cancel).await, PageStep::Records(_)));

        // The second dispatch must sit in the governor's wait, where it
        // observes the cancel and returns the sentinel, not a failure.
        cancel.cancel();
        match t.next_page(&cancel).await {
            PageStep::Done(TraversalOutcome::Cancelled) => {}
            other => panic!("expected cancelled, got {other:?}"),
        }
    }
}
