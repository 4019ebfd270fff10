//! Ingestion core for mirroring the Congress.gov corpus into a wide-column
//! key-value store.
//!
//! Four subsystems do the real work: the fetch scheduler & rate governor
//! ([`governor`]), the paginated traversal engine ([`traversal`]), the
//! validation/normalization pipeline ([`validate`]) and the deduplicating
//! batch writer ([`writer`]). The [`run`] module ties them together behind a
//! single entry point. Concrete HTTP and store collaborators live in the
//! integrations crate and plug in through the [`traversal::ApiClient`] and
//! [`store::RecordStore`] traits.

#![forbid(unsafe_code)]

pub mod config;
pub mod error;
pub mod governor;
pub mod models;
pub mod o11y;
pub mod report;
pub mod run;
pub mod store;
pub mod traversal;
pub mod validate;
pub mod writer;

pub use config::{ApiConfig, DedupConfig, IngestConfig, RateLimitConfig, ResetFrequency};
pub use error::{Error, Result};
pub use governor::{DispatchOutcome, EndpointHealth, RateGovernor, WaitOutcome};
pub use models::{
    Chamber, DateWindow, Family, FamilySelection, RunMode, RunRequest, TerminalState,
};
pub use report::{CounterSnapshot, RunMetrics, RunReport};
pub use run::{RunDriver, WorkItem};
pub use store::{ItemOutcome, RangePredicate, RecordStore, StoreError, TableStatus};
pub use traversal::{ApiClient, FetchResult, Page, PageStep, Traversal, TraversalOutcome};
pub use validate::{CanonicalRecord, Rejection, Validator};
pub use writer::{BatchWriter, ProcessedIdSet, WriteOutcome};
