use crate::models::{min_corpus_date, Family};
use crate::{Error, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

/// Per-family connect/read timeout pair, in seconds.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeoutConfig {
    pub connect_secs: f64,
    pub read_secs: f64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 5.0,
            read_secs: 30.0,
        }
    }
}

impl TimeoutConfig {
    pub fn connect(&self) -> Duration {
        Duration::from_secs_f64(self.connect_secs)
    }

    pub fn read(&self) -> Duration {
        Duration::from_secs_f64(self.read_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Default requests/second applied to every family without an override.
    pub requests_per_second: f64,
    /// Per-page retry cap for the traversal engine.
    pub max_retries: u32,
    /// Base backoff in seconds for writer and traversal retries.
    pub retry_delay_secs: f64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_second: 1.0,
            max_retries: 3,
            retry_delay_secs: 1.0,
        }
    }
}

impl RateLimitConfig {
    /// Exponential backoff for attempt `n` (0-based), capped at two minutes.
    pub fn retry_backoff(&self, attempt: u32) -> Duration {
        let shift = attempt.min(16);
        let factor = 1u64 << shift;
        let secs = (self.retry_delay_secs * factor as f64).min(120.0);
        Duration::from_secs_f64(secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    /// Per-family requests/second overrides, keyed by family tag.
    #[serde(default)]
    pub endpoint_rate_limits: HashMap<Family, f64>,
    /// Per-family timeout overrides, keyed by family tag.
    #[serde(default)]
    pub timeout_config: HashMap<Family, TimeoutConfig>,
}

fn default_base_url() -> String {
    "https://api.congress.gov/v3".to_string()
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            rate_limit: RateLimitConfig::default(),
            endpoint_rate_limits: HashMap::new(),
            timeout_config: HashMap::new(),
        }
    }
}

impl ApiConfig {
    pub fn rate_for(&self, family: Family) -> f64 {
        self.endpoint_rate_limits
            .get(&family)
            .copied()
            .unwrap_or(self.rate_limit.requests_per_second)
    }

    pub fn timeouts_for(&self, family: Family) -> TimeoutConfig {
        self.timeout_config
            .get(&family)
            .copied()
            .unwrap_or_default()
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResetFrequency {
    PerDate,
    PerRange,
    PerSession,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DedupConfig {
    pub enabled: bool,
    pub reset_frequency: ResetFrequency,
    /// Advisory cap on the processed-ID set before a forced reset.
    pub memory_threshold_mb: u64,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            reset_frequency: ResetFrequency::PerDate,
            memory_threshold_mb: 256,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    pub table_name: String,
    pub region: String,
    #[serde(default)]
    pub deduplication: DedupConfig,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            table_name: "congressional_data".to_string(),
            region: "us-west-2".to_string(),
            deduplication: DedupConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DateRangeConfig {
    /// Sub-window chunk size in days.
    pub max_range_days: u32,
    /// Lower bound on requested dates.
    pub min_date: NaiveDate,
}

impl Default for DateRangeConfig {
    fn default() -> Self {
        Self {
            max_range_days: 365,
            min_date: min_corpus_date(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParallelConfig {
    /// Concurrent sub-window workers (1..=10).
    pub max_workers: usize,
    /// Sub-windows claimed per worker dispatch.
    pub chunk_size: usize,
}

impl Default for ParallelConfig {
    fn default() -> Self {
        Self {
            max_workers: 3,
            chunk_size: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestOptions {
    /// Writer batch cap (logical batch; store adapters split further).
    pub batch_size: usize,
    /// Incremental-mode window when the request does not name one.
    pub default_lookback_days: u32,
    #[serde(default)]
    pub date_ranges: DateRangeConfig,
    #[serde(default)]
    pub parallel: ParallelConfig,
    /// Page size requested from the upstream list endpoints.
    #[serde(default = "default_page_limit")]
    pub page_limit: u32,
    /// Safety cap on pages per sub-window traversal; 0 disables the cap.
    #[serde(default)]
    pub page_cap: u32,
}

fn default_page_limit() -> u32 {
    250
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            batch_size: 100,
            default_lookback_days: 30,
            date_ranges: DateRangeConfig::default(),
            parallel: ParallelConfig::default(),
            page_limit: default_page_limit(),
            page_cap: 0,
        }
    }
}

/// Top-level configuration for the ingestion core.
///
/// Secrets (the API key, store credentials) are never part of this structure;
/// they come from the process environment.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct IngestConfig {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub ingest: IngestOptions,
}

impl IngestConfig {
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let bytes = std::fs::read(path.as_ref())
            .map_err(|e| Error::backend(format!("read {}", path.as_ref().display()), e))?;
        let cfg: IngestConfig = serde_json::from_slice(&bytes)
            .map_err(|e| Error::InvalidInput(format!("invalid config file: {e}")))?;
        cfg.validate()?;
        Ok(cfg)
    }

    #[tracing::instrument(level = "debug", skip(self))]
    pub fn validate(&self) -> Result<()> {
        if self.api.base_url.trim().is_empty() {
            return Err(Error::InvalidInput("api.base_url is empty".to_string()));
        }
        if !(self.api.rate_limit.requests_per_second > 0.0) {
            return Err(Error::InvalidInput(
                "api.rate_limit.requests_per_second must be > 0".to_string(),
            ));
        }
        if self.api.rate_limit.retry_delay_secs < 0.0 {
            return Err(Error::InvalidInput(
                "api.rate_limit.retry_delay must be >= 0".to_string(),
            ));
        }
        for (family, rate) in &self.api.endpoint_rate_limits {
            if !(*rate > 0.0) {
                return Err(Error::InvalidInput(format!(
                    "api.endpoint_rate_limits.{family} must be > 0"
                )));
            }
        }
        for (family, t) in &self.api.timeout_config {
            if !(t.connect_secs > 0.0) || !(t.read_secs > 0.0) {
                return Err(Error::InvalidInput(format!(
                    "api.timeout_config.{family} must have positive connect/read"
                )));
            }
        }
        if self.store.table_name.trim().is_empty() {
            return Err(Error::InvalidInput("store.table_name is empty".to_string()));
        }
        if self.ingest.batch_size == 0 {
            return Err(Error::InvalidInput(
                "ingest.batch_size must be > 0".to_string(),
            ));
        }
        if self.ingest.page_limit == 0 {
            return Err(Error::InvalidInput(
                "ingest.page_limit must be > 0".to_string(),
            ));
        }
        if self.ingest.date_ranges.max_range_days == 0 {
            return Err(Error::InvalidInput(
                "ingest.date_ranges.max_range_days must be > 0".to_string(),
            ));
        }
        if self.ingest.date_ranges.min_date < min_corpus_date() {
            return Err(Error::InvalidInput(format!(
                "ingest.date_ranges.min_date must be >= {}",
                min_corpus_date()
            )));
        }
        if !(1..=10).contains(&self.ingest.parallel.max_workers) {
            return Err(Error::InvalidInput(
                "ingest.parallel.max_workers must be in 1..=10".to_string(),
            ));
        }
        if self.ingest.parallel.chunk_size == 0 {
            return Err(Error::InvalidInput(
                "ingest.parallel.chunk_size must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}
