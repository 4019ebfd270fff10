//! Run counters and the structured run report.
//!
//! Counters are plain atomics inside a per-family cell so workers never
//! contend on a lock for accounting.

use crate::governor::EndpointHealth;
use crate::models::{Family, TerminalState};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Default)]
pub struct FamilyCounters {
    pub requested: AtomicU64,
    pub received: AtomicU64,
    pub validated: AtomicU64,
    pub stored: AtomicU64,
    pub duplicates_skipped: AtomicU64,
    pub failed_validation: AtomicU64,
    pub failed_store: AtomicU64,
    pub retries: AtomicU64,
    pub rate_limit_waits: AtomicU64,
    pub dates_completed: AtomicU64,
}

impl FamilyCounters {
    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            requested: self.requested.load(Ordering::Relaxed),
            received: self.received.load(Ordering::Relaxed),
            validated: self.validated.load(Ordering::Relaxed),
            stored: self.stored.load(Ordering::Relaxed),
            duplicates_skipped: self.duplicates_skipped.load(Ordering::Relaxed),
            failed_validation: self.failed_validation.load(Ordering::Relaxed),
            failed_store: self.failed_store.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            rate_limit_waits: self.rate_limit_waits.load(Ordering::Relaxed),
            dates_completed: self.dates_completed.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CounterSnapshot {
    pub requested: u64,
    pub received: u64,
    pub validated: u64,
    pub stored: u64,
    pub duplicates_skipped: u64,
    pub failed_validation: u64,
    pub failed_store: u64,
    pub retries: u64,
    pub rate_limit_waits: u64,
    pub dates_completed: u64,
}

impl CounterSnapshot {
    fn accumulate(&mut self, other: &CounterSnapshot) {
        self.requested += other.requested;
        self.received += other.received;
        self.validated += other.validated;
        self.stored += other.stored;
        self.duplicates_skipped += other.duplicates_skipped;
        self.failed_validation += other.failed_validation;
        self.failed_store += other.failed_store;
        self.retries += other.retries;
        self.rate_limit_waits += other.rate_limit_waits;
        self.dates_completed += other.dates_completed;
    }
}

/// Shared metrics aggregator for one run.
#[derive(Debug, Default)]
pub struct RunMetrics {
    families: DashMap<Family, Arc<FamilyCounters>>,
}

impl RunMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn family(&self, family: Family) -> Arc<FamilyCounters> {
        self.families
            .entry(family)
            .or_insert_with(|| Arc::new(FamilyCounters::default()))
            .clone()
    }

    pub fn per_family(&self) -> BTreeMap<Family, CounterSnapshot> {
        self.families
            .iter()
            .map(|entry| (*entry.key(), entry.value().snapshot()))
            .collect()
    }

    pub fn totals(&self) -> CounterSnapshot {
        let mut total = CounterSnapshot::default();
        for entry in self.families.iter() {
            total.accumulate(&entry.value().snapshot());
        }
        total
    }
}

/// Structured summary returned by the run driver.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub terminal: TerminalState,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub totals: CounterSnapshot,
    pub families: BTreeMap<Family, CounterSnapshot>,
    /// Governor health of every family dispatched during the run.
    pub endpoint_health: BTreeMap<Family, EndpointHealth>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn totals_accumulate_across_families() {
        let metrics = RunMetrics::new();
        metrics
            .family(Family::Bill)
            .stored
            .fetch_add(6, Ordering::Relaxed);
        metrics
            .family(Family::Amendment)
            .stored
            .fetch_add(1, Ordering::Relaxed);
        metrics
            .family(Family::Bill)
            .duplicates_skipped
            .fetch_add(1, Ordering::Relaxed);

        let totals = metrics.totals();
        assert_eq!(totals.stored, 7);
        assert_eq!(totals.duplicates_skipped, 1);

        let per_family = metrics.per_family();
        assert_eq!(per_family[&Family::Bill].stored, 6);
        assert_eq!(per_family[&Family::Amendment].stored, 1);
    }
}
