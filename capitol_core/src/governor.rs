//! Per-family request pacing and adaptive backoff.
//!
//! One `RateGovernor` is shared by all workers of a run. Each endpoint family
//! carries its own dispatch clock, consecutive-error counter and health
//! factor; a worker must `acquire` a slot before every upstream call and
//! `record` the classified outcome afterwards.

use crate::config::ApiConfig;
use crate::models::Family;
use dashmap::DashMap;
use rand::Rng;
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Classified result of one upstream dispatch, as reported by the traversal
/// engine. The governor never inspects HTTP results itself.
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    Ok,
    Transient,
    RateLimited { retry_after: Option<Duration> },
    Permanent,
    Timeout,
}

/// Result of waiting for a dispatch slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitOutcome {
    Proceed { waited: Duration },
    Cancelled,
}

/// Bounds of the adaptive health factor (AIMD: +0.5 on failure, x0.9 on
/// success, clamped).
const HEALTH_FLOOR: f64 = 1.0;
const HEALTH_CEIL: f64 = 8.0;

/// Cap on the exponential backoff multiplier.
const BACKOFF_CAP: f64 = 120.0;

/// Jitter fraction applied to the base interval.
const JITTER_FRAC: f64 = 0.15;

#[derive(Debug)]
struct EndpointState {
    rate: f64,
    next_slot: Option<Instant>,
    consecutive_errors: u32,
    health_factor: f64,
    retry_after: Option<Duration>,
    successes: u64,
    failures: u64,
}

impl EndpointState {
    fn new(rate: f64) -> Self {
        Self {
            rate,
            next_slot: None,
            consecutive_errors: 0,
            health_factor: HEALTH_FLOOR,
            retry_after: None,
            successes: 0,
            failures: 0,
        }
    }

    fn error_rate(&self) -> f64 {
        let total = self.successes + self.failures;
        if total == 0 {
            0.0
        } else {
            self.failures as f64 / total as f64
        }
    }
}

/// Snapshot of one family's health, for the run report.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct EndpointHealth {
    pub consecutive_errors: u32,
    pub error_rate: f64,
    pub health_factor: f64,
    pub effective_rate: f64,
}

pub struct RateGovernor {
    endpoints: DashMap<Family, EndpointState>,
    rates: std::collections::HashMap<Family, f64>,
    default_rate: f64,
}

impl RateGovernor {
    pub fn new(api: &ApiConfig) -> Self {
        Self {
            endpoints: DashMap::new(),
            rates: api.endpoint_rate_limits.clone(),
            default_rate: api.rate_limit.requests_per_second,
        }
    }

    fn rate_for(&self, family: Family) -> f64 {
        self.rates.get(&family).copied().unwrap_or(self.default_rate)
    }

    /// Suspend the caller until the family's next dispatch slot.
    ///
    /// The slot is reserved before sleeping, so concurrent workers hitting
    /// the same family serialize their dispatches instead of stampeding.
    /// A pending `Retry-After` hint takes precedence over computed backoff
    /// and is consumed by the wait that honors it. Cancellation interrupts
    /// the sleep promptly and returns `Cancelled`, not a failure.
    #[tracing::instrument(level = "debug", skip(self, cancel))]
    pub async fn acquire(&self, family: Family, cancel: &CancellationToken) -> WaitOutcome {
        let now = Instant::now();
        let target = {
            let mut state = self
                .endpoints
                .entry(family)
                .or_insert_with(|| EndpointState::new(self.rate_for(family)));

            let interval = match state.retry_after.take() {
                // Upstream told us when to come back; honor it plus a small
                // random cushion instead of computed backoff.
                Some(hint) => hint + Duration::from_secs_f64(rand::thread_rng().gen_range(0.0..0.5)),
                None => wait_interval(
                    state.rate,
                    state.consecutive_errors,
                    state.health_factor,
                    &mut rand::thread_rng(),
                ),
            };

            let target = match state.next_slot {
                Some(prev) => {
                    let earliest = prev + interval;
                    if earliest <= now {
                        now
                    } else {
                        earliest
                    }
                }
                None => now,
            };
            state.next_slot = Some(target.max(now));
            target
        };

        if target <= now {
            return WaitOutcome::Proceed {
                waited: Duration::ZERO,
            };
        }

        tokio::select! {
            _ = cancel.cancelled() => WaitOutcome::Cancelled,
            _ = tokio::time::sleep_until(target) => WaitOutcome::Proceed {
                waited: target - now,
            },
        }
    }

    /// Record the classified outcome of a dispatch.
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn record(&self, family: Family, outcome: &DispatchOutcome) {
        let mut state = self
            .endpoints
            .entry(family)
            .or_insert_with(|| EndpointState::new(self.rate_for(family)));

        match outcome {
            DispatchOutcome::Ok => {
                state.successes += 1;
                state.consecutive_errors = 0;
                state.health_factor = (state.health_factor * 0.9).max(HEALTH_FLOOR);
            }
            DispatchOutcome::RateLimited { retry_after } => {
                state.failures += 1;
                state.consecutive_errors = state.consecutive_errors.saturating_add(1);
                state.health_factor = (state.health_factor + 0.5).min(HEALTH_CEIL);
                state.retry_after = *retry_after;
            }
            DispatchOutcome::Transient | DispatchOutcome::Timeout => {
                state.failures += 1;
                state.consecutive_errors = state.consecutive_errors.saturating_add(1);
                state.health_factor = (state.health_factor + 0.5).min(HEALTH_CEIL);
            }
            DispatchOutcome::Permanent => {
                state.failures += 1;
                state.consecutive_errors = state.consecutive_errors.saturating_add(1);
            }
        }

        if state.consecutive_errors > 0 {
            tracing::debug!(
                family = %family,
                consecutive_errors = state.consecutive_errors,
                health_factor = state.health_factor,
                "endpoint degraded"
            );
        }
    }

    /// Health snapshot of every family dispatched so far; attached to the
    /// run report's per-endpoint breakdown.
    pub fn health_map(&self) -> BTreeMap<Family, EndpointHealth> {
        self.endpoints
            .iter()
            .map(|entry| {
                let s = entry.value();
                (
                    *entry.key(),
                    EndpointHealth {
                        consecutive_errors: s.consecutive_errors,
                        error_rate: s.error_rate(),
                        health_factor: s.health_factor,
                        effective_rate: s.rate / s.health_factor,
                    },
                )
            })
            .collect()
    }
}

/// Compute the wait before the next dispatch.
///
/// `base_interval = 1/rate`, jittered by +/-15%, scaled by the health factor
/// and, when the family is failing, by `min(2^(errors+1), 120)`.
fn wait_interval<R: Rng>(
    rate: f64,
    consecutive_errors: u32,
    health_factor: f64,
    rng: &mut R,
) -> Duration {
    let base = 1.0 / rate;
    let jitter = rng.gen_range(-JITTER_FRAC..=JITTER_FRAC) * base;
    let backoff = if consecutive_errors > 0 {
        let shift = (consecutive_errors + 1).min(16);
        ((1u64 << shift) as f64).min(BACKOFF_CAP)
    } else {
        1.0
    };
    Duration::from_secs_f64(((base + jitter) * health_factor * backoff).max(0.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ApiConfig;

    fn governor(rate: f64) -> RateGovernor {
        let mut api = ApiConfig::default();
        api.rate_limit.requests_per_second = rate;
        RateGovernor::new(&api)
    }

    #[test]
    fn wait_interval_bounds_without_errors() {
        let mut rng = rand::thread_rng();
        for _ in 0..100 {
            let w = wait_interval(2.0, 0, 1.0, &mut rng).as_secs_f64();
            assert!((0.425..=0.575).contains(&w), "wait {w} outside jitter band");
        }
    }

    #[test]
    fn wait_interval_exceeds_exponential_floor() {
        let mut rng = rand::thread_rng();
        for errors in 1..=6u32 {
            let w = wait_interval(1.0, errors, 1.0, &mut rng).as_secs_f64();
            let floor = (1u64 << errors) as f64;
            assert!(w >= floor, "wait {w} below 2^{errors} floor");
        }
    }

    #[test]
    fn backoff_multiplier_caps_at_120() {
        let mut rng = rand::thread_rng();
        let w = wait_interval(1.0, 32, 1.0, &mut rng).as_secs_f64();
        assert!(w <= 120.0 * 1.15 + 0.001);
    }

    #[test]
    fn health_factor_is_aimd_clamped() {
        let gov = governor(1.0);
        for _ in 0..20 {
            gov.record(Family::Bill, &DispatchOutcome::Transient);
        }
        assert_eq!(gov.health_map()[&Family::Bill].health_factor, 8.0);

        for _ in 0..100 {
            gov.record(Family::Bill, &DispatchOutcome::Ok);
        }
        assert_eq!(gov.health_map()[&Family::Bill].health_factor, 1.0);
    }

    #[test]
    fn success_resets_consecutive_errors() {
        let gov = governor(1.0);
        gov.record(Family::Bill, &DispatchOutcome::Timeout);
        gov.record(Family::Bill, &DispatchOutcome::Transient);
        assert_eq!(gov.health_map()[&Family::Bill].consecutive_errors, 2);
        gov.record(Family::Bill, &DispatchOutcome::Ok);
        let health = gov.health_map();
        let bill = &health[&Family::Bill];
        assert_eq!(bill.consecutive_errors, 0);
        assert!(bill.error_rate > 0.0);
    }

    #[tokio::test(start_paused = true)]
    async fn first_acquire_is_immediate_then_paced() {
        let gov = governor(2.0);
        let cancel = CancellationToken::new();

        let first = gov.acquire(Family::Bill, &cancel).await;
        assert_eq!(
            first,
            WaitOutcome::Proceed {
                waited: Duration::ZERO
            }
        );

        let start = Instant::now();
        match gov.acquire(Family::Bill, &cancel).await {
            WaitOutcome::Proceed { .. } => {}
            WaitOutcome::Cancelled => panic!("unexpected cancel"),
        }
        let elapsed = start.elapsed().as_secs_f64();
        // base 0.5s with +/-15% jitter.
        assert!(elapsed >= 0.42, "paced wait too short: {elapsed}");
    }

    #[tokio::test(start_paused = true)]
    async fn retry_after_hint_overrides_backoff() {
        let gov = governor(100.0);
        let cancel = CancellationToken::new();
        assert!(matches!(
            gov.acquire(Family::Amendment, &cancel).await,
            WaitOutcome::Proceed { .. }
        ));
        gov.record(
            Family::Amendment,
            &DispatchOutcome::RateLimited {
                retry_after: Some(Duration::from_secs(2)),
            },
        );

        let start = Instant::now();
        assert!(matches!(
            gov.acquire(Family::Amendment, &cancel).await,
            WaitOutcome::Proceed { .. }
        ));
        assert!(start.elapsed() >= Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_interrupts_wait() {
        let gov = governor(1.0);
        let cancel = CancellationToken::new();
        assert!(matches!(
            gov.acquire(Family::Treaty, &cancel).await,
            WaitOutcome::Proceed { .. }
        ));
        // Large backoff pending.
        for _ in 0..6 {
            gov.record(Family::Treaty, &DispatchOutcome::Transient);
        }

        let waiter = {
            let cancel = cancel.clone();
            async move { gov.acquire(Family::Treaty, &cancel).await }
        };
        let handle = tokio::spawn(waiter);
        tokio::time::sleep(Duration::from_millis(10)).await;
        cancel.cancel();
        let out = handle.await.unwrap();
        assert_eq!(out, WaitOutcome::Cancelled);
    }
}
