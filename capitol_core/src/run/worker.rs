//! Worker loop: claims work items from the shared queue and drives each
//! sub-window through its fetch/validate/write life cycle.

use super::{RunContext, WorkItem};
use crate::config::ResetFrequency;
use crate::models::DateWindow;
use crate::traversal::{FailureKind, PageStep, Traversal, TraversalOutcome};
use crate::{Error, Result};
use std::sync::atomic::Ordering;
use std::sync::Arc;

/// Life cycle of one sub-window, traced for observability.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum SubWindowState {
    Ready,
    Fetching,
    Writing,
    Done { partial: bool },
    Failed,
}

/// Non-fatal terminal outcome of one sub-window.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum SubWindowOutcome {
    Completed,
    Partial,
    Failed,
    Cancelled,
}

pub(crate) async fn run_worker(ctx: Arc<RunContext>, worker_id: usize) {
    let chunk_size = ctx.config.ingest.parallel.chunk_size;
    loop {
        if ctx.run_token.is_cancelled() {
            return;
        }

        let chunk: Vec<WorkItem> = {
            let mut queue = ctx.queue.lock().expect("work queue poisoned");
            let take = chunk_size.min(queue.len());
            queue.drain(..take).collect()
        };
        if chunk.is_empty() {
            tracing::debug!(worker_id, "queue drained, worker exiting");
            return;
        }

        for item in chunk {
            match process_sub_window(&ctx, &item).await {
                Ok(SubWindowOutcome::Completed) => {}
                Ok(SubWindowOutcome::Partial) | Ok(SubWindowOutcome::Failed) => {
                    ctx.any_partial.store(true, Ordering::Relaxed);
                }
                Ok(SubWindowOutcome::Cancelled) => return,
                Err(err) => {
                    tracing::error!(worker_id, family = %item.family, error = %err, "fatal error, aborting run");
                    let mut slot = ctx.fatal.lock().expect("fatal slot poisoned");
                    if slot.is_none() {
                        *slot = Some(err);
                    }
                    drop(slot);
                    ctx.run_token.cancel();
                    return;
                }
            }
        }
    }
}

#[tracing::instrument(level = "info", skip(ctx, item), fields(family = %item.family, from = %item.window.from, to = %item.window.to))]
async fn process_sub_window(ctx: &RunContext, item: &WorkItem) -> Result<SubWindowOutcome> {
    let counters = ctx.metrics.family(item.family);
    let dedup_cfg = &ctx.config.store.deduplication;
    let mut state = SubWindowState::Ready;
    let mut saw_partial = false;

    if dedup_cfg.enabled && dedup_cfg.reset_frequency == ResetFrequency::PerRange {
        ctx.dedup.reset();
    }

    for date in item.window.dates() {
        if ctx.run_token.is_cancelled() {
            tracing::info!(state = ?state, "sub-window cancelled");
            return Ok(SubWindowOutcome::Cancelled);
        }
        if dedup_cfg.enabled && dedup_cfg.reset_frequency == ResetFrequency::PerDate {
            ctx.dedup.reset();
        }

        let day = DateWindow::new(date, date);
        let mut traversal = Traversal::new(
            ctx.client.as_ref(),
            &ctx.governor,
            item.family,
            day,
            ctx.config.ingest.page_limit,
            ctx.config.api.rate_limit.max_retries,
            ctx.config.ingest.page_cap,
        );

        state = SubWindowState::Fetching;
        let outcome = loop {
            match traversal.next_page(&ctx.run_token).await {
                PageStep::Records(raw) => {
                    counters.received.fetch_add(raw.len() as u64, Ordering::Relaxed);

                    state = SubWindowState::Writing;
                    let mut valid = Vec::with_capacity(raw.len());
                    for record in &raw {
                        match ctx.validator.validate(item.family, record) {
                            Ok(canonical) => valid.push(canonical),
                            Err(rejection) => {
                                counters.failed_validation.fetch_add(1, Ordering::Relaxed);
                                tracing::warn!(family = %item.family, %date, %rejection, "record rejected");
                            }
                        }
                    }
                    counters.validated.fetch_add(valid.len() as u64, Ordering::Relaxed);

                    let written = ctx.writer.write(valid, &ctx.run_token).await?;
                    counters.stored.fetch_add(written.stored, Ordering::Relaxed);
                    counters
                        .duplicates_skipped
                        .fetch_add(written.duplicates_skipped, Ordering::Relaxed);
                    counters
                        .failed_store
                        .fetch_add(written.failed_store, Ordering::Relaxed);
                    counters.retries.fetch_add(written.retries, Ordering::Relaxed);
                    state = SubWindowState::Fetching;
                }
                PageStep::Done(outcome) => break outcome,
            }
        };

        counters
            .requested
            .fetch_add(traversal.pages_fetched() as u64, Ordering::Relaxed);
        counters
            .retries
            .fetch_add(traversal.retries(), Ordering::Relaxed);
        counters
            .rate_limit_waits
            .fetch_add(traversal.rate_limit_waits(), Ordering::Relaxed);

        match outcome {
            TraversalOutcome::Completed => {
                counters.dates_completed.fetch_add(1, Ordering::Relaxed);
            }
            TraversalOutcome::Partial { reason, last_offset } => {
                saw_partial = true;
                tracing::warn!(family = %item.family, %date, reason, last_offset, "date traversal partial");
            }
            TraversalOutcome::Failed { kind } => match kind {
                FailureKind::Auth(message) => return Err(Error::Unauthorized(message)),
                kind => {
                    state = SubWindowState::Failed;
                    tracing::error!(family = %item.family, %date, state = ?state, ?kind, "sub-window failed");
                    return Ok(SubWindowOutcome::Failed);
                }
            },
            TraversalOutcome::Cancelled => {
                tracing::info!(state = ?state, "sub-window cancelled");
                return Ok(SubWindowOutcome::Cancelled);
            }
        }
    }

    state = SubWindowState::Done {
        partial: saw_partial,
    };
    tracing::debug!(state = ?state, "sub-window done");
    Ok(if saw_partial {
        SubWindowOutcome::Partial
    } else {
        SubWindowOutcome::Completed
    })
}
