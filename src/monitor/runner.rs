//! One check cycle plus out-of-band operations.
//!
//! [`run_check`] drives a single fetch+compare+transition cycle for one
//! monitor. The caller must hold the monitor exclusively for the whole cycle
//! (the pool uses a per-monitor mutex); the cycle either completes with a
//! fully fetched and compared snapshot, or leaves the monitor's state
//! reflecting no progress.
//!
//! Every outcome lands in monitor state or an event — transient errors and
//! crawl anomalies burn retry budget, hard failures and exhausted budgets
//! raise a failure event, diffs raise a change event. Nothing is silently
//! dropped.

use std::time::{Duration, Instant};

use chrono::{NaiveDate, Utc};

use crate::compare::{compare, CompareResult, ShrinkGuard};
use crate::error::WatchResult;
use crate::event::{
    AlertEvent, AlertReason, ChangeEvent, Event, EventId, EventKind, FailureEvent, FailureReason,
    ReviewEvent, ReviewReason, SessionId,
};
use crate::fetch::{CancelToken, FetchError, FetchRequest, Fetcher};
use crate::monitor::{FailureOutcome, Monitor};
use crate::notify::{EventNotice, EventSink};
use crate::snapshot::Snapshot;
use crate::storage::{ContentLookup, EventStore};
use crate::teaser::Teaser;

/// Tunables for a check cycle.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Deadline for the fetch step.
    pub fetch_timeout: Duration,
    /// Transient failures tolerated before a failure event is raised.
    pub max_retries: u32,
    /// Shrinkage-guard override; `None` applies the per-kind default.
    pub shrink_guard: Option<ShrinkGuard>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            fetch_timeout: Duration::from_secs(30),
            max_retries: 3,
            shrink_guard: None,
        }
    }
}

/// Collaborators for a check cycle.
pub struct CheckContext<'a> {
    /// The crawler producing teaser listings.
    pub fetcher: &'a dyn Fetcher,
    /// Fallback lookup for ambiguous diffs.
    pub lookup: Option<&'a dyn ContentLookup>,
    /// Event persistence.
    pub events: &'a dyn EventStore,
    /// Notification observer.
    pub sink: &'a dyn EventSink,
    /// Cycle tunables.
    pub config: &'a RunnerConfig,
    /// Crawl session, stamped onto failure events.
    pub session: SessionId,
}

/// What one check cycle did.
#[derive(Debug, Clone, PartialEq)]
pub enum CheckOutcome {
    /// Fetched and compared; no material change.
    Unchanged,

    /// Material difference; a change event was raised.
    Changed {
        /// The new change event.
        event_id: EventId,
    },

    /// Material difference, but an unresolved event already covers the
    /// monitor; no duplicate was raised.
    ChangePending,

    /// Abnormal item-count collapse; burned retry budget instead of
    /// reporting a false mass-deletion diff.
    Anomaly {
        /// Shrinkage relative to the stored listing, in percent.
        decrease_pct: f64,
    },

    /// Transient failure below the retry ceiling.
    Retrying {
        /// Consecutive failed attempts so far.
        attempt: u32,
    },

    /// Hard failure or exhausted retry budget.
    Failed {
        /// The raised failure event; `None` when an earlier unresolved
        /// event still owns the monitor.
        event_id: Option<EventId>,
    },
}

/// Runs one fetch+compare+transition cycle.
///
/// # Errors
/// Propagates the execution guard ([`crate::error::StateError`]) and
/// storage/snapshot errors. On any propagated error the monitor is reverted
/// out of `Executing` first.
pub fn run_check(monitor: &mut Monitor, ctx: &CheckContext<'_>) -> WatchResult<CheckOutcome> {
    monitor.begin_execution(Utc::now())?;
    let timer = Instant::now();

    match execute_cycle(monitor, ctx, timer) {
        Ok(outcome) => Ok(outcome),
        Err(err) => {
            monitor.abort_execution();
            Err(err)
        }
    }
}

fn execute_cycle(
    monitor: &mut Monitor,
    ctx: &CheckContext<'_>,
    timer: Instant,
) -> WatchResult<CheckOutcome> {
    let request = FetchRequest::for_monitor(monitor);
    let cancel = CancelToken::with_timeout(ctx.config.fetch_timeout);
    let fetched = ctx.fetcher.fetch(&request, &cancel);
    #[allow(clippy::cast_possible_truncation)]
    let elapsed_ms = timer.elapsed().as_millis() as u64;

    let fetched = match fetched {
        // A fetcher that returned despite a fired deadline still missed it.
        Ok(_) if cancel.is_cancelled() => {
            return handle_fetch_error(
                monitor,
                ctx,
                &FetchError::Timeout {
                    duration_ms: elapsed_ms,
                },
            );
        }
        Ok(outcome) => outcome,
        Err(err) => return handle_fetch_error(monitor, ctx, &err),
    };

    // The fetcher already received the constraints; re-apply them so a
    // non-conforming crawler cannot widen a listing.
    let teasers = match constrain(&fetched.teasers, monitor) {
        Ok(teasers) => teasers,
        Err(err) => {
            monitor.fail(format!("invalid keyword pattern: {err}"));
            let event_id = raise_failure(monitor, ctx, FailureReason::Defective)?;
            return Ok(CheckOutcome::Failed { event_id });
        }
    };

    let latest = Snapshot::new(monitor.kind, teasers);
    let guard = ctx
        .config
        .shrink_guard
        .unwrap_or_else(|| ShrinkGuard::for_kind(monitor.kind));

    match compare(&monitor.snapshot, &latest, ctx.lookup, guard)? {
        CompareResult::Unchanged { snapshot } => {
            monitor.complete_execution(snapshot, elapsed_ms, fetched.page_title, Utc::now());
            Ok(CheckOutcome::Unchanged)
        }

        CompareResult::Changed {
            snapshot,
            difference_pct,
            ..
        } => {
            let before = monitor.snapshot.to_document();
            let after = snapshot.to_document();
            monitor.complete_execution(snapshot, elapsed_ms, fetched.page_title, Utc::now());

            if !monitor.can_open(EventKind::Change) {
                return Ok(CheckOutcome::ChangePending);
            }

            let event = ChangeEvent::new(monitor, before, after, difference_pct, elapsed_ms);
            let event_id = event.id;
            ctx.events.insert(Event::Change(event.clone()))?;
            monitor.mark_changed(&event);
            ctx.sink.event_raised(EventNotice::new(
                monitor,
                EventKind::Change,
                format!("{difference_pct:.1}% difference"),
            ));
            Ok(CheckOutcome::Changed { event_id })
        }

        CompareResult::Anomaly { decrease_pct } => {
            let message = format!("abnormal decrease of {decrease_pct:.1}% in fetched items");
            match monitor.record_failure(message, ctx.config.max_retries) {
                FailureOutcome::Retrying { .. } => Ok(CheckOutcome::Anomaly { decrease_pct }),
                FailureOutcome::Exhausted => {
                    let event_id = raise_failure(monitor, ctx, FailureReason::Defective)?;
                    Ok(CheckOutcome::Failed { event_id })
                }
            }
        }
    }
}

fn handle_fetch_error(
    monitor: &mut Monitor,
    ctx: &CheckContext<'_>,
    err: &FetchError,
) -> WatchResult<CheckOutcome> {
    if !err.is_retryable() {
        // Missing source configuration: no retry will fix this.
        monitor.fail(err.to_string());
        let event_id = raise_failure(monitor, ctx, FailureReason::Defective)?;
        return Ok(CheckOutcome::Failed { event_id });
    }

    match monitor.record_failure(err.to_string(), ctx.config.max_retries) {
        FailureOutcome::Retrying { attempt } => Ok(CheckOutcome::Retrying { attempt }),
        FailureOutcome::Exhausted => {
            let event_id = raise_failure(monitor, ctx, failure_reason(err))?;
            Ok(CheckOutcome::Failed { event_id })
        }
    }
}

fn failure_reason(err: &FetchError) -> FailureReason {
    match err {
        FetchError::Timeout { .. } | FetchError::Cancelled => FailureReason::Hanging,
        FetchError::AccessDenied { .. } => FailureReason::AccessDenied,
        FetchError::Network { .. } => FailureReason::Intermittent,
        FetchError::Parse { .. } | FetchError::SourceMissing { .. } => FailureReason::Defective,
    }
}

fn raise_failure(
    monitor: &mut Monitor,
    ctx: &CheckContext<'_>,
    reason: FailureReason,
) -> WatchResult<Option<EventId>> {
    if !monitor.can_open(EventKind::Failure) {
        return Ok(None);
    }
    let event = FailureEvent::new(monitor, reason, Utc::now().date_naive(), ctx.session);
    let event_id = event.id;
    ctx.events.insert(Event::Failure(event.clone()))?;
    monitor.mark_failed(&event);
    ctx.sink
        .event_raised(EventNotice::new(monitor, EventKind::Failure, reason.to_string()));
    Ok(Some(event_id))
}

fn constrain(teasers: &[Teaser], monitor: &Monitor) -> Result<Vec<Teaser>, regex::Error> {
    let mut out: Vec<Teaser> = match monitor.keyword_regex()? {
        Some(re) => teasers
            .iter()
            .filter(|t| re.is_match(&t.title))
            .cloned()
            .collect(),
        None => teasers.to_vec(),
    };
    if let Some(cap) = monitor.max_results {
        out.truncate(cap);
    }
    Ok(out)
}

/// Raises an alert on a monitor, out of band.
///
/// Returns `Ok(None)` without creating anything when an unresolved event
/// already covers the monitor.
///
/// # Errors
/// Propagates event-store errors.
pub fn raise_alert(
    monitor: &mut Monitor,
    reason: AlertReason,
    effective_date: NaiveDate,
    events: &dyn EventStore,
    sink: &dyn EventSink,
) -> WatchResult<Option<EventId>> {
    if !monitor.can_open(EventKind::Alert) {
        return Ok(None);
    }
    let event = AlertEvent::new(monitor, reason, effective_date);
    let event_id = event.id;
    events.insert(Event::Alert(event.clone()))?;
    monitor.mark_alert(&event);
    sink.event_raised(EventNotice::new(monitor, EventKind::Alert, reason.to_string()));
    Ok(Some(event_id))
}

/// Flags a monitor's source for manual review, out of band.
///
/// Returns `Ok(None)` without creating anything when an unresolved event
/// already covers the monitor.
///
/// # Errors
/// Propagates event-store errors.
pub fn flag_review(
    monitor: &mut Monitor,
    reason: ReviewReason,
    review_date: NaiveDate,
    events: &dyn EventStore,
    sink: &dyn EventSink,
) -> WatchResult<Option<EventId>> {
    if !monitor.can_open(EventKind::Review) {
        return Ok(None);
    }
    let event = ReviewEvent::new(monitor, reason, review_date);
    let event_id = event.id;
    events.insert(Event::Review(event.clone()))?;
    monitor.mark_review(&event);
    sink.event_raised(EventNotice::new(monitor, EventKind::Review, reason.to_string()));
    Ok(Some(event_id))
}

/// Resolves an event and releases its monitor.
///
/// Only the event currently referenced by the monitor can release it; a
/// stale or foreign event is a no-op returning false — the condition is
/// treated as already resolved by someone else. On success the event moves
/// to its terminal status and is persisted, and the monitor is left in
/// `Resuming`.
///
/// # Errors
/// Propagates event-store errors.
pub fn resolve_event(
    monitor: &mut Monitor,
    event: &mut Event,
    user: Option<&str>,
    events: &dyn EventStore,
) -> WatchResult<bool> {
    if event.monitor_id() != monitor.id {
        return Ok(false);
    }
    if !monitor.clear_event(event.kind(), event.id()) {
        return Ok(false);
    }
    event.resolve(user);
    events.update(event.clone())?;
    Ok(true)
}
