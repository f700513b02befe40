//! Monitor record and lifecycle state machine.
//!
//! A monitor holds the source configuration, the last stored snapshot, and
//! the current lifecycle state, and exposes every state transition as a
//! guarded operation. Transition guards protect two invariants: only one
//! execution is ever in flight per monitor, and at most one event is open at
//! a time — resolving an event requires presenting its exact kind and id, so
//! a stale event can never reset a monitor that has since moved on.

use std::fmt;

use chrono::{DateTime, Utc};
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::StateError;
use crate::event::{AlertEvent, ChangeEvent, EventId, EventKind, FailureEvent, ReviewEvent};
use crate::snapshot::Snapshot;
use crate::teaser::ContentKind;

/// Unique identifier for a monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MonitorId(Uuid);

impl MonitorId {
    /// Creates a new random monitor ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wrap an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for MonitorId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MonitorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle states of a monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MonitorState {
    /// Created, interval not yet attached.
    New,
    /// Scheduled; eligible for the next due check.
    Waiting,
    /// A check cycle is in flight.
    Executing,
    /// An unresolved change event is pending.
    Changed,
    /// An unresolved review request is pending.
    Review,
    /// An unresolved alert is pending.
    Alert,
    /// A transient failure occurred; retry budget not yet exhausted.
    Retrying,
    /// Retry budget exhausted or hard failure; needs human resolution.
    Error,
    /// Event resolved or restart issued; returning to the schedule.
    Resuming,
    /// Soft-disabled by configuration; scheduling suppressed.
    Disabled,
}

impl fmt::Display for MonitorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::New => "new",
            Self::Waiting => "waiting",
            Self::Executing => "executing",
            Self::Changed => "changed",
            Self::Review => "review",
            Self::Alert => "alert",
            Self::Retrying => "retrying",
            Self::Error => "error",
            Self::Resuming => "resuming",
            Self::Disabled => "disabled",
        };
        write!(f, "{label}")
    }
}

impl MonitorState {
    /// Returns true for states an operator must act on.
    #[must_use]
    pub const fn needs_attention(self) -> bool {
        matches!(self, Self::Changed | Self::Review | Self::Alert | Self::Error)
    }
}

/// Reference to the monitor's single open event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenEvent {
    /// Kind of the open event.
    pub kind: EventKind,
    /// Id of the open event.
    pub id: EventId,
}

/// Outcome of recording a transient failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureOutcome {
    /// Below the retry ceiling; the monitor stays schedulable.
    Retrying {
        /// Consecutive failed attempts so far.
        attempt: u32,
    },
    /// The ceiling was reached; the caller raises a failure event.
    Exhausted,
}

/// The stateful tracker of one organisation's one content source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Monitor {
    /// Unique identifier.
    pub id: MonitorId,
    /// Organisation code owning the source.
    pub org_code: String,
    /// Content kind of the source.
    pub kind: ContentKind,
    /// Human name of the source.
    pub name: String,
    /// Polling interval in minutes.
    pub interval_minutes: u32,
    /// Site scoping list; empty means all configured sites.
    pub sites: Vec<String>,
    /// Optional cap on fetched results.
    pub max_results: Option<usize>,
    /// Optional keyword pattern applied to teaser titles (case-insensitive).
    pub keyword: Option<String>,
    /// Active flag; false suppresses scheduling.
    pub enabled: bool,
    /// When the last check started.
    pub last_executed: Option<DateTime<Utc>>,
    /// When the last check succeeded.
    pub last_succeeded: Option<DateTime<Utc>>,
    /// Duration of the last check in milliseconds.
    pub last_duration_ms: Option<u64>,
    /// The last stored snapshot; empty until the first successful fetch.
    pub snapshot: Snapshot,
    /// Current lifecycle state.
    pub state: MonitorState,
    /// Reference to the currently open event, if any.
    pub open_event: Option<OpenEvent>,
    /// Message of the most recent failure.
    pub error_message: Option<String>,
    /// Consecutive transient-failure count.
    pub retries: u32,
    /// Title of the last crawled page.
    pub last_page_title: Option<String>,
}

impl Monitor {
    /// Default polling interval for new monitors, in minutes.
    pub const DEFAULT_INTERVAL_MINUTES: u32 = 60;

    /// Creates a monitor in the `New` state with an empty snapshot.
    #[must_use]
    pub fn new(org_code: impl Into<String>, kind: ContentKind, name: impl Into<String>) -> Self {
        Self {
            id: MonitorId::new(),
            org_code: org_code.into(),
            kind,
            name: name.into(),
            interval_minutes: Self::DEFAULT_INTERVAL_MINUTES,
            sites: Vec::new(),
            max_results: None,
            keyword: None,
            enabled: true,
            last_executed: None,
            last_succeeded: None,
            last_duration_ms: None,
            snapshot: Snapshot::empty(kind),
            state: MonitorState::New,
            open_event: None,
            error_message: None,
            retries: 0,
            last_page_title: None,
        }
    }

    /// Restricts fetching to the given sites.
    #[must_use]
    pub fn with_sites(mut self, sites: Vec<String>) -> Self {
        self.sites = sites;
        self
    }

    /// Caps the number of fetched results.
    #[must_use]
    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = Some(max_results);
        self
    }

    /// Sets the keyword filter pattern.
    #[must_use]
    pub fn with_keyword(mut self, keyword: impl Into<String>) -> Self {
        self.keyword = Some(keyword.into());
        self
    }

    /// Composite GUID: `{kind}-{org}-{name}`.
    #[must_use]
    pub fn guid(&self) -> String {
        format!("{}-{}-{}", self.kind.tag(), self.org_code, self.name)
    }

    /// Compiles the keyword filter, case-insensitive.
    ///
    /// # Errors
    /// Returns the regex error when the configured pattern is invalid;
    /// the runner treats that as a hard configuration failure.
    pub fn keyword_regex(&self) -> Result<Option<Regex>, regex::Error> {
        match &self.keyword {
            None => Ok(None),
            Some(pattern) => RegexBuilder::new(pattern)
                .case_insensitive(true)
                .build()
                .map(Some),
        }
    }

    /// Attaches the polling interval and makes the monitor schedulable.
    ///
    /// Only transitions out of `New`; on an already-scheduled monitor this
    /// just updates the interval.
    pub fn schedule(&mut self, interval_minutes: u32) {
        self.interval_minutes = interval_minutes;
        if self.state == MonitorState::New {
            self.state = MonitorState::Waiting;
        }
    }

    /// Returns true when a new event of `kind` may be opened.
    ///
    /// At most one event is open per monitor; a pending event of any kind
    /// blocks new ones until resolved.
    #[must_use]
    pub fn can_open(&self, _kind: EventKind) -> bool {
        self.open_event.is_none()
    }

    /// The attended state implied by the open event, if any.
    fn pending_state(&self) -> Option<MonitorState> {
        self.open_event.map(|open| match open.kind {
            EventKind::Change => MonitorState::Changed,
            EventKind::Alert => MonitorState::Alert,
            EventKind::Review => MonitorState::Review,
            EventKind::Failure => MonitorState::Error,
        })
    }

    /// Marks the start of a check cycle.
    ///
    /// Accepted from `Waiting`, `Retrying`, and the pending attended states
    /// (a monitor with an unresolved event keeps being checked; the event
    /// guards stop duplicates). Rejected while `Executing` — re-entrant
    /// checks must never run concurrently against the same monitor.
    ///
    /// # Errors
    /// [`StateError::AlreadyExecuting`] while a cycle is in flight,
    /// [`StateError::Disabled`] when disabled, and
    /// [`StateError::NotRunnable`] from `New`, `Error`, and `Resuming`.
    pub fn begin_execution(&mut self, now: DateTime<Utc>) -> Result<(), StateError> {
        if !self.enabled || self.state == MonitorState::Disabled {
            return Err(StateError::Disabled { id: self.id });
        }
        match self.state {
            MonitorState::Executing => Err(StateError::AlreadyExecuting { id: self.id }),
            MonitorState::Waiting
            | MonitorState::Retrying
            | MonitorState::Changed
            | MonitorState::Review
            | MonitorState::Alert => {
                self.state = MonitorState::Executing;
                self.last_executed = Some(now);
                Ok(())
            }
            state => Err(StateError::NotRunnable { id: self.id, state }),
        }
    }

    /// Records a fully fetched and compared cycle.
    ///
    /// Supersedes the stored snapshot, resets the retry budget, and returns
    /// to `Waiting` — unless an unresolved event still pins the monitor to
    /// its attended state.
    pub fn complete_execution(
        &mut self,
        snapshot: Snapshot,
        duration_ms: u64,
        page_title: Option<String>,
        now: DateTime<Utc>,
    ) {
        debug_assert_eq!(snapshot.kind(), self.kind);
        self.snapshot = snapshot;
        self.retries = 0;
        self.error_message = None;
        self.last_succeeded = Some(now);
        self.last_duration_ms = Some(duration_ms);
        self.last_page_title = page_title;
        self.state = self.pending_state().unwrap_or(MonitorState::Waiting);
    }

    /// Reverts `Executing` after a cycle that made no progress.
    ///
    /// Used when a cycle aborts on an unexpected error after the execution
    /// guard was taken; the monitor must not be left stuck in `Executing`.
    pub fn abort_execution(&mut self) {
        if self.state != MonitorState::Executing {
            return;
        }
        self.state = match self.pending_state() {
            Some(pending) => pending,
            None if self.retries > 0 => MonitorState::Retrying,
            None => MonitorState::Waiting,
        };
    }

    /// Transitions to `Changed`, referencing the new change event.
    ///
    /// Idempotent: when an event is already open the monitor keeps it and
    /// returns false — repeated detection of the same change never spawns a
    /// duplicate event.
    pub fn mark_changed(&mut self, event: &ChangeEvent) -> bool {
        if self.open_event.is_some() {
            self.state = self.pending_state().unwrap_or(self.state);
            return false;
        }
        self.open_event = Some(OpenEvent {
            kind: EventKind::Change,
            id: event.id,
        });
        self.state = MonitorState::Changed;
        true
    }

    /// Transitions to `Alert`, referencing the new alert event.
    ///
    /// Same idempotency guard as [`Monitor::mark_changed`].
    pub fn mark_alert(&mut self, event: &AlertEvent) -> bool {
        if self.open_event.is_some() {
            self.state = self.pending_state().unwrap_or(self.state);
            return false;
        }
        self.open_event = Some(OpenEvent {
            kind: EventKind::Alert,
            id: event.id,
        });
        self.state = MonitorState::Alert;
        true
    }

    /// Transitions to `Review`, referencing the new review event.
    ///
    /// Same idempotency guard as [`Monitor::mark_changed`].
    pub fn mark_review(&mut self, event: &ReviewEvent) -> bool {
        if self.open_event.is_some() {
            self.state = self.pending_state().unwrap_or(self.state);
            return false;
        }
        self.open_event = Some(OpenEvent {
            kind: EventKind::Review,
            id: event.id,
        });
        self.state = MonitorState::Review;
        true
    }

    /// References the failure event after the retry budget was exhausted.
    ///
    /// The monitor is already in `Error` by then (see
    /// [`Monitor::record_failure`] and [`Monitor::fail`]).
    pub fn mark_failed(&mut self, event: &FailureEvent) -> bool {
        if self.open_event.is_some() {
            return false;
        }
        self.open_event = Some(OpenEvent {
            kind: EventKind::Failure,
            id: event.id,
        });
        self.state = MonitorState::Error;
        true
    }

    /// Records a transient failure against the retry budget.
    ///
    /// Below `max_retries` the monitor moves to `Retrying` and stays
    /// schedulable; at the ceiling it moves to `Error` with the message
    /// stored, and the caller raises a failure event. The counter resets
    /// only on a subsequent successful execution.
    pub fn record_failure(&mut self, message: impl Into<String>, max_retries: u32) -> FailureOutcome {
        self.retries += 1;
        self.error_message = Some(message.into());
        if self.retries > max_retries {
            self.state = MonitorState::Error;
            FailureOutcome::Exhausted
        } else {
            self.state = MonitorState::Retrying;
            FailureOutcome::Retrying {
                attempt: self.retries,
            }
        }
    }

    /// Records a hard, non-retryable failure.
    pub fn fail(&mut self, message: impl Into<String>) {
        self.error_message = Some(message.into());
        self.state = MonitorState::Error;
    }

    /// Clears the open event, but only when `kind` and `id` both match.
    ///
    /// A mismatch is a no-op returning false: the presented event was
    /// superseded and the condition is treated as already resolved by
    /// someone else. On a match the monitor moves to `Resuming`.
    pub fn clear_event(&mut self, kind: EventKind, id: EventId) -> bool {
        match self.open_event {
            Some(open) if open.kind == kind && open.id == id => {
                self.open_event = None;
                self.error_message = None;
                self.state = MonitorState::Resuming;
                true
            }
            _ => false,
        }
    }

    /// Returns a `Resuming` monitor to the schedule.
    pub fn resume(&mut self) -> bool {
        if self.state == MonitorState::Resuming {
            self.state = MonitorState::Waiting;
            true
        } else {
            false
        }
    }

    /// Force-clears execution state after manual intervention.
    ///
    /// Discards the execution timestamp, open event, error message, and
    /// retry counter, returning to `Resuming`. Does not cancel a fetch
    /// already in flight, and does not re-enable a disabled monitor.
    pub fn restart(&mut self) {
        self.last_executed = None;
        self.open_event = None;
        self.error_message = None;
        self.retries = 0;
        if self.state != MonitorState::Disabled {
            self.state = MonitorState::Resuming;
        }
    }

    /// Soft-enables or -disables the monitor.
    ///
    /// Disabling suppresses scheduling regardless of other state; monitors
    /// are never hard-deleted while their source configuration exists.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        if enabled {
            if self.state == MonitorState::Disabled {
                self.state = MonitorState::Resuming;
            }
        } else {
            self.state = MonitorState::Disabled;
        }
    }
}
