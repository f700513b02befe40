//! Durable events raised by monitors.
//!
//! Events are explicit objects, not hidden errors. When a monitor detects a
//! material change, needs review, goes silent, or fails its retry budget, we
//! create an event record that tracks the condition and its resolution.
//!
//! Four concrete kinds share an owner/timestamp/status/reason shape:
//! [`ChangeEvent`], [`AlertEvent`], [`ReviewEvent`], [`FailureEvent`]. Each is
//! constructed from the raising monitor plus a seed and stamps its own id,
//! creation time, and back-reference. An event references its monitor by id
//! only; the monitor holds the forward pointer to its single open event.

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::monitor::{Monitor, MonitorId};

/// Unique identifier for an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(Uuid);

impl EventId {
    /// Creates a new random event ID.
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

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of one crawl session, attached to failure events so operators
/// can correlate against crawler logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Creates a new random session ID.
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

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The four event kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// Material content difference awaiting confirmation.
    Change,
    /// Source inactivity, suspension, or unreachability.
    Alert,
    /// Source flagged for manual review.
    Review,
    /// Fetch failure past the retry budget.
    Failure,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Change => write!(f, "change"),
            Self::Alert => write!(f, "alert"),
            Self::Review => write!(f, "review"),
            Self::Failure => write!(f, "failure"),
        }
    }
}

/// Status of a change event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeStatus {
    /// Awaiting operator confirmation.
    Open,
    /// Confirmed as a genuine change, not yet closed out.
    Confirmed,
    /// Dismissed without action.
    Skipped,
    /// Closed out.
    Resolved,
}

impl ChangeStatus {
    /// Returns true once the status is terminal.
    #[must_use]
    pub const fn is_closed(self) -> bool {
        matches!(self, Self::Skipped | Self::Resolved)
    }
}

/// Why an alert was raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertReason {
    /// The source has published nothing for its expected cadence.
    Inactivity,
    /// The source announced a suspension.
    Suspended,
    /// The source cannot be reached.
    Unreachable,
    /// Raised by an operator.
    Manual,
}

impl fmt::Display for AlertReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Inactivity => write!(f, "inactivity"),
            Self::Suspended => write!(f, "suspended"),
            Self::Unreachable => write!(f, "unreachable"),
            Self::Manual => write!(f, "manual"),
        }
    }
}

/// Status of an alert event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertStatus {
    /// Newly raised.
    Open,
    /// Seen by an operator.
    Acknowledged,
    /// Closed out.
    Closed,
}

impl AlertStatus {
    /// Returns true once the status is terminal.
    #[must_use]
    pub const fn is_closed(self) -> bool {
        matches!(self, Self::Closed)
    }
}

/// Why a source was flagged for review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewReason {
    /// Listing contents vary in ways the comparator cannot reconcile.
    Unreliable,
    /// The source page or channel appears broken.
    Broken,
    /// The source blocks the crawler.
    Blocked,
    /// Configuration needs verification against the live source.
    Verification,
    /// No specific reason recorded.
    Undefined,
}

impl fmt::Display for ReviewReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unreliable => write!(f, "unreliable"),
            Self::Broken => write!(f, "broken"),
            Self::Blocked => write!(f, "blocked"),
            Self::Verification => write!(f, "verification"),
            Self::Undefined => write!(f, "undefined"),
        }
    }
}

/// Status of a review event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewStatus {
    /// Waiting for a reviewer.
    Open,
    /// Review in progress.
    InReview,
    /// Review finished.
    Done,
    /// Dismissed without review.
    Skipped,
}

impl ReviewStatus {
    /// Returns true once the status is terminal.
    #[must_use]
    pub const fn is_closed(self) -> bool {
        matches!(self, Self::Done | Self::Skipped)
    }
}

/// Why a crawl failed past its retry budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// No specific cause identified.
    Undefined,
    /// Errors come and go between sessions.
    Intermittent,
    /// The source denies access.
    AccessDenied,
    /// Configuration needs verification against the live source.
    Verification,
    /// The source or its configuration is defective.
    Defective,
    /// Fetches hang until the deadline.
    Hanging,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Undefined => write!(f, "undefined"),
            Self::Intermittent => write!(f, "intermittent"),
            Self::AccessDenied => write!(f, "access_denied"),
            Self::Verification => write!(f, "verification"),
            Self::Defective => write!(f, "defective"),
            Self::Hanging => write!(f, "hanging"),
        }
    }
}

/// Status of a failure event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureStatus {
    /// Newly raised.
    Open,
    /// Cause identified, fix pending.
    Diagnosed,
    /// Closed out.
    Closed,
}

impl FailureStatus {
    /// Returns true once the status is terminal.
    #[must_use]
    pub const fn is_closed(self) -> bool {
        matches!(self, Self::Closed)
    }
}

/// A detected material difference between two snapshots.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeEvent {
    /// Unique identifier.
    pub id: EventId,
    /// When the event was created.
    pub created_at: DateTime<Utc>,
    /// When the event was last updated.
    pub updated_at: DateTime<Utc>,
    /// Organisation code of the owning monitor.
    pub org_code: String,
    /// The monitor that raised this event.
    pub monitor_id: MonitorId,
    /// Current status.
    pub status: ChangeStatus,
    /// Snapshot document before the change.
    pub before: serde_json::Value,
    /// Snapshot document after the change.
    pub after: serde_json::Value,
    /// Share of the latest listing that could not be reconciled, in percent.
    pub difference_pct: f64,
    /// Duration of the detecting check cycle, in milliseconds.
    pub execution_ms: u64,
    /// Free-text operator notes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// Username of the last updater.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_by: Option<String>,
}

impl ChangeEvent {
    /// Creates an open change event for `monitor`.
    #[must_use]
    pub fn new(
        monitor: &Monitor,
        before: serde_json::Value,
        after: serde_json::Value,
        difference_pct: f64,
        execution_ms: u64,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: EventId::new(),
            created_at: now,
            updated_at: now,
            org_code: monitor.org_code.clone(),
            monitor_id: monitor.id,
            status: ChangeStatus::Open,
            before,
            after,
            difference_pct,
            execution_ms,
            notes: None,
            updated_by: None,
        }
    }

    /// Moves the event to a new status, stamping the updater.
    pub fn set_status(&mut self, status: ChangeStatus, user: Option<&str>) {
        self.status = status;
        self.stamp(user);
    }

    /// Appends operator notes, stamping the updater.
    pub fn annotate(&mut self, notes: impl Into<String>, user: Option<&str>) {
        self.notes = Some(notes.into());
        self.stamp(user);
    }

    fn stamp(&mut self, user: Option<&str>) {
        self.updated_at = Utc::now();
        if let Some(user) = user {
            self.updated_by = Some(user.to_string());
        }
    }
}

/// An inactivity/suspension/unreachability alert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertEvent {
    /// Unique identifier.
    pub id: EventId,
    /// When the event was created.
    pub created_at: DateTime<Utc>,
    /// When the event was last updated.
    pub updated_at: DateTime<Utc>,
    /// Organisation code of the owning monitor.
    pub org_code: String,
    /// The monitor that raised this event.
    pub monitor_id: MonitorId,
    /// Current status.
    pub status: AlertStatus,
    /// Why the alert was raised.
    pub reason: AlertReason,
    /// When the condition takes (or took) effect.
    pub effective_date: NaiveDate,
    /// Free-text operator notes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// Username of the last updater.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_by: Option<String>,
}

impl AlertEvent {
    /// Creates an open alert for `monitor`.
    #[must_use]
    pub fn new(monitor: &Monitor, reason: AlertReason, effective_date: NaiveDate) -> Self {
        let now = Utc::now();
        Self {
            id: EventId::new(),
            created_at: now,
            updated_at: now,
            org_code: monitor.org_code.clone(),
            monitor_id: monitor.id,
            status: AlertStatus::Open,
            reason,
            effective_date,
            notes: None,
            updated_by: None,
        }
    }

    /// Moves the alert to a new status, stamping the updater.
    pub fn set_status(&mut self, status: AlertStatus, user: Option<&str>) {
        self.status = status;
        self.updated_at = Utc::now();
        if let Some(user) = user {
            self.updated_by = Some(user.to_string());
        }
    }
}

/// A request for manual review of a source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewEvent {
    /// Unique identifier.
    pub id: EventId,
    /// When the event was created.
    pub created_at: DateTime<Utc>,
    /// When the event was last updated.
    pub updated_at: DateTime<Utc>,
    /// Organisation code of the owning monitor.
    pub org_code: String,
    /// The monitor that raised this event.
    pub monitor_id: MonitorId,
    /// Current status.
    pub status: ReviewStatus,
    /// Why the review was requested.
    pub reason: ReviewReason,
    /// Date the review is due.
    pub review_date: NaiveDate,
    /// Free-text operator notes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// Username of the last updater.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_by: Option<String>,
}

impl ReviewEvent {
    /// Creates an open review request for `monitor`.
    #[must_use]
    pub fn new(monitor: &Monitor, reason: ReviewReason, review_date: NaiveDate) -> Self {
        let now = Utc::now();
        Self {
            id: EventId::new(),
            created_at: now,
            updated_at: now,
            org_code: monitor.org_code.clone(),
            monitor_id: monitor.id,
            status: ReviewStatus::Open,
            reason,
            review_date,
            notes: None,
            updated_by: None,
        }
    }

    /// Moves the review to a new status, stamping the updater.
    pub fn set_status(&mut self, status: ReviewStatus, user: Option<&str>) {
        self.status = status;
        self.updated_at = Utc::now();
        if let Some(user) = user {
            self.updated_by = Some(user.to_string());
        }
    }
}

/// A crawl failure past the retry budget.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureEvent {
    /// Unique identifier.
    pub id: EventId,
    /// When the event was created.
    pub created_at: DateTime<Utc>,
    /// When the event was last updated.
    pub updated_at: DateTime<Utc>,
    /// Organisation code of the owning monitor.
    pub org_code: String,
    /// The monitor that raised this event.
    pub monitor_id: MonitorId,
    /// Current status.
    pub status: FailureStatus,
    /// Failure classification.
    pub reason: FailureReason,
    /// Date the failure should be looked at.
    pub review_date: NaiveDate,
    /// Crawl session that produced the failure.
    pub session_id: SessionId,
    /// Free-text operator notes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// Username of the last updater.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_by: Option<String>,
}

impl FailureEvent {
    /// Creates an open failure record for `monitor`.
    #[must_use]
    pub fn new(
        monitor: &Monitor,
        reason: FailureReason,
        review_date: NaiveDate,
        session_id: SessionId,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: EventId::new(),
            created_at: now,
            updated_at: now,
            org_code: monitor.org_code.clone(),
            monitor_id: monitor.id,
            status: FailureStatus::Open,
            reason,
            review_date,
            session_id,
            notes: None,
            updated_by: None,
        }
    }

    /// Moves the failure to a new status, stamping the updater.
    pub fn set_status(&mut self, status: FailureStatus, user: Option<&str>) {
        self.status = status;
        self.updated_at = Utc::now();
        if let Some(user) = user {
            self.updated_by = Some(user.to_string());
        }
    }
}

/// Envelope carrying exactly one event kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Event {
    /// A change event.
    Change(ChangeEvent),
    /// An alert event.
    Alert(AlertEvent),
    /// A review event.
    Review(ReviewEvent),
    /// A failure event.
    Failure(FailureEvent),
}

impl Event {
    /// Event id.
    #[must_use]
    pub const fn id(&self) -> EventId {
        match self {
            Self::Change(e) => e.id,
            Self::Alert(e) => e.id,
            Self::Review(e) => e.id,
            Self::Failure(e) => e.id,
        }
    }

    /// Which of the four kinds this is.
    #[must_use]
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::Change(_) => EventKind::Change,
            Self::Alert(_) => EventKind::Alert,
            Self::Review(_) => EventKind::Review,
            Self::Failure(_) => EventKind::Failure,
        }
    }

    /// Owning monitor.
    #[must_use]
    pub const fn monitor_id(&self) -> MonitorId {
        match self {
            Self::Change(e) => e.monitor_id,
            Self::Alert(e) => e.monitor_id,
            Self::Review(e) => e.monitor_id,
            Self::Failure(e) => e.monitor_id,
        }
    }

    /// Organisation code of the owning monitor.
    #[must_use]
    pub fn org_code(&self) -> &str {
        match self {
            Self::Change(e) => &e.org_code,
            Self::Alert(e) => &e.org_code,
            Self::Review(e) => &e.org_code,
            Self::Failure(e) => &e.org_code,
        }
    }

    /// Creation time.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        match self {
            Self::Change(e) => e.created_at,
            Self::Alert(e) => e.created_at,
            Self::Review(e) => e.created_at,
            Self::Failure(e) => e.created_at,
        }
    }

    /// Current status as its serialized label.
    #[must_use]
    pub fn status_label(&self) -> String {
        let value = match self {
            Self::Change(e) => serde_json::to_value(e.status),
            Self::Alert(e) => serde_json::to_value(e.status),
            Self::Review(e) => serde_json::to_value(e.status),
            Self::Failure(e) => serde_json::to_value(e.status),
        };
        match value {
            Ok(serde_json::Value::String(s)) => s,
            _ => String::new(),
        }
    }

    /// Returns true while the status is not terminal.
    #[must_use]
    pub const fn is_open(&self) -> bool {
        match self {
            Self::Change(e) => !e.status.is_closed(),
            Self::Alert(e) => !e.status.is_closed(),
            Self::Review(e) => !e.status.is_closed(),
            Self::Failure(e) => !e.status.is_closed(),
        }
    }

    /// Moves the event to its resolved terminal status, stamping the updater.
    pub fn resolve(&mut self, user: Option<&str>) {
        match self {
            Self::Change(e) => e.set_status(ChangeStatus::Resolved, user),
            Self::Alert(e) => e.set_status(AlertStatus::Closed, user),
            Self::Review(e) => e.set_status(ReviewStatus::Done, user),
            Self::Failure(e) => e.set_status(FailureStatus::Closed, user),
        }
    }

    /// Moves the event to its skipped/dismissed terminal status.
    pub fn skip(&mut self, user: Option<&str>) {
        match self {
            Self::Change(e) => e.set_status(ChangeStatus::Skipped, user),
            Self::Alert(e) => e.set_status(AlertStatus::Closed, user),
            Self::Review(e) => e.set_status(ReviewStatus::Skipped, user),
            Self::Failure(e) => e.set_status(FailureStatus::Closed, user),
        }
    }
}
