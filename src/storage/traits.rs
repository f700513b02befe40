//! Abstract storage traits for sourcewatch.
//!
//! These traits define the contract that hosting applications implement.
//! By using traits, we enable:
//! - In-memory backends for testing and embedded use
//! - Database-backed backends in production
//! - Read-only lookup injection into the comparator, instead of a
//!   process-wide registry

use chrono::NaiveDate;
use thiserror::Error;

use crate::event::{Event, EventId};
use crate::monitor::{Monitor, MonitorId};

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Monitor not found.
    #[error("Monitor not found: {0}")]
    MonitorNotFound(MonitorId),

    /// Event not found.
    #[error("Event not found: {0}")]
    EventNotFound(EventId),

    /// Key already exists.
    #[error("Duplicate key: {0}")]
    DuplicateKey(String),

    /// Backend error.
    #[error("Storage backend error: {0}")]
    BackendError(String),

    /// Serialization failed.
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

/// Previously published content, as resolved by the fallback lookup.
///
/// Carries just enough of the stored record to support drift annotations:
/// the title, the type-specific identifier, and the published date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredContent {
    /// Stored title.
    pub title: String,
    /// Stored identifier (URL or video id).
    pub ident: String,
    /// Stored published date, when known.
    pub published: Option<NaiveDate>,
}

impl StoredContent {
    /// Creates a stored-content record without a published date.
    #[must_use]
    pub fn new(title: impl Into<String>, ident: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ident: ident.into(),
            published: None,
        }
    }

    /// Sets the published date.
    #[must_use]
    pub fn with_published(mut self, published: NaiveDate) -> Self {
        self.published = Some(published);
        self
    }
}

/// Fallback resolver for ambiguous diffs.
///
/// The comparator consults this lookup only for items it could not match by
/// exact key. It is read-only and may be queried concurrently by multiple
/// check workers without coordination.
pub trait ContentLookup: Send + Sync {
    /// Resolve stored content by exact title (case-insensitive, trimmed).
    fn find_by_title(&self, title: &str) -> Result<Option<StoredContent>, StorageError>;

    /// Resolve stored content by identifier (URL or video id).
    fn find_by_ident(&self, ident: &str) -> Result<Option<StoredContent>, StorageError>;
}

/// Storage trait for published content records.
pub trait ContentStore: ContentLookup {
    /// Insert or replace a content record, keyed by identifier.
    fn upsert(&self, content: StoredContent) -> Result<(), StorageError>;
}

/// Storage trait for monitors.
///
/// Callers persist the monitor after every state transition; storage is the
/// durable record, the in-process value is the working copy.
pub trait MonitorStore: Send + Sync {
    /// Insert a new monitor. Returns error if the ID already exists.
    fn insert(&self, monitor: Monitor) -> Result<(), StorageError>;

    /// Get a monitor by ID.
    fn get(&self, id: MonitorId) -> Result<Option<Monitor>, StorageError>;

    /// Update an existing monitor. Returns error if not found.
    fn update(&self, monitor: Monitor) -> Result<(), StorageError>;

    /// Find all monitors owned by an organisation.
    fn find_by_org(&self, org_code: &str) -> Result<Vec<Monitor>, StorageError>;

    /// List all enabled monitors.
    fn list_enabled(&self) -> Result<Vec<Monitor>, StorageError>;
}

/// Storage trait for events.
pub trait EventStore: Send + Sync {
    /// Insert a new event. Returns error if the ID already exists.
    fn insert(&self, event: Event) -> Result<(), StorageError>;

    /// Get an event by ID.
    fn get(&self, id: EventId) -> Result<Option<Event>, StorageError>;

    /// Update an existing event (status, notes, username stamp).
    fn update(&self, event: Event) -> Result<(), StorageError>;

    /// Find all events raised for a monitor, ordered by creation time.
    fn find_by_monitor(&self, monitor_id: MonitorId) -> Result<Vec<Event>, StorageError>;

    /// Find all open events, ordered by creation time.
    fn find_open(&self) -> Result<Vec<Event>, StorageError>;
}
