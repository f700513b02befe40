//! # sourcewatch - Content-Source Monitoring Core
//!
//! sourcewatch tracks external content sources (web pages, video channels,
//! event listings) on behalf of many organisations, periodically re-fetches a
//! normalized teaser listing from each source, and detects when the listing
//! has materially changed, gone silent, or become unreachable. Detected
//! conditions become durable, human-actionable events that drive a monitor's
//! lifecycle state.
//!
//! ## Core Concepts
//!
//! - **Teaser**: A minimal summary record (title, date, identifier) for one
//!   content item
//! - **Snapshot**: An immutable, ordered capture of teasers as fetched at one
//!   point in time
//! - **Monitor**: The persistent, stateful tracker of one organisation's one
//!   content source
//! - **Event**: One of Change/Alert/Review/Failure - a durable record that a
//!   monitor needs human attention
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use sourcewatch::{
//!     CheckPool, CheckPoolConfig, ContentKind, InMemoryStores, Monitor, NullSink,
//! };
//!
//! let stores = InMemoryStores::new();
//! let pool = CheckPool::new(
//!     CheckPoolConfig::default(),
//!     Arc::new(my_crawler),
//!     Some(Arc::new(stores.contents)),
//!     Arc::new(stores.monitors),
//!     Arc::new(stores.events),
//!     Arc::new(NullSink),
//! );
//!
//! let mut monitor = Monitor::new("acme", ContentKind::Page, "newsroom");
//! monitor.schedule(30);
//! pool.track(monitor.clone())?;
//!
//! // The external scheduler submits due monitors:
//! pool.try_submit(monitor.id)?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Core types
pub mod error;
pub mod event;
pub mod snapshot;
pub mod teaser;

// Comparison and reconciliation
pub mod compare;

// Collaborator interfaces
pub mod fetch;
pub mod notify;
pub mod storage;

// Monitor lifecycle and execution
pub mod monitor;

// Re-export primary types at crate root for convenience
pub use compare::{compare, CompareResult, ShrinkGuard, SHRINK_LIMIT_PCT};
pub use error::{StateError, WatchError, WatchResult};
pub use event::{
    AlertEvent, AlertReason, AlertStatus, ChangeEvent, ChangeStatus, Event, EventId, EventKind,
    FailureEvent, FailureReason, FailureStatus, ReviewEvent, ReviewReason, ReviewStatus, SessionId,
};
pub use fetch::{CancelToken, FetchError, FetchOutcome, FetchRequest, Fetcher};
pub use monitor::{
    flag_review, raise_alert, resolve_event, run_check, CheckContext, CheckOutcome, CheckPool,
    CheckPoolConfig, FailureOutcome, Monitor, MonitorId, MonitorState, OpenEvent, RunnerConfig,
};
pub use notify::{CollectingSink, EventNotice, EventSink, NullSink};
pub use snapshot::{Snapshot, SnapshotError};
pub use storage::{
    ContentLookup, ContentStore, EventStore, InMemoryContentStore, InMemoryEventStore,
    InMemoryMonitorStore, InMemoryStores, MonitorStore, StorageError, StoredContent,
};
pub use teaser::{ContentKind, Teaser};
