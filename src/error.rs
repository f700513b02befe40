//! Error types for sourcewatch.
//!
//! All errors are strongly typed using thiserror. This enables pattern
//! matching on specific error conditions and keeps the retry policy explicit:
//! transient conditions are handled inside the check cycle, and only terminal
//! failures surface to an operator.

use thiserror::Error;

use crate::fetch::FetchError;
use crate::monitor::{MonitorId, MonitorState};
use crate::snapshot::SnapshotError;
use crate::storage::StorageError;

/// Lifecycle transition violations.
#[derive(Debug, Error)]
pub enum StateError {
    /// A check cycle is already in flight for this monitor.
    #[error("Monitor {id} is already executing")]
    AlreadyExecuting {
        /// The busy monitor.
        id: MonitorId,
    },

    /// The monitor is soft-disabled.
    #[error("Monitor {id} is disabled")]
    Disabled {
        /// The disabled monitor.
        id: MonitorId,
    },

    /// The monitor's current state does not permit execution.
    #[error("Monitor {id} cannot begin execution from state '{state}'")]
    NotRunnable {
        /// The rejected monitor.
        id: MonitorId,
        /// Its state at rejection time.
        state: MonitorState,
    },
}

/// Top-level error type for sourcewatch.
#[derive(Debug, Error)]
pub enum WatchError {
    /// Lifecycle transition violation.
    #[error("State error: {0}")]
    State(#[from] StateError),

    /// Fetcher failure.
    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// Storage failure.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Snapshot document failure.
    #[error("Snapshot error: {0}")]
    Snapshot(#[from] SnapshotError),

    /// The worker pool's job queue is full.
    #[error("Queue full: {path}")]
    QueueFull {
        /// Which queue rejected the job.
        path: String,
    },

    /// A worker channel disconnected.
    #[error("Disconnected: {path}")]
    Disconnected {
        /// Which channel went away.
        path: String,
    },

    /// Internal invariant violation.
    #[error("Internal error: {message}")]
    Internal {
        /// What went wrong.
        message: String,
    },
}

impl WatchError {
    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns true if this is a lifecycle error.
    #[must_use]
    pub const fn is_state(&self) -> bool {
        matches!(self, Self::State(_))
    }

    /// Returns true if this is a fetcher error.
    #[must_use]
    pub const fn is_fetch(&self) -> bool {
        matches!(self, Self::Fetch(_))
    }

    /// Returns true if this is a storage error.
    #[must_use]
    pub const fn is_storage(&self) -> bool {
        matches!(self, Self::Storage(_))
    }

    /// Returns true if this error is retryable.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::State(e) => matches!(e, StateError::AlreadyExecuting { .. }),
            Self::Fetch(e) => e.is_retryable(),
            Self::QueueFull { .. } => true,
            Self::Storage(_)
            | Self::Snapshot(_)
            | Self::Disconnected { .. }
            | Self::Internal { .. } => false,
        }
    }
}

/// Result type alias for sourcewatch operations.
pub type WatchResult<T> = Result<T, WatchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_error_display() {
        let err = StateError::AlreadyExecuting { id: MonitorId::new() };
        assert!(err.to_string().contains("already executing"));

        let err = StateError::NotRunnable {
            id: MonitorId::new(),
            state: MonitorState::New,
        };
        assert!(err.to_string().contains("'new'"));
    }

    #[test]
    fn test_watch_error_from_state() {
        let err: WatchError = StateError::Disabled { id: MonitorId::new() }.into();
        assert!(err.is_state());
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_watch_error_retryable() {
        // Busy monitors and full queues can be retried later.
        let busy: WatchError = StateError::AlreadyExecuting { id: MonitorId::new() }.into();
        assert!(busy.is_retryable());

        let full = WatchError::QueueFull {
            path: "check".to_string(),
        };
        assert!(full.is_retryable());

        // Missing source configuration cannot.
        let missing: WatchError = FetchError::SourceMissing {
            name: "newsroom".to_string(),
        }
        .into();
        assert!(missing.is_fetch());
        assert!(!missing.is_retryable());

        let timeout: WatchError = FetchError::Timeout { duration_ms: 100 }.into();
        assert!(timeout.is_retryable());
    }

    #[test]
    fn test_watch_error_internal() {
        let err = WatchError::internal("unexpected state");
        assert!(!err.is_retryable());
        assert!(err.to_string().contains("unexpected state"));
    }
}
