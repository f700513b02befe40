//! Notification observer interface.
//!
//! The core does not format or send anything. Event creation is observable
//! through [`EventSink`]; an external notifier composes the human-readable
//! message from the [`EventNotice`] fields.

use std::sync::Mutex;

use chrono::{DateTime, Utc};

use crate::event::EventKind;
use crate::monitor::Monitor;

/// Summary of a freshly raised event, handed to the notifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventNotice {
    /// Organisation code of the owning monitor.
    pub org_code: String,
    /// Composite GUID of the monitor (`kind-org-name`).
    pub guid: String,
    /// Kind of the raised event.
    pub kind: EventKind,
    /// Reason or status text, kind-specific.
    pub label: String,
    /// When the event was raised.
    pub timestamp: DateTime<Utc>,
}

impl EventNotice {
    /// Builds a notice for an event just raised on `monitor`.
    #[must_use]
    pub fn new(monitor: &Monitor, kind: EventKind, label: impl Into<String>) -> Self {
        Self {
            org_code: monitor.org_code.clone(),
            guid: monitor.guid(),
            kind,
            label: label.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Observer for event creation.
///
/// Implementations must tolerate concurrent calls from multiple check
/// workers.
pub trait EventSink: Send + Sync {
    /// Called once per created event, after it was stored.
    fn event_raised(&self, notice: EventNotice);
}

/// Sink that discards all notices.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EventSink for NullSink {
    fn event_raised(&self, _notice: EventNotice) {}
}

/// Sink that buffers notices in memory; for tests and embedded use.
#[derive(Debug, Default)]
pub struct CollectingSink {
    notices: Mutex<Vec<EventNotice>>,
}

impl CollectingSink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Drains and returns everything collected so far.
    #[must_use]
    pub fn take(&self) -> Vec<EventNotice> {
        match self.notices.lock() {
            Ok(mut guard) => std::mem::take(&mut *guard),
            Err(_) => Vec::new(),
        }
    }

    /// Number of buffered notices.
    #[must_use]
    pub fn len(&self) -> usize {
        self.notices.lock().map(|g| g.len()).unwrap_or(0)
    }

    /// Returns true if nothing was collected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl EventSink for CollectingSink {
    fn event_raised(&self, notice: EventNotice) {
        if let Ok(mut guard) = self.notices.lock() {
            guard.push(notice);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::teaser::ContentKind;

    #[test]
    fn notice_carries_monitor_identity() {
        let monitor = Monitor::new("acme", ContentKind::Video, "channel");
        let notice = EventNotice::new(&monitor, EventKind::Alert, "unreachable");
        assert_eq!(notice.org_code, "acme");
        assert_eq!(notice.guid, "video-acme-channel");
        assert_eq!(notice.label, "unreachable");
    }

    #[test]
    fn collecting_sink_buffers_and_drains() {
        let monitor = Monitor::new("acme", ContentKind::Page, "newsroom");
        let sink = CollectingSink::new();
        assert!(sink.is_empty());

        sink.event_raised(EventNotice::new(&monitor, EventKind::Change, "12.5% difference"));
        sink.event_raised(EventNotice::new(&monitor, EventKind::Failure, "hanging"));
        assert_eq!(sink.len(), 2);

        let drained = sink.take();
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0].kind, EventKind::Change);
        assert!(sink.is_empty());
    }
}
