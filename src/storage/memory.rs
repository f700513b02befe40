//! In-memory storage backend.
//!
//! Thread-safe in-memory implementations of the storage traits. Intended for
//! embedded usage, tests, and as a reference implementation.

use std::collections::HashMap;
use std::sync::RwLock;

use crate::event::{Event, EventId};
use crate::monitor::{Monitor, MonitorId};
use crate::storage::traits::{
    ContentLookup, ContentStore, EventStore, MonitorStore, StorageError, StoredContent,
};

fn lock_err(context: &'static str) -> StorageError {
    StorageError::BackendError(format!("poisoned lock: {context}"))
}

fn normalize_key(s: &str) -> String {
    s.trim().to_lowercase()
}

/// In-memory content records, indexed by identifier and normalized title.
#[derive(Debug, Default)]
pub struct InMemoryContentStore {
    inner: RwLock<ContentState>,
}

#[derive(Debug, Default)]
struct ContentState {
    by_ident: HashMap<String, StoredContent>,
    title_to_ident: HashMap<String, String>,
}

impl InMemoryContentStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl ContentLookup for InMemoryContentStore {
    fn find_by_title(&self, title: &str) -> Result<Option<StoredContent>, StorageError> {
        let state = self.inner.read().map_err(|_| lock_err("content.read"))?;
        Ok(state
            .title_to_ident
            .get(&normalize_key(title))
            .and_then(|ident| state.by_ident.get(ident))
            .cloned())
    }

    fn find_by_ident(&self, ident: &str) -> Result<Option<StoredContent>, StorageError> {
        let state = self.inner.read().map_err(|_| lock_err("content.read"))?;
        Ok(state.by_ident.get(ident).cloned())
    }
}

impl ContentStore for InMemoryContentStore {
    fn upsert(&self, content: StoredContent) -> Result<(), StorageError> {
        let mut state = self.inner.write().map_err(|_| lock_err("content.write"))?;

        // A replaced record may have been retitled; drop its old title key.
        if let Some(previous) = state.by_ident.get(&content.ident) {
            let old_key = normalize_key(&previous.title);
            state.title_to_ident.remove(&old_key);
        }

        state
            .title_to_ident
            .insert(normalize_key(&content.title), content.ident.clone());
        state.by_ident.insert(content.ident.clone(), content);
        Ok(())
    }
}

/// In-memory monitor records.
#[derive(Debug, Default)]
pub struct InMemoryMonitorStore {
    inner: RwLock<HashMap<MonitorId, Monitor>>,
}

impl InMemoryMonitorStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl MonitorStore for InMemoryMonitorStore {
    fn insert(&self, monitor: Monitor) -> Result<(), StorageError> {
        let mut map = self.inner.write().map_err(|_| lock_err("monitor.write"))?;
        if map.contains_key(&monitor.id) {
            return Err(StorageError::DuplicateKey(monitor.id.to_string()));
        }
        map.insert(monitor.id, monitor);
        Ok(())
    }

    fn get(&self, id: MonitorId) -> Result<Option<Monitor>, StorageError> {
        let map = self.inner.read().map_err(|_| lock_err("monitor.read"))?;
        Ok(map.get(&id).cloned())
    }

    fn update(&self, monitor: Monitor) -> Result<(), StorageError> {
        let mut map = self.inner.write().map_err(|_| lock_err("monitor.write"))?;
        if !map.contains_key(&monitor.id) {
            return Err(StorageError::MonitorNotFound(monitor.id));
        }
        map.insert(monitor.id, monitor);
        Ok(())
    }

    fn find_by_org(&self, org_code: &str) -> Result<Vec<Monitor>, StorageError> {
        let map = self.inner.read().map_err(|_| lock_err("monitor.read"))?;
        let mut found: Vec<Monitor> = map
            .values()
            .filter(|m| m.org_code == org_code)
            .cloned()
            .collect();
        found.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(found)
    }

    fn list_enabled(&self) -> Result<Vec<Monitor>, StorageError> {
        let map = self.inner.read().map_err(|_| lock_err("monitor.read"))?;
        let mut found: Vec<Monitor> = map.values().filter(|m| m.enabled).cloned().collect();
        found.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(found)
    }
}

/// In-memory event records.
#[derive(Debug, Default)]
pub struct InMemoryEventStore {
    inner: RwLock<HashMap<EventId, Event>>,
}

impl InMemoryEventStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl EventStore for InMemoryEventStore {
    fn insert(&self, event: Event) -> Result<(), StorageError> {
        let mut map = self.inner.write().map_err(|_| lock_err("event.write"))?;
        if map.contains_key(&event.id()) {
            return Err(StorageError::DuplicateKey(event.id().to_string()));
        }
        map.insert(event.id(), event);
        Ok(())
    }

    fn get(&self, id: EventId) -> Result<Option<Event>, StorageError> {
        let map = self.inner.read().map_err(|_| lock_err("event.read"))?;
        Ok(map.get(&id).cloned())
    }

    fn update(&self, event: Event) -> Result<(), StorageError> {
        let mut map = self.inner.write().map_err(|_| lock_err("event.write"))?;
        if !map.contains_key(&event.id()) {
            return Err(StorageError::EventNotFound(event.id()));
        }
        map.insert(event.id(), event);
        Ok(())
    }

    fn find_by_monitor(&self, monitor_id: MonitorId) -> Result<Vec<Event>, StorageError> {
        let map = self.inner.read().map_err(|_| lock_err("event.read"))?;
        let mut found: Vec<Event> = map
            .values()
            .filter(|e| e.monitor_id() == monitor_id)
            .cloned()
            .collect();
        found.sort_by_key(Event::created_at);
        Ok(found)
    }

    fn find_open(&self) -> Result<Vec<Event>, StorageError> {
        let map = self.inner.read().map_err(|_| lock_err("event.read"))?;
        let mut found: Vec<Event> = map.values().filter(|e| e.is_open()).cloned().collect();
        found.sort_by_key(Event::created_at);
        Ok(found)
    }
}

/// Bundle of all in-memory stores.
#[derive(Debug, Default)]
pub struct InMemoryStores {
    /// Content records.
    pub contents: InMemoryContentStore,
    /// Monitor records.
    pub monitors: InMemoryMonitorStore,
    /// Event records.
    pub events: InMemoryEventStore,
}

impl InMemoryStores {
    /// Creates an empty bundle.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{AlertEvent, AlertReason};
    use crate::teaser::ContentKind;
    use chrono::NaiveDate;

    #[test]
    fn content_store_resolves_both_keys() {
        let store = InMemoryContentStore::new();
        store
            .upsert(StoredContent::new("Annual Report", "https://example.org/report"))
            .unwrap();

        let by_title = store.find_by_title("  annual report ").unwrap().unwrap();
        assert_eq!(by_title.ident, "https://example.org/report");

        let by_ident = store.find_by_ident("https://example.org/report").unwrap().unwrap();
        assert_eq!(by_ident.title, "Annual Report");

        assert!(store.find_by_title("unknown").unwrap().is_none());
    }

    #[test]
    fn content_upsert_replaces_old_title_key() {
        let store = InMemoryContentStore::new();
        store.upsert(StoredContent::new("Old title", "u1")).unwrap();
        store.upsert(StoredContent::new("New title", "u1")).unwrap();

        assert!(store.find_by_title("Old title").unwrap().is_none());
        assert_eq!(
            store.find_by_title("New title").unwrap().unwrap().ident,
            "u1"
        );
    }

    #[test]
    fn monitor_store_rejects_duplicates_and_missing_updates() {
        let store = InMemoryMonitorStore::new();
        let monitor = Monitor::new("acme", ContentKind::Page, "newsroom");

        store.insert(monitor.clone()).unwrap();
        assert!(matches!(
            store.insert(monitor.clone()),
            Err(StorageError::DuplicateKey(_))
        ));

        let ghost = Monitor::new("acme", ContentKind::Page, "ghost");
        assert!(matches!(
            store.update(ghost),
            Err(StorageError::MonitorNotFound(_))
        ));

        let fetched = store.get(monitor.id).unwrap().unwrap();
        assert_eq!(fetched.name, "newsroom");
    }

    #[test]
    fn monitor_store_filters_by_org_and_enabled() {
        let store = InMemoryMonitorStore::new();
        let a = Monitor::new("acme", ContentKind::Page, "alpha");
        let mut b = Monitor::new("acme", ContentKind::Page, "beta");
        b.set_enabled(false);
        let c = Monitor::new("globex", ContentKind::Video, "channel");

        store.insert(a).unwrap();
        store.insert(b).unwrap();
        store.insert(c).unwrap();

        let acme = store.find_by_org("acme").unwrap();
        assert_eq!(acme.len(), 2);
        assert_eq!(acme[0].name, "alpha");

        let enabled = store.list_enabled().unwrap();
        assert_eq!(enabled.len(), 2);
        assert!(enabled.iter().all(|m| m.enabled));
    }

    #[test]
    fn event_store_orders_by_creation_time() {
        let store = InMemoryEventStore::new();
        let monitor = Monitor::new("acme", ContentKind::Page, "newsroom");
        let date = NaiveDate::from_ymd_opt(2026, 5, 1).unwrap();

        let first = Event::Alert(AlertEvent::new(&monitor, AlertReason::Inactivity, date));
        let mut second = Event::Alert(AlertEvent::new(&monitor, AlertReason::Manual, date));
        if let Event::Alert(e) = &mut second {
            e.created_at = e.created_at + chrono::Duration::seconds(1);
        }

        store.insert(second.clone()).unwrap();
        store.insert(first.clone()).unwrap();

        let ordered = store.find_by_monitor(monitor.id).unwrap();
        assert_eq!(ordered.len(), 2);
        assert_eq!(ordered[0].id(), first.id());
        assert_eq!(ordered[1].id(), second.id());

        // Resolving removes the event from the open set.
        let mut resolved = first;
        resolved.resolve(Some("op"));
        store.update(resolved).unwrap();
        let open = store.find_open().unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].id(), second.id());
    }
}
