//! Storage abstraction for monitors, events, and published content.

/// In-memory reference implementations.
pub mod memory;
/// Storage trait definitions.
pub mod traits;

pub use memory::{InMemoryContentStore, InMemoryEventStore, InMemoryMonitorStore, InMemoryStores};
pub use traits::{
    ContentLookup, ContentStore, EventStore, MonitorStore, StorageError, StoredContent,
};
