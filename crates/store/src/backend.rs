//! Storage backend seam for the event store.
//!
//! The production backend is an in-process arena indexed by event id with a
//! secondary (client, month) index. The trait exists so tests can wrap it
//! with fault injection and exercise the retry and rollback paths; a future
//! remote document store would slot in here as well.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use async_trait::async_trait;

use cadence_core::error::CoreError;
use cadence_core::event::CalendarEvent;
use cadence_core::types::{EventId, YearMonth};

/// Keyed document storage for calendar events.
///
/// Implementations must be safe for concurrent use. Failures a caller should
/// retry are reported as `CoreError::TransientStore`.
#[async_trait]
pub trait StoreBackend: Send + Sync {
    /// Insert or replace one event by id.
    async fn put(&self, event: CalendarEvent) -> Result<(), CoreError>;

    /// Remove exactly one event, returning it if it existed.
    async fn delete(&self, id: EventId) -> Result<Option<CalendarEvent>, CoreError>;

    /// Fetch one event by id.
    async fn get(&self, id: EventId) -> Result<Option<CalendarEvent>, CoreError>;

    /// Fetch all events for one (client, month) scope, unordered.
    async fn list(&self, client_id: &str, month: YearMonth) -> Result<Vec<CalendarEvent>, CoreError>;

    /// Dump every stored event (persistence snapshots).
    async fn dump(&self) -> Result<Vec<CalendarEvent>, CoreError>;

    /// Replace the entire contents (startup restore).
    async fn restore(&self, events: Vec<CalendarEvent>) -> Result<(), CoreError>;
}

/// Scope key for the secondary index.
fn scope_of(event: &CalendarEvent) -> (String, YearMonth) {
    use chrono::Datelike;
    (
        event.client_id.clone(),
        YearMonth {
            year: event.scheduled_at.year(),
            month: event.scheduled_at.month(),
        },
    )
}

/// In-process backend: arena by event id plus a (client, month) index.
#[derive(Default)]
pub struct MemoryBackend {
    inner: RwLock<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    arena: HashMap<EventId, CalendarEvent>,
    index: HashMap<(String, YearMonth), HashSet<EventId>>,
}

impl MemoryInner {
    fn unindex(&mut self, event: &CalendarEvent) {
        let key = scope_of(event);
        if let Some(ids) = self.index.get_mut(&key) {
            ids.remove(&event.id);
            if ids.is_empty() {
                self.index.remove(&key);
            }
        }
    }

    fn insert(&mut self, event: CalendarEvent) {
        // A date edit can move the event across months; drop the old index
        // entry before inserting the new one.
        if let Some(previous) = self.arena.get(&event.id).cloned() {
            self.unindex(&previous);
        }
        self.index
            .entry(scope_of(&event))
            .or_default()
            .insert(event.id);
        self.arena.insert(event.id, event);
    }
}

#[async_trait]
impl StoreBackend for MemoryBackend {
    async fn put(&self, event: CalendarEvent) -> Result<(), CoreError> {
        let mut inner = self
            .inner
            .write()
            .map_err(|_| CoreError::TransientStore("store lock poisoned".into()))?;
        inner.insert(event);
        Ok(())
    }

    async fn delete(&self, id: EventId) -> Result<Option<CalendarEvent>, CoreError> {
        let mut inner = self
            .inner
            .write()
            .map_err(|_| CoreError::TransientStore("store lock poisoned".into()))?;
        let removed = inner.arena.remove(&id);
        if let Some(event) = &removed {
            let event = event.clone();
            inner.unindex(&event);
        }
        Ok(removed)
    }

    async fn get(&self, id: EventId) -> Result<Option<CalendarEvent>, CoreError> {
        let inner = self
            .inner
            .read()
            .map_err(|_| CoreError::TransientStore("store lock poisoned".into()))?;
        Ok(inner.arena.get(&id).cloned())
    }

    async fn list(&self, client_id: &str, month: YearMonth) -> Result<Vec<CalendarEvent>, CoreError> {
        let inner = self
            .inner
            .read()
            .map_err(|_| CoreError::TransientStore("store lock poisoned".into()))?;
        let Some(ids) = inner.index.get(&(client_id.to_string(), month)) else {
            return Ok(Vec::new());
        };
        Ok(ids
            .iter()
            .filter_map(|id| inner.arena.get(id).cloned())
            .collect())
    }

    async fn dump(&self) -> Result<Vec<CalendarEvent>, CoreError> {
        let inner = self
            .inner
            .read()
            .map_err(|_| CoreError::TransientStore("store lock poisoned".into()))?;
        Ok(inner.arena.values().cloned().collect())
    }

    async fn restore(&self, events: Vec<CalendarEvent>) -> Result<(), CoreError> {
        let mut inner = self
            .inner
            .write()
            .map_err(|_| CoreError::TransientStore("store lock poisoned".into()))?;
        inner.arena.clear();
        inner.index.clear();
        for event in events {
            inner.insert(event);
        }
        Ok(())
    }
}
