//! The versioned calendar event store.
//!
//! Single source of truth for calendar events. Every mutation is surgical:
//! `put` and `delete` address exactly one event id, and no code path
//! re-derives "all events for the month" as part of a write. Each mutation
//! publishes one change to the feed with a process-wide monotonic sequence
//! number.
//!
//! Deletes are idempotent: removing an id that is already gone succeeds and
//! publishes nothing. Writes are last-writer-wins per event id, ordered by
//! the store-assigned `version`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use chrono::{Datelike, Utc};

use cadence_core::approval::EventSnapshot;
use cadence_core::error::CoreError;
use cadence_core::event::CalendarEvent;
use cadence_core::series::CampaignSeries;
use cadence_core::types::{EventId, SeriesId, YearMonth};
use cadence_events::{ChangeFeed, ChangeKind, EventChange, ScopedReceiver};

use crate::backend::{MemoryBackend, StoreBackend};

/// Versioned, change-feed-publishing storage for calendar events.
///
/// Shared via `Arc<EventStore>`; all methods take `&self`.
pub struct EventStore {
    backend: Arc<dyn StoreBackend>,
    feed: Arc<ChangeFeed>,
    seq: AtomicU64,
    /// Registered multi-day series. A `put` carrying an unknown series id is
    /// rejected so members cannot be created outside SeriesManager.
    series: RwLock<HashMap<SeriesId, CampaignSeries>>,
}

impl EventStore {
    pub fn new(backend: Arc<dyn StoreBackend>, feed: Arc<ChangeFeed>) -> Self {
        Self {
            backend,
            feed,
            seq: AtomicU64::new(0),
            series: RwLock::new(HashMap::new()),
        }
    }

    /// In-process store with a fresh feed, for tests and local runs.
    pub fn in_memory() -> Self {
        Self::new(
            Arc::new(MemoryBackend::default()),
            Arc::new(ChangeFeed::default()),
        )
    }

    /// The feed this store publishes to.
    pub fn feed(&self) -> Arc<ChangeFeed> {
        Arc::clone(&self.feed)
    }

    fn scope_of(event: &CalendarEvent) -> YearMonth {
        YearMonth {
            year: event.scheduled_at.year(),
            month: event.scheduled_at.month(),
        }
    }

    fn next_seq(&self) -> u64 {
        self.seq.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Insert or update one event (last-writer-wins by id).
    ///
    /// The store assigns `version` (previous + 1) and stamps `updated_at`,
    /// then publishes a single `Put` change. Returns the stored document.
    pub async fn put(&self, mut event: CalendarEvent) -> Result<CalendarEvent, CoreError> {
        event.validate()?;
        if let Some(series_id) = event.series_id {
            if !self.series_exists(series_id)? {
                return Err(CoreError::Validation(format!(
                    "event references unknown series {series_id}; series members are written through SeriesManager"
                )));
            }
        }

        let previous = self.backend.get(event.id).await?;
        event.version = previous.map(|p| p.version).unwrap_or(0) + 1;
        event.updated_at = Utc::now();

        self.backend.put(event.clone()).await?;

        self.feed.publish(EventChange {
            kind: ChangeKind::Put {
                event: event.clone(),
            },
            client_id: event.client_id.clone(),
            month: Self::scope_of(&event),
            seq: self.next_seq(),
            timestamp: event.updated_at,
        });

        tracing::debug!(
            event_id = %event.id,
            client = %event.client_id,
            version = event.version,
            "Event stored"
        );
        Ok(event)
    }

    /// Remove exactly the referenced event and emit one delete notification.
    ///
    /// Deleting an id that does not exist is a successful no-op: two clients
    /// racing to delete the same event both observe success.
    pub async fn delete(&self, id: EventId) -> Result<(), CoreError> {
        let Some(removed) = self.backend.delete(id).await? else {
            return Ok(());
        };

        self.feed.publish(EventChange {
            kind: ChangeKind::Delete { event_id: id },
            client_id: removed.client_id.clone(),
            month: Self::scope_of(&removed),
            seq: self.next_seq(),
            timestamp: Utc::now(),
        });

        tracing::debug!(event_id = %id, client = %removed.client_id, "Event deleted");
        Ok(())
    }

    /// Fetch one event by id.
    pub async fn get(&self, id: EventId) -> Result<Option<CalendarEvent>, CoreError> {
        self.backend.get(id).await
    }

    /// All events for one (client, month) scope, sorted by scheduled time.
    pub async fn list(
        &self,
        client_id: &str,
        month: YearMonth,
    ) -> Result<Vec<CalendarEvent>, CoreError> {
        let mut events = self.backend.list(client_id, month).await?;
        events.sort_by_key(|e| (e.scheduled_at, e.id));
        Ok(events)
    }

    /// Frozen projection of a scope, for approval-record creation.
    pub async fn snapshot(
        &self,
        client_id: &str,
        month: YearMonth,
    ) -> Result<Vec<EventSnapshot>, CoreError> {
        Ok(self
            .list(client_id, month)
            .await?
            .iter()
            .map(EventSnapshot::from)
            .collect())
    }

    /// Subscribe to the change feed for one calendar scope.
    pub fn subscribe(&self, client_id: &str, month: YearMonth) -> ScopedReceiver {
        self.feed.subscribe_scope(client_id, month)
    }

    // -----------------------------------------------------------------------
    // Series registry
    // -----------------------------------------------------------------------

    fn series_lock_err() -> CoreError {
        CoreError::TransientStore("series registry lock poisoned".into())
    }

    fn series_exists(&self, id: SeriesId) -> Result<bool, CoreError> {
        Ok(self
            .series
            .read()
            .map_err(|_| Self::series_lock_err())?
            .contains_key(&id))
    }

    pub fn register_series(&self, series: CampaignSeries) -> Result<(), CoreError> {
        self.series
            .write()
            .map_err(|_| Self::series_lock_err())?
            .insert(series.id, series);
        Ok(())
    }

    pub fn unregister_series(&self, id: SeriesId) -> Result<(), CoreError> {
        self.series
            .write()
            .map_err(|_| Self::series_lock_err())?
            .remove(&id);
        Ok(())
    }

    pub fn series(&self, id: SeriesId) -> Result<Option<CampaignSeries>, CoreError> {
        Ok(self
            .series
            .read()
            .map_err(|_| Self::series_lock_err())?
            .get(&id)
            .cloned())
    }

    /// Replace a registry entry (member list or label edits).
    pub fn update_series_entry(&self, series: CampaignSeries) -> Result<(), CoreError> {
        let mut registry = self.series.write().map_err(|_| Self::series_lock_err())?;
        if !registry.contains_key(&series.id) {
            return Err(CoreError::NotFound {
                entity: "CampaignSeries",
                id: series.id.to_string(),
            });
        }
        registry.insert(series.id, series);
        Ok(())
    }

    /// Remove one member from a series entry, keeping the entry itself.
    pub fn detach_series_member(
        &self,
        series_id: SeriesId,
        event_id: EventId,
    ) -> Result<(), CoreError> {
        let mut registry = self.series.write().map_err(|_| Self::series_lock_err())?;
        let Some(series) = registry.get_mut(&series_id) else {
            return Err(CoreError::NotFound {
                entity: "CampaignSeries",
                id: series_id.to_string(),
            });
        };
        if let Some(pos) = series.member_ids.iter().position(|id| *id == event_id) {
            series.member_ids.remove(pos);
            if pos < series.day_labels.len() {
                series.day_labels.remove(pos);
            }
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Persistence hooks
    // -----------------------------------------------------------------------

    /// Dump all events and series for a persistence snapshot.
    pub async fn export(&self) -> Result<(Vec<CalendarEvent>, Vec<CampaignSeries>, u64), CoreError> {
        let events = self.backend.dump().await?;
        let series = self
            .series
            .read()
            .map_err(|_| Self::series_lock_err())?
            .values()
            .cloned()
            .collect();
        Ok((events, series, self.seq.load(Ordering::SeqCst)))
    }

    /// Restore store contents from a persistence snapshot. No feed changes
    /// are published; restore happens before any subscriber exists.
    pub async fn import(
        &self,
        events: Vec<CalendarEvent>,
        series: Vec<CampaignSeries>,
        seq: u64,
    ) -> Result<(), CoreError> {
        self.backend.restore(events).await?;
        let mut registry = self.series.write().map_err(|_| Self::series_lock_err())?;
        registry.clear();
        for entry in series {
            registry.insert(entry.id, entry);
        }
        drop(registry);
        self.seq.store(seq, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use cadence_core::event::Channel;
    use chrono::TimeZone;
    use uuid::Uuid;

    fn december() -> YearMonth {
        YearMonth::new(2025, 12).unwrap()
    }

    fn event_named(day: u32, name: &str) -> CalendarEvent {
        CalendarEvent {
            id: Uuid::new_v4(),
            client_id: "acme".to_string(),
            scheduled_at: Utc.with_ymd_and_hms(2025, 12, day, 9, 0, 0).unwrap(),
            channel: Channel::Email,
            campaign_name: name.to_string(),
            brief: String::new(),
            series_id: None,
            is_resend: false,
            version: 0,
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn put_assigns_increasing_versions() {
        let store = EventStore::in_memory();
        let event = event_named(15, "Black Friday");

        let stored = store.put(event.clone()).await.unwrap();
        assert_eq!(stored.version, 1);

        let stored = store.put(stored).await.unwrap();
        assert_eq!(stored.version, 2);
    }

    #[tokio::test]
    async fn delete_removes_only_the_target() {
        let store = EventStore::in_memory();
        let e1 = store.put(event_named(15, "Black Friday")).await.unwrap();
        let e2 = store.put(event_named(16, "Follow-up")).await.unwrap();

        store.delete(e1.id).await.unwrap();

        let remaining = store.list("acme", december()).await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, e2.id);
        assert_eq!(remaining[0].campaign_name, "Follow-up");
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let store = EventStore::in_memory();
        let e1 = store.put(event_named(15, "Black Friday")).await.unwrap();

        store.delete(e1.id).await.unwrap();
        // Second delete of the same id, and a delete of a never-existing id,
        // both succeed.
        store.delete(e1.id).await.unwrap();
        store.delete(Uuid::new_v4()).await.unwrap();
    }

    #[tokio::test]
    async fn delete_publishes_exactly_one_notification() {
        let store = EventStore::in_memory();
        let mut rx = store.feed().subscribe();

        let e1 = store.put(event_named(15, "Black Friday")).await.unwrap();
        let _put_change = rx.recv().await.unwrap();

        store.delete(e1.id).await.unwrap();
        store.delete(e1.id).await.unwrap(); // no-op, must not publish

        let change = rx.recv().await.unwrap();
        assert_matches!(change.kind, ChangeKind::Delete { event_id } if event_id == e1.id);
        assert!(rx.try_recv().is_err(), "idempotent delete must not publish");
    }

    #[tokio::test]
    async fn put_rejects_unknown_series_id() {
        let store = EventStore::in_memory();
        let mut event = event_named(15, "Day 1");
        event.series_id = Some(Uuid::new_v4());

        let err = store.put(event).await.unwrap_err();
        assert_matches!(err, CoreError::Validation(_));
    }

    #[tokio::test]
    async fn put_accepts_registered_series_member() {
        let store = EventStore::in_memory();
        let series = CampaignSeries {
            id: Uuid::new_v4(),
            name: "Holiday countdown".to_string(),
            member_ids: vec![],
            day_labels: vec![],
            created_at: Utc::now(),
        };
        store.register_series(series.clone()).unwrap();

        let mut event = event_named(15, "Holiday countdown");
        event.series_id = Some(series.id);
        assert!(store.put(event).await.is_ok());
    }

    #[tokio::test]
    async fn list_sorts_by_scheduled_time() {
        let store = EventStore::in_memory();
        store.put(event_named(20, "Later")).await.unwrap();
        store.put(event_named(5, "Earlier")).await.unwrap();

        let listed = store.list("acme", december()).await.unwrap();
        assert_eq!(listed[0].campaign_name, "Earlier");
        assert_eq!(listed[1].campaign_name, "Later");
    }

    #[tokio::test]
    async fn changes_carry_monotonic_seq() {
        let store = EventStore::in_memory();
        let mut rx = store.feed().subscribe();

        let e1 = store.put(event_named(15, "One")).await.unwrap();
        store.put(event_named(16, "Two")).await.unwrap();
        store.delete(e1.id).await.unwrap();

        let s1 = rx.recv().await.unwrap().seq;
        let s2 = rx.recv().await.unwrap().seq;
        let s3 = rx.recv().await.unwrap().seq;
        assert!(s1 < s2 && s2 < s3);
    }

    #[tokio::test]
    async fn snapshot_is_frozen_projection() {
        let store = EventStore::in_memory();
        let e1 = store.put(event_named(15, "Black Friday")).await.unwrap();

        let snapshot = store.snapshot("acme", december()).await.unwrap();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].id, e1.id);
        assert_eq!(snapshot[0].campaign_name, "Black Friday");

        // Later edits do not touch an already-taken snapshot.
        let mut edited = e1.clone();
        edited.campaign_name = "Renamed".to_string();
        store.put(edited).await.unwrap();
        assert_eq!(snapshot[0].campaign_name, "Black Friday");
    }

    #[tokio::test]
    async fn export_import_round_trip() {
        let store = EventStore::in_memory();
        store.put(event_named(15, "One")).await.unwrap();
        store.put(event_named(16, "Two")).await.unwrap();
        let (events, series, seq) = store.export().await.unwrap();

        let restored = EventStore::in_memory();
        restored.import(events, series, seq).await.unwrap();
        assert_eq!(restored.list("acme", december()).await.unwrap().len(), 2);

        // Sequence numbers continue after the restored point.
        let mut rx = restored.feed().subscribe();
        restored.put(event_named(17, "Three")).await.unwrap();
        assert_eq!(rx.recv().await.unwrap().seq, seq + 1);
    }
}
