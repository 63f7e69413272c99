//! Atomic multi-day campaign series operations.
//!
//! The backing store has no multi-document transaction, so [`SeriesManager`]
//! provides the all-or-nothing guarantee itself: member writes that fail
//! mid-way are rolled back with surgical deletes, and a series delete is one
//! targeted delete per member, never a month-wide wipe.

use std::sync::Arc;

use chrono::{Duration, NaiveDate, Utc};
use uuid::Uuid;

use cadence_core::error::CoreError;
use cadence_core::event::{CalendarEvent, Channel, EventPatch};
use cadence_core::series::{self, CampaignSeries};
use cadence_core::types::{EventId, SeriesId};

use crate::event_store::EventStore;
use crate::retry::{with_backoff, BackoffConfig};

/// Patch applied uniformly to every member of a series.
///
/// Member dates are not set directly; `shift_days` moves the whole series
/// while keeping its day spacing. Individual date edits go through
/// [`SeriesManager::update_member`] and its detach policy.
#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct SeriesPatch {
    pub name: Option<String>,
    pub brief: Option<String>,
    pub channel: Option<Channel>,
    pub is_resend: Option<bool>,
    pub shift_days: Option<i64>,
    pub day_labels: Option<Vec<String>>,
}

/// Creates, updates, and deletes multi-day series as atomic units.
pub struct SeriesManager {
    store: Arc<EventStore>,
    backoff: BackoffConfig,
}

impl SeriesManager {
    pub fn new(store: Arc<EventStore>) -> Self {
        Self::with_backoff(store, BackoffConfig::default())
    }

    pub fn with_backoff(store: Arc<EventStore>, backoff: BackoffConfig) -> Self {
        Self { store, backoff }
    }

    /// Create `day_count` member events on consecutive days starting at the
    /// base event's date. All-or-nothing: any member write that fails after
    /// retries triggers surgical deletion of the members already written.
    pub async fn create_series(
        &self,
        base_event: CalendarEvent,
        day_count: usize,
        per_day_labels: Vec<String>,
    ) -> Result<SeriesId, CoreError> {
        series::validate_day_count(day_count)?;
        if per_day_labels.len() != day_count {
            return Err(CoreError::Validation(format!(
                "expected {day_count} day labels, got {}",
                per_day_labels.len()
            )));
        }
        base_event.validate()?;

        let series_id = Uuid::new_v4();
        self.store.register_series(CampaignSeries {
            id: series_id,
            name: base_event.campaign_name.clone(),
            member_ids: Vec::new(),
            day_labels: per_day_labels.clone(),
            created_at: Utc::now(),
        })?;

        let mut written: Vec<EventId> = Vec::with_capacity(day_count);
        for day in 0..day_count {
            let mut member = base_event.clone();
            member.id = Uuid::new_v4();
            member.scheduled_at = base_event.scheduled_at + Duration::days(day as i64);
            member.series_id = Some(series_id);
            member.version = 0;

            let result = with_backoff("series.create.put", self.backoff, || {
                self.store.put(member.clone())
            })
            .await;

            match result {
                Ok(stored) => written.push(stored.id),
                Err(err) => {
                    tracing::warn!(
                        series_id = %series_id,
                        day,
                        error = %err,
                        "Series member write failed, rolling back"
                    );
                    self.rollback_creates(series_id, &written).await;
                    return Err(err);
                }
            }
        }

        let mut entry = self
            .store
            .series(series_id)?
            .expect("series registered above");
        entry.member_ids = written;
        self.store.update_series_entry(entry)?;

        tracing::info!(series_id = %series_id, day_count, "Series created");
        Ok(series_id)
    }

    /// Delete the partial members of a failed create and drop the registry
    /// entry. Best effort: a member that cannot be deleted is logged, not
    /// surfaced, since the create error is already on its way to the caller.
    async fn rollback_creates(&self, series_id: SeriesId, written: &[EventId]) {
        for id in written {
            if let Err(err) =
                with_backoff("series.rollback.delete", self.backoff, || self.store.delete(*id)).await
            {
                tracing::error!(event_id = %id, error = %err, "Series rollback delete failed");
            }
        }
        if let Err(err) = self.store.unregister_series(series_id) {
            tracing::error!(series_id = %series_id, error = %err, "Series unregister failed");
        }
    }

    /// Apply a uniform patch to every member. On a mid-way failure the
    /// already-patched members are restored to their captured originals.
    pub async fn update_series(
        &self,
        series_id: SeriesId,
        patch: SeriesPatch,
    ) -> Result<(), CoreError> {
        let mut entry = self.store.series(series_id)?.ok_or(CoreError::NotFound {
            entity: "CampaignSeries",
            id: series_id.to_string(),
        })?;

        if let Some(labels) = &patch.day_labels {
            if labels.len() != entry.member_ids.len() {
                return Err(CoreError::Validation(format!(
                    "expected {} day labels, got {}",
                    entry.member_ids.len(),
                    labels.len()
                )));
            }
        }

        // Capture originals before touching anything.
        let mut originals: Vec<CalendarEvent> = Vec::with_capacity(entry.member_ids.len());
        for id in &entry.member_ids {
            let event = self.store.get(*id).await?.ok_or(CoreError::NotFound {
                entity: "CalendarEvent",
                id: id.to_string(),
            })?;
            originals.push(event);
        }

        for original in &originals {
            let mut member = original.clone();
            if let Some(name) = &patch.name {
                member.campaign_name = name.clone();
            }
            if let Some(brief) = &patch.brief {
                member.brief = brief.clone();
            }
            if let Some(channel) = patch.channel {
                member.channel = channel;
            }
            if let Some(resend) = patch.is_resend {
                member.is_resend = resend;
            }
            if let Some(days) = patch.shift_days {
                member.scheduled_at = member.scheduled_at + Duration::days(days);
            }

            let result = with_backoff("series.update.put", self.backoff, || {
                self.store.put(member.clone())
            })
            .await;

            if let Err(err) = result {
                tracing::warn!(
                    series_id = %series_id,
                    error = %err,
                    "Series update failed, restoring originals"
                );
                self.restore_originals(&originals).await;
                return Err(err);
            }
        }

        if let Some(name) = patch.name {
            entry.name = name;
        }
        if let Some(labels) = patch.day_labels {
            entry.day_labels = labels;
        }
        self.store.update_series_entry(entry)?;
        Ok(())
    }

    async fn restore_originals(&self, originals: &[CalendarEvent]) {
        for original in originals {
            if let Err(err) = with_backoff("series.update.restore", self.backoff, || {
                self.store.put(original.clone())
            })
            .await
            {
                tracing::error!(event_id = %original.id, error = %err, "Series restore failed");
            }
        }
    }

    /// Patch one event, honoring the series membership policy: a date moved
    /// outside the series' contiguous day range detaches the member, any
    /// other edit keeps it associated. Non-members pass straight through.
    pub async fn update_member(
        &self,
        event_id: EventId,
        patch: &EventPatch,
    ) -> Result<CalendarEvent, CoreError> {
        let mut event = self.store.get(event_id).await?.ok_or(CoreError::NotFound {
            entity: "CalendarEvent",
            id: event_id.to_string(),
        })?;

        if let (Some(series_id), Some(new_at)) = (event.series_id, patch.scheduled_at) {
            let member_dates = self.member_dates(series_id).await?;
            if !series::stays_in_series(&member_dates, new_at.date_naive()) {
                event.series_id = None;
                self.store.detach_series_member(series_id, event.id)?;
                tracing::info!(
                    event_id = %event.id,
                    series_id = %series_id,
                    "Member date moved outside series range, detached"
                );
            }
        }

        event.apply_patch(patch);
        self.store.put(event).await
    }

    async fn member_dates(&self, series_id: SeriesId) -> Result<Vec<NaiveDate>, CoreError> {
        let entry = self.store.series(series_id)?.ok_or(CoreError::NotFound {
            entity: "CampaignSeries",
            id: series_id.to_string(),
        })?;
        let mut dates = Vec::with_capacity(entry.member_ids.len());
        for id in &entry.member_ids {
            if let Some(member) = self.store.get(*id).await? {
                dates.push(member.scheduled_at.date_naive());
            }
        }
        Ok(dates)
    }

    /// Delete every member with one surgical delete each, then drop the
    /// registry entry. A member delete that fails after retries leaves the
    /// series registered with its remaining members and surfaces the error.
    pub async fn delete_series(&self, series_id: SeriesId) -> Result<(), CoreError> {
        let entry = self.store.series(series_id)?.ok_or(CoreError::NotFound {
            entity: "CampaignSeries",
            id: series_id.to_string(),
        })?;

        let mut first_error: Option<CoreError> = None;
        for id in &entry.member_ids {
            match with_backoff("series.delete", self.backoff, || self.store.delete(*id)).await {
                Ok(()) => {
                    // Keep the registry consistent as members disappear.
                    let _ = self.store.detach_series_member(series_id, *id);
                }
                Err(err) => {
                    tracing::error!(event_id = %id, error = %err, "Series member delete failed");
                    if first_error.is_none() {
                        first_error = Some(err);
                    }
                }
            }
        }

        match first_error {
            None => {
                self.store.unregister_series(series_id)?;
                tracing::info!(series_id = %series_id, "Series deleted");
                Ok(())
            }
            Some(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{MemoryBackend, StoreBackend};
    use assert_matches::assert_matches;
    use async_trait::async_trait;
    use cadence_events::ChangeFeed;
    use cadence_core::types::YearMonth;
    use chrono::TimeZone;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration as StdDuration;

    fn fast_backoff() -> BackoffConfig {
        BackoffConfig {
            max_attempts: 2,
            initial_delay: StdDuration::from_millis(1),
            max_delay: StdDuration::from_millis(2),
        }
    }

    fn base_event() -> CalendarEvent {
        CalendarEvent {
            id: Uuid::new_v4(),
            client_id: "acme".to_string(),
            scheduled_at: Utc.with_ymd_and_hms(2025, 12, 15, 9, 0, 0).unwrap(),
            channel: Channel::Email,
            campaign_name: "Holiday countdown".to_string(),
            brief: "Three-day teaser".to_string(),
            series_id: None,
            is_resend: false,
            version: 0,
            updated_at: Utc::now(),
        }
    }

    fn labels(n: usize) -> Vec<String> {
        (1..=n).map(|d| format!("Day {d}")).collect()
    }

    fn december() -> YearMonth {
        YearMonth::new(2025, 12).unwrap()
    }

    /// Backend wrapper that starts failing puts permanently after a budget
    /// of successful writes.
    struct FailingBackend {
        inner: MemoryBackend,
        puts_before_failure: AtomicU32,
    }

    impl FailingBackend {
        fn failing_after(puts: u32) -> Self {
            Self {
                inner: MemoryBackend::default(),
                puts_before_failure: AtomicU32::new(puts),
            }
        }
    }

    #[async_trait]
    impl StoreBackend for FailingBackend {
        async fn put(&self, event: CalendarEvent) -> Result<(), CoreError> {
            let remaining = self.puts_before_failure.load(Ordering::SeqCst);
            if remaining == 0 {
                return Err(CoreError::TransientStore("disk full".into()));
            }
            self.puts_before_failure.fetch_sub(1, Ordering::SeqCst);
            self.inner.put(event).await
        }

        async fn delete(&self, id: EventId) -> Result<Option<CalendarEvent>, CoreError> {
            self.inner.delete(id).await
        }

        async fn get(&self, id: EventId) -> Result<Option<CalendarEvent>, CoreError> {
            self.inner.get(id).await
        }

        async fn list(
            &self,
            client_id: &str,
            month: YearMonth,
        ) -> Result<Vec<CalendarEvent>, CoreError> {
            self.inner.list(client_id, month).await
        }

        async fn dump(&self) -> Result<Vec<CalendarEvent>, CoreError> {
            self.inner.dump().await
        }

        async fn restore(&self, events: Vec<CalendarEvent>) -> Result<(), CoreError> {
            self.inner.restore(events).await
        }
    }

    #[tokio::test]
    async fn create_series_writes_all_members() {
        let store = Arc::new(EventStore::in_memory());
        let manager = SeriesManager::new(Arc::clone(&store));

        let series_id = manager
            .create_series(base_event(), 3, labels(3))
            .await
            .unwrap();

        let events = store.list("acme", december()).await.unwrap();
        assert_eq!(events.len(), 3);
        assert!(events.iter().all(|e| e.series_id == Some(series_id)));

        // Consecutive days starting at the base date.
        let days: Vec<u32> = events
            .iter()
            .map(|e| chrono::Datelike::day(&e.scheduled_at))
            .collect();
        assert_eq!(days, vec![15, 16, 17]);
    }

    #[tokio::test]
    async fn create_series_is_all_or_nothing() {
        // Two member writes succeed, the third fails permanently.
        let backend = Arc::new(FailingBackend::failing_after(2));
        let store = Arc::new(EventStore::new(backend, Arc::new(ChangeFeed::default())));
        let manager = SeriesManager::with_backoff(Arc::clone(&store), fast_backoff());

        let err = manager
            .create_series(base_event(), 3, labels(3))
            .await
            .unwrap_err();
        assert_matches!(err, CoreError::TransientStore(_));

        // No 1-of-3 or 2-of-3 state is observable afterwards.
        let events = store.list("acme", december()).await.unwrap();
        assert!(events.is_empty(), "partial series must be rolled back");
    }

    #[tokio::test]
    async fn create_series_validates_inputs() {
        let store = Arc::new(EventStore::in_memory());
        let manager = SeriesManager::new(store);

        assert_matches!(
            manager.create_series(base_event(), 1, labels(1)).await,
            Err(CoreError::Validation(_))
        );
        assert_matches!(
            manager.create_series(base_event(), 3, labels(2)).await,
            Err(CoreError::Validation(_))
        );
    }

    #[tokio::test]
    async fn delete_series_removes_exactly_its_members() {
        let store = Arc::new(EventStore::in_memory());
        let manager = SeriesManager::new(Arc::clone(&store));

        // An unrelated event in the same month must survive.
        let mut bystander = base_event();
        bystander.campaign_name = "Unrelated send".to_string();
        bystander.scheduled_at = Utc.with_ymd_and_hms(2025, 12, 20, 9, 0, 0).unwrap();
        let bystander = store.put(bystander).await.unwrap();

        let series_id = manager
            .create_series(base_event(), 3, labels(3))
            .await
            .unwrap();
        manager.delete_series(series_id).await.unwrap();

        let remaining = store.list("acme", december()).await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, bystander.id);
        assert!(store.series(series_id).unwrap().is_none());
    }

    #[tokio::test]
    async fn delete_unknown_series_is_not_found() {
        let store = Arc::new(EventStore::in_memory());
        let manager = SeriesManager::new(store);
        assert_matches!(
            manager.delete_series(Uuid::new_v4()).await,
            Err(CoreError::NotFound { .. })
        );
    }

    #[tokio::test]
    async fn update_series_patches_every_member() {
        let store = Arc::new(EventStore::in_memory());
        let manager = SeriesManager::new(Arc::clone(&store));
        let series_id = manager
            .create_series(base_event(), 3, labels(3))
            .await
            .unwrap();

        manager
            .update_series(
                series_id,
                SeriesPatch {
                    name: Some("Countdown (final)".to_string()),
                    shift_days: Some(1),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let events = store.list("acme", december()).await.unwrap();
        assert!(events
            .iter()
            .all(|e| e.campaign_name == "Countdown (final)"));
        let days: Vec<u32> = events
            .iter()
            .map(|e| chrono::Datelike::day(&e.scheduled_at))
            .collect();
        assert_eq!(days, vec![16, 17, 18]);
        assert_eq!(store.series(series_id).unwrap().unwrap().name, "Countdown (final)");
    }

    #[tokio::test]
    async fn member_date_edit_inside_range_keeps_membership() {
        let store = Arc::new(EventStore::in_memory());
        let manager = SeriesManager::new(Arc::clone(&store));
        let series_id = manager
            .create_series(base_event(), 3, labels(3))
            .await
            .unwrap();

        let member_id = store.series(series_id).unwrap().unwrap().member_ids[0];
        let patch = EventPatch {
            // Day 15 -> day 16: still inside the 15-17 range.
            scheduled_at: Some(Utc.with_ymd_and_hms(2025, 12, 16, 18, 0, 0).unwrap()),
            ..Default::default()
        };
        let updated = manager.update_member(member_id, &patch).await.unwrap();
        assert_eq!(updated.series_id, Some(series_id));
    }

    #[tokio::test]
    async fn member_date_edit_outside_range_detaches() {
        let store = Arc::new(EventStore::in_memory());
        let manager = SeriesManager::new(Arc::clone(&store));
        let series_id = manager
            .create_series(base_event(), 3, labels(3))
            .await
            .unwrap();

        let member_id = store.series(series_id).unwrap().unwrap().member_ids[0];
        let patch = EventPatch {
            scheduled_at: Some(Utc.with_ymd_and_hms(2025, 12, 24, 9, 0, 0).unwrap()),
            ..Default::default()
        };
        let updated = manager.update_member(member_id, &patch).await.unwrap();
        assert_eq!(updated.series_id, None);

        let entry = store.series(series_id).unwrap().unwrap();
        assert!(!entry.member_ids.contains(&member_id));
        assert_eq!(entry.member_ids.len(), 2);
    }

    #[tokio::test]
    async fn label_edit_never_detaches() {
        let store = Arc::new(EventStore::in_memory());
        let manager = SeriesManager::new(Arc::clone(&store));
        let series_id = manager
            .create_series(base_event(), 3, labels(3))
            .await
            .unwrap();

        let member_id = store.series(series_id).unwrap().unwrap().member_ids[1];
        let patch = EventPatch {
            campaign_name: Some("Holiday countdown, day two".to_string()),
            ..Default::default()
        };
        let updated = manager.update_member(member_id, &patch).await.unwrap();
        assert_eq!(updated.series_id, Some(series_id));
    }
}
