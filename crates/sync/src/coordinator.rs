//! Optimistic per-client view reconciled through the change feed.
//!
//! A [`SyncCoordinator`] mirrors one (client, month) calendar scope. Local
//! edits apply to the in-memory view immediately and issue exactly one
//! targeted remote write in the background (fire-and-forget with bounded
//! retry); remote mutations become visible only through the change feed.
//!
//! The delete path is deliberately surgical: a local "delete one" intent is
//! forwarded as a single-id delete, and reconciliation removes only the id
//! named by a delete notification. Nothing in this module ever rewrites a
//! whole month.
//!
//! Feed lag or disconnect is handled by re-fetching the scope snapshot and
//! replacing the view, so creates and deletes missed during the gap are not
//! silently lost.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use cadence_core::error::CoreError;
use cadence_core::event::CalendarEvent;
use cadence_core::types::{EventId, YearMonth};
use cadence_events::{ChangeKind, EventChange, ScopedReceiver};
use cadence_store::retry::{with_backoff, BackoffConfig};
use cadence_store::EventStore;

type View = Arc<RwLock<HashMap<EventId, CalendarEvent>>>;

/// Mirrors one calendar scope for one client session.
pub struct SyncCoordinator {
    store: Arc<EventStore>,
    client_id: String,
    month: YearMonth,
    view: View,
    backoff: BackoffConfig,
    /// Subscription opened at construction, consumed by [`Self::run`].
    feed: Mutex<Option<ScopedReceiver>>,
}

fn read_view(view: &View) -> std::sync::RwLockReadGuard<'_, HashMap<EventId, CalendarEvent>> {
    view.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn write_view(view: &View) -> std::sync::RwLockWriteGuard<'_, HashMap<EventId, CalendarEvent>> {
    view.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl SyncCoordinator {
    /// Subscribe to the change feed and seed the view from a store snapshot.
    ///
    /// The subscription is opened before the seed snapshot is taken, so a
    /// mutation landing in between is delivered at most twice (snapshot and
    /// feed) but never zero times; [`Self::apply`] reconciles duplicates.
    pub async fn new(
        store: Arc<EventStore>,
        client_id: impl Into<String>,
        month: YearMonth,
    ) -> Result<Self, CoreError> {
        let client_id = client_id.into();
        let rx = store.subscribe(&client_id, month);
        let coordinator = Self {
            store,
            client_id,
            month,
            view: Arc::new(RwLock::new(HashMap::new())),
            backoff: BackoffConfig::default(),
            feed: Mutex::new(Some(rx)),
        };
        coordinator.resync().await?;
        Ok(coordinator)
    }

    pub fn with_backoff(mut self, backoff: BackoffConfig) -> Self {
        self.backoff = backoff;
        self
    }

    /// The local view, sorted by scheduled time.
    pub fn events(&self) -> Vec<CalendarEvent> {
        let mut events: Vec<CalendarEvent> = read_view(&self.view).values().cloned().collect();
        events.sort_by_key(|e| (e.scheduled_at, e.id));
        events
    }

    pub fn contains(&self, id: EventId) -> bool {
        read_view(&self.view).contains_key(&id)
    }

    /// Optimistically create or update an event.
    ///
    /// The view reflects the edit immediately; the remote write runs in the
    /// background with bounded retry. A write that still fails is logged and
    /// the optimistic state is retained (availability over immediate
    /// consistency for this editing workflow), so the returned handle exists
    /// for tests and shutdown draining, not for error propagation.
    pub fn put_local(&self, event: CalendarEvent) -> JoinHandle<()> {
        write_view(&self.view).insert(event.id, event.clone());

        let store = Arc::clone(&self.store);
        let backoff = self.backoff;
        tokio::spawn(async move {
            let event_id = event.id;
            if let Err(err) =
                with_backoff("sync.put", backoff, || store.put(event.clone())).await
            {
                tracing::warn!(
                    event_id = %event_id,
                    error = %err,
                    "Remote write failed after retries; keeping optimistic local state"
                );
            }
        })
    }

    /// Optimistically delete exactly one event.
    ///
    /// The remote side receives a single-id delete; no month-wide rewrite is
    /// ever issued on the delete path.
    pub fn delete_local(&self, id: EventId) -> JoinHandle<()> {
        write_view(&self.view).remove(&id);

        let store = Arc::clone(&self.store);
        let backoff = self.backoff;
        tokio::spawn(async move {
            if let Err(err) = with_backoff("sync.delete", backoff, || store.delete(id)).await {
                tracing::warn!(
                    event_id = %id,
                    error = %err,
                    "Remote delete failed after retries; keeping optimistic local state"
                );
            }
        })
    }

    /// Replace the view with a fresh scope snapshot from the store.
    pub async fn resync(&self) -> Result<(), CoreError> {
        let events = self.store.list(&self.client_id, self.month).await?;
        let mut view = write_view(&self.view);
        view.clear();
        for event in events {
            view.insert(event.id, event);
        }
        Ok(())
    }

    /// Reconcile one feed change into the view.
    ///
    /// Puts are last-writer-wins on the store-assigned version so a stale
    /// change arriving after a resync cannot roll the view backwards.
    /// Deletes remove only the id they name.
    pub fn apply(&self, change: &EventChange) {
        match &change.kind {
            ChangeKind::Put { event } => {
                let mut view = write_view(&self.view);
                let stale = view
                    .get(&event.id)
                    .is_some_and(|current| current.version > event.version);
                if !stale {
                    view.insert(event.id, event.clone());
                }
            }
            ChangeKind::Delete { event_id } => {
                write_view(&self.view).remove(event_id);
            }
        }
    }

    /// Consume the scoped change feed until cancelled.
    ///
    /// Drains the subscription opened in [`Self::new`], so changes published
    /// between construction and the first poll are already buffered. Lag
    /// replays by snapshot re-fetch rather than assuming feed continuity; a
    /// closed feed also triggers resubscribe-and-resync with backoff, since
    /// missed deletes must not be silently lost.
    pub async fn run(&self, cancel: CancellationToken) {
        let taken = self
            .feed
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        let mut rx = match taken {
            Some(rx) => rx,
            // A repeated run() starts over from a fresh subscription.
            None => {
                let rx = self.store.subscribe(&self.client_id, self.month);
                if let Err(err) = self.resync().await {
                    tracing::error!(error = %err, "Resync at feed restart failed");
                }
                rx
            }
        };

        loop {
            tokio::select! {
                () = cancel.cancelled() => return,
                result = rx.recv() => match result {
                    Ok(change) => self.apply(&change),
                    Err(RecvError::Lagged(missed)) => {
                        tracing::warn!(
                            client = %self.client_id,
                            month = %self.month,
                            missed,
                            "Change feed lagged, resyncing from snapshot"
                        );
                        if let Err(err) = self.resync().await {
                            tracing::error!(error = %err, "Resync after lag failed");
                        }
                    }
                    Err(RecvError::Closed) => {
                        tracing::warn!(
                            client = %self.client_id,
                            month = %self.month,
                            "Change feed closed, reconnecting"
                        );
                        tokio::time::sleep(self.backoff.initial_delay).await;
                        rx = self.store.subscribe(&self.client_id, self.month);
                        if let Err(err) = self.resync().await {
                            tracing::error!(error = %err, "Resync after reconnect failed");
                        }
                    }
                },
            }
        }
    }
}
