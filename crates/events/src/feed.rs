//! In-process change feed backed by a `tokio::sync::broadcast` channel.
//!
//! [`ChangeFeed`] is the fan-out hub for calendar mutations. The store is the
//! only publisher; every sync coordinator and WebSocket session subscribes.
//! It is designed to be shared via `Arc<ChangeFeed>` across the application.
//!
//! Slow receivers observe `RecvError::Lagged` when the buffer wraps.
//! Consumers MUST treat lag as a resync trigger (re-fetch the scope snapshot
//! from the store), never as "skip and continue": a missed delete that is
//! skipped stays resurrected forever.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use cadence_core::event::CalendarEvent;
use cadence_core::types::{EventId, Timestamp, YearMonth};

// ---------------------------------------------------------------------------
// EventChange
// ---------------------------------------------------------------------------

/// What changed: a full upserted document, or a single deleted id.
///
/// Serialized with an internally tagged `"kind"` discriminator so browser
/// clients can route on the kind string.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ChangeKind {
    /// An event was created or updated; carries the full new document.
    Put { event: CalendarEvent },
    /// Exactly one event was removed.
    Delete { event_id: EventId },
}

/// One mutation observed at the store, addressed to a calendar scope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventChange {
    #[serde(flatten)]
    pub kind: ChangeKind,
    /// Owning client slug.
    pub client_id: String,
    /// Month the event belongs to.
    pub month: YearMonth,
    /// Store-assigned monotonic sequence number (process-wide).
    pub seq: u64,
    pub timestamp: Timestamp,
}

impl EventChange {
    /// Whether this change is visible in the given calendar scope.
    pub fn in_scope(&self, client_id: &str, month: YearMonth) -> bool {
        self.client_id == client_id && self.month == month
    }
}

// ---------------------------------------------------------------------------
// ChangeFeed
// ---------------------------------------------------------------------------

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 1024;

/// In-process fan-out hub for calendar mutations.
pub struct ChangeFeed {
    sender: broadcast::Sender<EventChange>,
}

impl ChangeFeed {
    /// Create a feed with a specific channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish a change to all current subscribers.
    ///
    /// If there are no active subscribers the change is silently dropped;
    /// the store remains the durable record.
    pub fn publish(&self, change: EventChange) {
        // Ignore the SendError -- it only means there are zero receivers.
        let _ = self.sender.send(change);
    }

    /// Subscribe to every change on the feed.
    pub fn subscribe(&self) -> broadcast::Receiver<EventChange> {
        self.sender.subscribe()
    }

    /// Subscribe to changes for one (client, month) scope only.
    pub fn subscribe_scope(&self, client_id: impl Into<String>, month: YearMonth) -> ScopedReceiver {
        ScopedReceiver {
            inner: self.sender.subscribe(),
            client_id: client_id.into(),
            month,
        }
    }
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

/// A feed receiver filtered to one calendar scope.
///
/// Out-of-scope changes are skipped transparently; `Lagged` is passed
/// through untouched so the consumer can resync.
pub struct ScopedReceiver {
    inner: broadcast::Receiver<EventChange>,
    client_id: String,
    month: YearMonth,
}

impl ScopedReceiver {
    /// Receive the next in-scope change.
    pub async fn recv(&mut self) -> Result<EventChange, broadcast::error::RecvError> {
        loop {
            let change = self.inner.recv().await?;
            if change.in_scope(&self.client_id, self.month) {
                return Ok(change);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
