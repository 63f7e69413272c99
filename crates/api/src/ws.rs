//! WebSocket change feed for calendar clients.
//!
//! `GET /api/v1/events/feed?client&year&month` upgrades to a WebSocket that
//! first delivers a full snapshot of the scope, then streams individual
//! changes as they happen. A client that falls behind the feed buffer is
//! healed with a fresh snapshot frame rather than a broken stream, so a
//! missed delete can never linger in its view.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use futures::{SinkExt, StreamExt};
use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;

use cadence_core::event::CalendarEvent;
use cadence_core::types::YearMonth;
use cadence_events::EventChange;

use crate::error::AppResult;
use crate::handlers::events::ScopeQuery;
use crate::state::AppState;

/// Outbound frame on the feed socket.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum FeedFrame {
    /// Full scope contents; sent on connect and after feed lag.
    Snapshot { events: Vec<CalendarEvent> },
    /// One incremental change.
    Change {
        #[serde(flatten)]
        change: EventChange,
    },
}

/// GET /api/v1/events/feed?client&year&month
///
/// Upgrade to a WebSocket streaming scoped calendar changes.
pub async fn feed_handler(
    ws: WebSocketUpgrade,
    Query(scope): Query<ScopeQuery>,
    State(state): State<AppState>,
) -> AppResult<Response> {
    let month = scope.month()?;
    let client = scope.client;
    Ok(ws
        .on_upgrade(move |socket| stream_changes(socket, state, client, month))
        .into_response())
}

/// Drive one feed connection after upgrade.
///
/// Subscribes to the scoped feed before taking the snapshot, so a change
/// landing between the two shows up as a (harmless) duplicate rather than
/// a gap.
async fn stream_changes(socket: WebSocket, state: AppState, client: String, month: YearMonth) {
    let conn_id = uuid::Uuid::new_v4();
    tracing::info!(conn_id = %conn_id, client = %client, month = %month, "Feed connected");

    let mut rx = state.store.subscribe(&client, month);
    let (mut sink, mut stream) = socket.split();

    if !send_snapshot(&mut sink, &state, &client, month).await {
        tracing::debug!(conn_id = %conn_id, "Feed closed before initial snapshot");
        return;
    }

    loop {
        tokio::select! {
            inbound = stream.next() => match inbound {
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {
                    // The feed is one-way; inbound frames are ignored.
                }
                Some(Err(e)) => {
                    tracing::debug!(conn_id = %conn_id, error = %e, "Feed receive error");
                    break;
                }
            },
            change = rx.recv() => match change {
                Ok(change) => {
                    if !send_frame(&mut sink, &FeedFrame::Change { change }).await {
                        break;
                    }
                }
                Err(RecvError::Lagged(missed)) => {
                    tracing::warn!(conn_id = %conn_id, missed, "Feed lagged, sending snapshot");
                    if !send_snapshot(&mut sink, &state, &client, month).await {
                        break;
                    }
                }
                Err(RecvError::Closed) => break,
            },
        }
    }

    tracing::info!(conn_id = %conn_id, "Feed disconnected");
}

async fn send_snapshot(
    sink: &mut (impl SinkExt<Message> + Unpin),
    state: &AppState,
    client: &str,
    month: YearMonth,
) -> bool {
    match state.store.list(client, month).await {
        Ok(events) => send_frame(sink, &FeedFrame::Snapshot { events }).await,
        Err(err) => {
            tracing::error!(error = %err, "Feed snapshot fetch failed");
            false
        }
    }
}

async fn send_frame(sink: &mut (impl SinkExt<Message> + Unpin), frame: &FeedFrame) -> bool {
    let text = match serde_json::to_string(frame) {
        Ok(text) => text,
        Err(err) => {
            tracing::error!(error = %err, "Feed frame serialization failed");
            return false;
        }
    };
    sink.send(Message::Text(text.into())).await.is_ok()
}
