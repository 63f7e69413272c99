//! Route definitions for calendar events.
//!
//! ```text
//! GET    /?client&year&month    list_events
//! POST   /                      create_event
//! GET    /feed?client&year&month feed (WebSocket)
//! PUT    /{id}                  update_event
//! DELETE /{id}                  delete_event
//! ```

use axum::routing::{get, put};
use axum::Router;

use crate::handlers::events;
use crate::state::AppState;
use crate::ws;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(events::list_events).post(events::create_event))
        .route("/feed", get(ws::feed_handler))
        .route(
            "/{id}",
            put(events::update_event).delete(events::delete_event),
        )
}
