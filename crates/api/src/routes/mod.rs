pub mod approval;
pub mod change_requests;
pub mod events;
pub mod health;
pub mod series;

use axum::middleware;
use axum::Router;

use crate::guard::guard_middleware;
use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /events?client&year&month                 list (GET)
/// /events                                   create (POST)
/// /events/{id}                              update, delete (PUT, DELETE)
/// /events/feed?client&year&month            change feed (WebSocket)
///
/// /series                                   create (POST)
/// /series/{id}                              update, delete (PUT, DELETE)
///
/// /approval                                 admin triage list (GET)
/// /approval/{key}                           get, transition, unapprove (GET, POST, DELETE)
///
/// /change-requests                          create (POST)
/// /change-requests/{approval_key}           list (GET)
/// /change-requests/{id}/resolve             admin triage (POST)
/// ```
///
/// The approval and change-request groups are public (linked from the
/// client review page) and sit behind the per-IP rate limit guard.
pub fn api_routes(state: &AppState) -> Router<AppState> {
    let guard = middleware::from_fn_with_state(state.clone(), guard_middleware);

    Router::new()
        // Calendar events and the WebSocket change feed.
        .nest("/events", events::router())
        // Atomic multi-day series operations.
        .nest("/series", series::router())
        // Public review-page routes, rate limited per client IP.
        .nest("/approval", approval::router().layer(guard.clone()))
        .nest("/change-requests", change_requests::router().layer(guard))
}
