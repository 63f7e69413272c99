//! Route definitions for client change requests.
//!
//! ```text
//! POST   /                 create_change_request
//! GET    /{key}            list_change_requests (key = approval key)
//! POST   /{key}/resolve    resolve_change_request (key = request id, admin triage)
//! ```
//!
//! Both parameterized routes use the `{key}` capture name because the
//! router requires a single name per segment position; the handlers parse
//! it as an approval key or a request id respectively.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::change_requests;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(change_requests::create_change_request))
        .route("/{key}", get(change_requests::list_change_requests))
        .route(
            "/{key}/resolve",
            post(change_requests::resolve_change_request),
        )
}
