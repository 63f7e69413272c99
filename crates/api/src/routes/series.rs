//! Route definitions for multi-day campaign series.
//!
//! ```text
//! POST   /          create_series
//! PUT    /{id}      update_series
//! DELETE /{id}      delete_series
//! ```

use axum::routing::{post, put};
use axum::Router;

use crate::handlers::series;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(series::create_series))
        .route(
            "/{id}",
            put(series::update_series).delete(series::delete_series),
        )
}
