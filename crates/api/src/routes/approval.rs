//! Route definitions for the monthly approval workflow.
//!
//! ```text
//! GET    /          list_approvals (admin triage)
//! GET    /{key}     get_approval
//! POST   /{key}     transition_approval (create-or-transition)
//! DELETE /{key}     unapprove
//! ```

use axum::routing::get;
use axum::Router;

use crate::handlers::approval;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(approval::list_approvals))
        .route(
            "/{key}",
            get(approval::get_approval)
                .post(approval::transition_approval)
                .delete(approval::unapprove),
        )
}
