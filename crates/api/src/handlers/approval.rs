//! Handlers for the monthly approval workflow.
//!
//! Approval records are addressed by their key (`{client}-{YYYY}-{MM}`),
//! which is parsed through the allow-listed [`ApprovalKey`] type before it
//! touches storage. Reading a missing record is not an error: the review
//! page renders `data: null` as "nothing to review yet". Writing to a
//! missing key creates the record lazily and then applies the transition,
//! so the review page never needs a separate create call.

use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;

use cadence_core::approval::{ApprovalKey, ApprovalRecord, ApprovalStatus};
use cadence_core::sanitize::strip_markup;

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

/// Target status name in a transition request.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusName {
    Pending,
    Approved,
    ChangesRequested,
    Rejected,
}

/// Request body for `POST /approval/{key}`.
#[derive(Debug, Deserialize)]
pub struct TransitionBody {
    pub status: StatusName,
    /// Required when `status` is `approved`.
    pub approved_by: Option<String>,
    /// Reviewer notes for `changes_requested` / `rejected`.
    pub notes: Option<String>,
}

impl TransitionBody {
    /// Build the target status, stamping approver identity and sanitizing
    /// free-text notes.
    fn into_status(self) -> AppResult<ApprovalStatus> {
        match self.status {
            StatusName::Pending => Ok(ApprovalStatus::Pending),
            StatusName::Approved => {
                let approved_by = self
                    .approved_by
                    .as_deref()
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .ok_or_else(|| {
                        AppError::BadRequest("approved_by is required to approve".into())
                    })?;
                Ok(ApprovalStatus::Approved {
                    approved_by: strip_markup(approved_by),
                    approved_at: chrono::Utc::now(),
                })
            }
            StatusName::ChangesRequested => Ok(ApprovalStatus::ChangesRequested {
                notes: self.notes.as_deref().map(strip_markup),
            }),
            StatusName::Rejected => Ok(ApprovalStatus::Rejected {
                notes: self.notes.as_deref().map(strip_markup),
            }),
        }
    }
}

/// GET /api/v1/approval
///
/// All approval records for the admin triage overview.
pub async fn list_approvals(
    State(state): State<AppState>,
) -> AppResult<Json<DataResponse<Vec<ApprovalRecord>>>> {
    let records = state.approvals.list()?;
    Ok(Json(DataResponse { data: records }))
}

/// GET /api/v1/approval/{key}
///
/// Fetch one approval record. A missing record responds 200 with
/// `data: null`, never 404.
pub async fn get_approval(
    State(state): State<AppState>,
    Path(raw_key): Path<String>,
) -> AppResult<Json<DataResponse<Option<ApprovalRecord>>>> {
    let key = ApprovalKey::parse(&raw_key)?;
    let record = state.approvals.get(&key)?;
    Ok(Json(DataResponse { data: record }))
}

/// POST /api/v1/approval/{key}
///
/// Create-or-transition: ensures the record exists (snapshotting the scoped
/// events on first touch), then applies the requested status transition.
/// Transitions off a terminal record are refused with 409.
pub async fn transition_approval(
    State(state): State<AppState>,
    Path(raw_key): Path<String>,
    Json(body): Json<TransitionBody>,
) -> AppResult<Json<DataResponse<ApprovalRecord>>> {
    let key = ApprovalKey::parse(&raw_key)?;

    // The scope snapshot is taken only on first touch; an existing record
    // keeps the snapshot frozen at creation, whatever the store holds now.
    if state.approvals.get(&key)?.is_none() {
        let snapshot = state.store.snapshot(key.client_slug(), key.scope()).await?;
        state.approvals.create_or_get(&key, snapshot)?;
    }

    let record = state.approvals.transition(&key, body.into_status()?)?;
    Ok(Json(DataResponse { data: record }))
}

/// DELETE /api/v1/approval/{key}
///
/// Unapprove: the only legal mutation of an approved record, resetting it
/// to `pending`. The admin UI gates this behind an explicit confirmation.
pub async fn unapprove(
    State(state): State<AppState>,
    Path(raw_key): Path<String>,
) -> AppResult<Json<DataResponse<ApprovalRecord>>> {
    let key = ApprovalKey::parse(&raw_key)?;
    let record = state.approvals.unapprove(&key)?;
    Ok(Json(DataResponse { data: record }))
}
