//! Handlers for client change requests.
//!
//! Requests come in from the public review page and are triaged by admins.
//! They are an append-only history: nothing here deletes a request, and
//! resolving an already-resolved request is a no-op success.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use validator::Validate;

use cadence_core::approval::ApprovalKey;
use cadence_core::change_request::{ChangeRequest, RequestKind};
use cadence_core::sanitize::strip_markup;
use cadence_core::types::RequestId;
use cadence_store::ResolveOutcome;

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

/// Request body for `POST /change-requests`.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateChangeRequest {
    pub approval_key: String,
    pub kind: RequestKind,
    #[validate(length(min = 1, max = 5000))]
    pub description: String,
}

/// Request body for `POST /change-requests/{id}/resolve`.
#[derive(Debug, Deserialize)]
pub struct ResolveBody {
    pub outcome: ResolveOutcome,
}

/// GET /api/v1/change-requests/{approval_key}
///
/// All requests filed against one approval key, oldest first.
pub async fn list_change_requests(
    State(state): State<AppState>,
    Path(raw_key): Path<String>,
) -> AppResult<Json<DataResponse<Vec<ChangeRequest>>>> {
    let key = ApprovalKey::parse(&raw_key)?;
    let requests = state.change_requests.list(&key)?;
    Ok(Json(DataResponse { data: requests }))
}

/// POST /api/v1/change-requests
///
/// File a request against an existing approval record. The description is
/// sanitized before persistence since it is rendered in the admin UI.
pub async fn create_change_request(
    State(state): State<AppState>,
    Json(payload): Json<CreateChangeRequest>,
) -> AppResult<(StatusCode, Json<DataResponse<ChangeRequest>>)> {
    payload
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let key = ApprovalKey::parse(&payload.approval_key)?;
    let request = state.change_requests.create(
        &key,
        payload.kind,
        strip_markup(&payload.description),
    )?;

    Ok((StatusCode::CREATED, Json(DataResponse { data: request })))
}

/// POST /api/v1/change-requests/{id}/resolve
///
/// Admin triage: move a request to in_progress, completed, or rejected.
pub async fn resolve_change_request(
    State(state): State<AppState>,
    Path(id): Path<RequestId>,
    Json(body): Json<ResolveBody>,
) -> AppResult<Json<DataResponse<ChangeRequest>>> {
    let request = state.change_requests.resolve(id, body.outcome)?;
    Ok(Json(DataResponse { data: request }))
}
