//! Handlers for the `/series` resource.
//!
//! A series is created, repositioned, and deleted as one unit; per-member
//! edits go through `PUT /events/{id}` and the detach policy there.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use cadence_core::event::{CalendarEvent, Channel};
use cadence_core::sanitize::strip_markup;
use cadence_core::types::{SeriesId, Timestamp};
use cadence_store::SeriesPatch;

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

/// Request body for creating a multi-day series.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateSeries {
    #[validate(length(min = 1, max = 64))]
    pub client_id: String,
    /// Scheduled time of the first member; later members land on the
    /// following consecutive days at the same time.
    pub start_at: Timestamp,
    pub channel: Channel,
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[serde(default)]
    #[validate(length(max = 10000))]
    pub brief: String,
    #[serde(default)]
    pub is_resend: bool,
    pub day_count: usize,
    /// One label per member, e.g. "Teaser", "Launch", "Last chance".
    pub day_labels: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct CreatedSeries {
    pub series_id: SeriesId,
}

/// POST /api/v1/series
///
/// Create `day_count` member events atomically: either every member exists
/// afterwards or none do.
pub async fn create_series(
    State(state): State<AppState>,
    Json(payload): Json<CreateSeries>,
) -> AppResult<(StatusCode, Json<DataResponse<CreatedSeries>>)> {
    payload
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let now = chrono::Utc::now();
    let base = CalendarEvent {
        id: Uuid::new_v4(),
        client_id: payload.client_id,
        scheduled_at: payload.start_at,
        channel: payload.channel,
        campaign_name: strip_markup(&payload.name),
        brief: strip_markup(&payload.brief),
        series_id: None,
        is_resend: payload.is_resend,
        version: 0,
        updated_at: now,
    };

    let day_labels = payload
        .day_labels
        .iter()
        .map(|label| strip_markup(label))
        .collect();

    let series_id = state
        .series
        .create_series(base, payload.day_count, day_labels)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(DataResponse {
            data: CreatedSeries { series_id },
        }),
    ))
}

/// PUT /api/v1/series/{id}
///
/// Apply a uniform patch to every member (rename, channel change, shift by
/// N days, relabel). All-or-nothing: a mid-way failure restores the members
/// already patched.
pub async fn update_series(
    State(state): State<AppState>,
    Path(id): Path<SeriesId>,
    Json(mut patch): Json<SeriesPatch>,
) -> AppResult<StatusCode> {
    if let Some(name) = patch.name.take() {
        patch.name = Some(strip_markup(&name));
    }
    if let Some(brief) = patch.brief.take() {
        patch.brief = Some(strip_markup(&brief));
    }
    if let Some(labels) = patch.day_labels.take() {
        patch.day_labels = Some(labels.iter().map(|l| strip_markup(l)).collect());
    }

    state.series.update_series(id, patch).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /api/v1/series/{id}
///
/// Delete every member with one surgical delete each, then drop the series.
pub async fn delete_series(
    State(state): State<AppState>,
    Path(id): Path<SeriesId>,
) -> AppResult<StatusCode> {
    state.series.delete_series(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
