//! Handlers for the `/events` resource.
//!
//! Every mutation here is a single-event operation. The delete handler in
//! particular addresses exactly one id; there is deliberately no bulk or
//! range delete form anywhere in this API.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use cadence_core::event::{CalendarEvent, Channel, EventPatch};
use cadence_core::sanitize::strip_markup;
use cadence_core::types::{EventId, Timestamp, YearMonth};

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

/// Query parameters selecting one calendar scope (`?client&year&month`).
#[derive(Debug, Deserialize)]
pub struct ScopeQuery {
    pub client: String,
    pub year: i32,
    pub month: u32,
}

impl ScopeQuery {
    pub fn month(&self) -> AppResult<YearMonth> {
        Ok(YearMonth::new(self.year, self.month)?)
    }
}

/// Request body for creating a calendar event.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateEvent {
    #[validate(length(min = 1, max = 64))]
    pub client_id: String,
    pub scheduled_at: Timestamp,
    pub channel: Channel,
    #[validate(length(min = 1, max = 200))]
    pub campaign_name: String,
    #[serde(default)]
    #[validate(length(max = 10000))]
    pub brief: String,
    #[serde(default)]
    pub is_resend: bool,
}

/// GET /api/v1/events?client&year&month
///
/// List all events in one calendar scope, ordered by scheduled time.
pub async fn list_events(
    State(state): State<AppState>,
    Query(scope): Query<ScopeQuery>,
) -> AppResult<Json<DataResponse<Vec<CalendarEvent>>>> {
    let events = state.store.list(&scope.client, scope.month()?).await?;
    Ok(Json(DataResponse { data: events }))
}

/// POST /api/v1/events
///
/// Create a standalone event. Free-text fields are sanitized before they
/// reach storage.
pub async fn create_event(
    State(state): State<AppState>,
    Json(payload): Json<CreateEvent>,
) -> AppResult<(StatusCode, Json<DataResponse<CalendarEvent>>)> {
    payload
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let now = chrono::Utc::now();
    let event = CalendarEvent {
        id: Uuid::new_v4(),
        client_id: payload.client_id,
        scheduled_at: payload.scheduled_at,
        channel: payload.channel,
        campaign_name: strip_markup(&payload.campaign_name),
        brief: strip_markup(&payload.brief),
        series_id: None,
        is_resend: payload.is_resend,
        version: 0,
        updated_at: now,
    };

    let stored = state.store.put(event).await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: stored })))
}

/// PUT /api/v1/events/{id}
///
/// Patch one event. Routed through the series layer so a date edit that
/// moves a series member outside its contiguous day range detaches the
/// member instead of dragging the series along.
pub async fn update_event(
    State(state): State<AppState>,
    Path(id): Path<EventId>,
    Json(mut patch): Json<EventPatch>,
) -> AppResult<Json<DataResponse<CalendarEvent>>> {
    if patch.is_empty() {
        return Err(AppError::BadRequest("patch contains no fields".into()));
    }
    if let Some(name) = patch.campaign_name.take() {
        patch.campaign_name = Some(strip_markup(&name));
    }
    if let Some(brief) = patch.brief.take() {
        patch.brief = Some(strip_markup(&brief));
    }

    let updated = state.series.update_member(id, &patch).await?;
    Ok(Json(DataResponse { data: updated }))
}

/// DELETE /api/v1/events/{id}
///
/// Delete exactly one event. Idempotent: deleting an id that is already
/// gone is a success, so concurrent editors and retries cannot fail on a
/// delete race.
pub async fn delete_event(
    State(state): State<AppState>,
    Path(id): Path<EventId>,
) -> AppResult<StatusCode> {
    state.store.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
