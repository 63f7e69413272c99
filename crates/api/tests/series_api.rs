//! HTTP-level integration tests for the `/series` API endpoints and the
//! member detach policy on `/events/{id}`.

mod common;

use axum::http::StatusCode;
use common::{body_json, delete, get, post_expect, post_json, put_json, test_app};
use serde_json::json;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn new_series(day_count: usize, labels: &[&str]) -> serde_json::Value {
    json!({
        "client_id": "acme",
        "start_at": "2025-12-10T09:00:00Z",
        "channel": "email",
        "name": "Winter launch",
        "brief": "Three-day launch arc",
        "day_count": day_count,
        "day_labels": labels,
    })
}

const DECEMBER: &str = "/api/v1/events?client=acme&year=2025&month=12";

async fn december_events(app: &axum::Router) -> Vec<serde_json::Value> {
    let json = body_json(get(app, DECEMBER).await).await;
    json["data"].as_array().unwrap().clone()
}

// ---------------------------------------------------------------------------
// Test: POST /api/v1/series creates one event per day
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_create_series_creates_consecutive_members() {
    let (app, _state) = test_app();

    let json = post_expect(
        &app,
        "/api/v1/series",
        new_series(3, &["Teaser", "Launch", "Last chance"]),
        StatusCode::CREATED,
    )
    .await;
    let series_id = json["data"]["series_id"].as_str().unwrap().to_string();

    let events = december_events(&app).await;
    assert_eq!(events.len(), 3);
    for (i, event) in events.iter().enumerate() {
        assert_eq!(
            event["scheduled_at"].as_str().unwrap(),
            format!("2025-12-{:02}T09:00:00Z", 10 + i)
        );
        assert_eq!(event["series_id"].as_str().unwrap(), series_id);
        assert_eq!(event["campaign_name"], "Winter launch");
    }
}

// ---------------------------------------------------------------------------
// Test: invalid series payloads are rejected with 400
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_create_series_validates_day_count_and_labels() {
    let (app, _state) = test_app();

    // A single day is not a series.
    let response = post_json(&app, "/api/v1/series", new_series(1, &["Only"])).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Label count must match day count.
    let response = post_json(&app, "/api/v1/series", new_series(3, &["Teaser"])).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Nothing was partially written.
    assert!(december_events(&app).await.is_empty());
}

// ---------------------------------------------------------------------------
// Test: PUT /api/v1/series/{id} shifts every member together
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_update_series_shifts_all_members() {
    let (app, _state) = test_app();
    let created = post_expect(
        &app,
        "/api/v1/series",
        new_series(2, &["Day one", "Day two"]),
        StatusCode::CREATED,
    )
    .await;
    let series_id = created["data"]["series_id"].as_str().unwrap();

    let response = put_json(
        &app,
        &format!("/api/v1/series/{series_id}"),
        json!({ "shift_days": 5, "name": "Winter launch (moved)" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let events = december_events(&app).await;
    assert_eq!(events.len(), 2);
    assert_eq!(events[0]["scheduled_at"], "2025-12-15T09:00:00Z");
    assert_eq!(events[1]["scheduled_at"], "2025-12-16T09:00:00Z");
    assert_eq!(events[0]["campaign_name"], "Winter launch (moved)");
}

// ---------------------------------------------------------------------------
// Test: DELETE /api/v1/series/{id} removes every member, nothing else
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_delete_series_removes_members_only() {
    let (app, _state) = test_app();
    // A standalone event that must survive the series delete.
    post_expect(
        &app,
        "/api/v1/events",
        json!({
            "client_id": "acme",
            "scheduled_at": "2025-12-20T09:00:00Z",
            "channel": "sms",
            "campaign_name": "Standalone",
        }),
        StatusCode::CREATED,
    )
    .await;
    let created = post_expect(
        &app,
        "/api/v1/series",
        new_series(3, &["A", "B", "C"]),
        StatusCode::CREATED,
    )
    .await;
    let series_id = created["data"]["series_id"].as_str().unwrap();

    let response = delete(&app, &format!("/api/v1/series/{series_id}")).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let events = december_events(&app).await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["campaign_name"], "Standalone");

    // Deleting again is 404: the series itself is gone.
    let response = delete(&app, &format!("/api/v1/series/{series_id}")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// ---------------------------------------------------------------------------
// Test: moving a member outside the series day range detaches it
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_member_date_move_outside_range_detaches() {
    let (app, _state) = test_app();
    post_expect(
        &app,
        "/api/v1/series",
        new_series(3, &["A", "B", "C"]),
        StatusCode::CREATED,
    )
    .await;

    let events = december_events(&app).await;
    let member_id = events[2]["id"].as_str().unwrap();

    let response = put_json(
        &app,
        &format!("/api/v1/events/{member_id}"),
        json!({ "scheduled_at": "2025-12-25T09:00:00Z" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert!(
        json["data"]["series_id"].is_null(),
        "member moved outside the range must be detached"
    );

    // The other two members are still attached.
    let events = december_events(&app).await;
    let attached = events
        .iter()
        .filter(|e| !e["series_id"].is_null())
        .count();
    assert_eq!(attached, 2);
}

// ---------------------------------------------------------------------------
// Test: a label-only edit keeps the member attached
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_member_content_edit_keeps_attachment() {
    let (app, _state) = test_app();
    post_expect(
        &app,
        "/api/v1/series",
        new_series(2, &["A", "B"]),
        StatusCode::CREATED,
    )
    .await;

    let events = december_events(&app).await;
    let member_id = events[0]["id"].as_str().unwrap();

    let response = put_json(
        &app,
        &format!("/api/v1/events/{member_id}"),
        json!({ "brief": "Updated copy" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert!(
        !json["data"]["series_id"].is_null(),
        "content-only edits must not detach the member"
    );
}
