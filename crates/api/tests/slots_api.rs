//! HTTP API tests for the slot hold endpoints.
//!
//! These drive the full router (middleware stack included) with
//! `tower::ServiceExt::oneshot`. The database pool is lazy and points
//! at an unreachable address: every hold endpoint operates purely
//! against the in-memory lock engine, and the one test that reaches
//! the database (finalize) exercises the persistence-failure
//! compensation path.

mod common;

use axum::body::Body;
use axum::http::{header::CONTENT_TYPE, Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

fn slot_json(court_id: i64) -> Value {
    json!({
        "facility_id": 1,
        "court_id": court_id,
        "date": "2026-09-01",
        "start": "18:00:00",
        "end": "19:00:00",
    })
}

fn post(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

// ---------------------------------------------------------------------------
// Acquire
// ---------------------------------------------------------------------------

#[tokio::test]
async fn acquire_returns_grant_with_expiry() {
    let (app, _state) = common::build_test_app();

    let response = app
        .oneshot(post(
            "/api/v1/slots/acquire",
            json!({ "slot": slot_json(1), "session_id": "s1", "ttl_secs": 120 }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["renew_count"], 0);
    assert!(json["data"]["expires_at"].is_string());
    assert_eq!(json["data"]["slot"]["court_id"], 1);
}

#[tokio::test]
async fn conflicting_acquire_returns_409() {
    let (app, _state) = common::build_test_app();

    let response = app
        .clone()
        .oneshot(post(
            "/api/v1/slots/acquire",
            json!({ "slot": slot_json(1), "session_id": "s1" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(post(
            "/api/v1/slots/acquire",
            json!({ "slot": slot_json(1), "session_id": "s2" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CONFLICT);
    let json = body_json(response).await;
    assert_eq!(json["code"], "SLOT_CONFLICT");
}

#[tokio::test]
async fn reacquire_by_owner_returns_renewed_grant() {
    let (app, _state) = common::build_test_app();

    let body = json!({ "slot": slot_json(1), "session_id": "s1" });
    let response = app
        .clone()
        .oneshot(post("/api/v1/slots/acquire", body.clone()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(post("/api/v1/slots/acquire", body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["renew_count"], 1);
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn out_of_range_ttl_returns_400() {
    let (app, _state) = common::build_test_app();

    let response = app
        .oneshot(post(
            "/api/v1/slots/acquire",
            json!({ "slot": slot_json(1), "session_id": "s1", "ttl_secs": 1 }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn inverted_time_range_returns_400() {
    let (app, _state) = common::build_test_app();

    let mut slot = slot_json(1);
    slot["end"] = json!("17:00:00");

    let response = app
        .oneshot(post(
            "/api/v1/slots/acquire",
            json!({ "slot": slot, "session_id": "s1" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// ---------------------------------------------------------------------------
// Renew / release
// ---------------------------------------------------------------------------

#[tokio::test]
async fn renew_by_non_owner_returns_403() {
    let (app, _state) = common::build_test_app();

    let response = app
        .clone()
        .oneshot(post(
            "/api/v1/slots/acquire",
            json!({ "slot": slot_json(1), "session_id": "s1" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(post(
            "/api/v1/slots/renew",
            json!({ "slot": slot_json(1), "session_id": "s2" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let json = body_json(response).await;
    assert_eq!(json["code"], "NOT_OWNER");
}

#[tokio::test]
async fn renew_without_hold_returns_410() {
    let (app, _state) = common::build_test_app();

    let response = app
        .oneshot(post(
            "/api/v1/slots/renew",
            json!({ "slot": slot_json(1), "session_id": "s1" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::GONE);
    let json = body_json(response).await;
    assert_eq!(json["code"], "HOLD_EXPIRED");
}

#[tokio::test]
async fn release_frees_the_slot_for_others() {
    let (app, _state) = common::build_test_app();

    let response = app
        .clone()
        .oneshot(post(
            "/api/v1/slots/acquire",
            json!({ "slot": slot_json(1), "session_id": "s1" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(post(
            "/api/v1/slots/release",
            json!({ "slot": slot_json(1), "session_id": "s1" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["released"], true);

    let response = app
        .oneshot(post(
            "/api/v1/slots/acquire",
            json!({ "slot": slot_json(1), "session_id": "s2" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn release_all_reports_count_then_zero() {
    let (app, _state) = common::build_test_app();

    for court_id in 1..=3 {
        let response = app
            .clone()
            .oneshot(post(
                "/api/v1/slots/acquire",
                json!({ "slot": slot_json(court_id), "session_id": "s1" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let body = json!({ "session_id": "s1" });
    let response = app
        .clone()
        .oneshot(post("/api/v1/slots/release-all", body.clone()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["data"]["count"], 3);

    let response = app
        .oneshot(post("/api/v1/slots/release-all", body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["data"]["count"], 0);
}

// ---------------------------------------------------------------------------
// Finalize: persistence failure compensation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn finalize_with_unreachable_db_returns_retryable_503_and_frees_slot() {
    let (app, _state) = common::build_test_app();

    let response = app
        .clone()
        .oneshot(post(
            "/api/v1/slots/acquire",
            json!({ "slot": slot_json(1), "session_id": "s1" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(post(
            "/api/v1/slots/finalize",
            json!({
                "slot": slot_json(1),
                "session_id": "s1",
                "draft": { "user_id": null, "price_cents": 2500, "payment_ref": "pay_123" },
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let json = body_json(response).await;
    assert_eq!(json["code"], "PERSISTENCE_FAILURE");
    assert_eq!(json["retryable"], true);

    // The compensating rollback returned the slot to availability.
    let response = app
        .oneshot(post(
            "/api/v1/slots/acquire",
            json!({ "slot": slot_json(1), "session_id": "s2" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn finalize_without_hold_returns_410() {
    let (app, _state) = common::build_test_app();

    let response = app
        .oneshot(post(
            "/api/v1/slots/finalize",
            json!({
                "slot": slot_json(1),
                "session_id": "s1",
                "draft": { "user_id": null, "price_cents": 0, "payment_ref": null },
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::GONE);
}

// ---------------------------------------------------------------------------
// Availability snapshot
// ---------------------------------------------------------------------------

#[tokio::test]
async fn availability_lists_held_slots_in_scope() {
    let (app, _state) = common::build_test_app();

    let response = app
        .clone()
        .oneshot(post(
            "/api/v1/slots/acquire",
            json!({ "slot": slot_json(2), "session_id": "s1" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/v1/slots/1/2026-09-01")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    let data = json["data"].as_array().unwrap();
    assert_eq!(data.len(), 1);
    assert_eq!(data[0]["status"], "held");
    assert_eq!(data[0]["slot"]["court_id"], 2);

    // A different date in the same facility is an empty view.
    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/v1/slots/1/2026-09-02")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"].as_array().unwrap().len(), 0);
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

#[tokio::test]
async fn health_reports_degraded_without_database() {
    let (app, _state) = common::build_test_app();

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "degraded");
    assert_eq!(json["db_healthy"], false);
}
