//! Handlers for slot holds: acquire, renew, release, mass release,
//! finalize, and the availability snapshot.
//!
//! Sessions are identified by the id issued over the WebSocket
//! (`session.welcome`); holds may be anonymous. Every handler
//! re-validates against live registry state — the snapshot endpoint is
//! for display and reconciliation only.

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use chrono::NaiveDate;
use serde::Deserialize;

use courtside_core::reservation::{validate_slot_key, validate_ttl_secs, SlotKey, ViewScope};
use courtside_core::types::{DbId, SessionId};
use courtside_db::models::booking::BookingDraft;

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request DTOs
// ---------------------------------------------------------------------------

/// Body for acquiring or renewing a hold.
#[derive(Debug, Deserialize)]
pub struct HoldRequest {
    pub slot: SlotKey,
    pub session_id: SessionId,
    /// Omitted → the configured default TTL.
    pub ttl_secs: Option<i64>,
    /// Optional authenticated user to attach to the hold.
    pub user_id: Option<DbId>,
}

/// Body for releasing a single hold.
#[derive(Debug, Deserialize)]
pub struct ReleaseRequest {
    pub slot: SlotKey,
    pub session_id: SessionId,
}

/// Body for releasing every hold of a session.
#[derive(Debug, Deserialize)]
pub struct ReleaseAllRequest {
    pub session_id: SessionId,
}

/// Body for finalizing a hold into a booking.
#[derive(Debug, Deserialize)]
pub struct FinalizeRequest {
    pub slot: SlotKey,
    pub session_id: SessionId,
    pub draft: BookingDraft,
}

fn validate_hold_request(slot: &SlotKey, session_id: &str) -> Result<(), AppError> {
    validate_slot_key(slot).map_err(AppError::BadRequest)?;
    if session_id.is_empty() {
        return Err(AppError::BadRequest("session_id must not be empty".into()));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Hold endpoints
// ---------------------------------------------------------------------------

/// POST /api/v1/slots/acquire
///
/// Attempt to acquire an exclusive hold on a slot. Returns 409 if the
/// slot is held by another session or already booked.
pub async fn acquire_slot(
    State(state): State<AppState>,
    Json(input): Json<HoldRequest>,
) -> AppResult<impl IntoResponse> {
    validate_hold_request(&input.slot, &input.session_id)?;
    let ttl_secs = input
        .ttl_secs
        .unwrap_or(state.config.hold.default_ttl_secs);
    validate_ttl_secs(ttl_secs).map_err(AppError::BadRequest)?;

    let grant = state
        .lock_manager
        .acquire(input.slot.clone(), &input.session_id, input.user_id, ttl_secs)
        .await?;

    tracing::info!(
        session_id = %input.session_id,
        slot = %input.slot,
        expires_at = %grant.expires_at,
        "Hold acquired"
    );
    Ok(Json(DataResponse { data: grant }))
}

/// POST /api/v1/slots/renew
///
/// Extend the expiration of a held slot. Only the hold owner can renew.
pub async fn renew_slot(
    State(state): State<AppState>,
    Json(input): Json<HoldRequest>,
) -> AppResult<impl IntoResponse> {
    validate_hold_request(&input.slot, &input.session_id)?;
    let ttl_secs = input
        .ttl_secs
        .unwrap_or(state.config.hold.default_ttl_secs);
    validate_ttl_secs(ttl_secs).map_err(AppError::BadRequest)?;

    let grant = state
        .lock_manager
        .renew(input.slot.clone(), &input.session_id, ttl_secs)
        .await?;

    tracing::debug!(
        session_id = %input.session_id,
        slot = %input.slot,
        new_expires_at = %grant.expires_at,
        "Hold renewed"
    );
    Ok(Json(DataResponse { data: grant }))
}

/// POST /api/v1/slots/release
///
/// Release a held slot. Only the hold owner can release.
pub async fn release_slot(
    State(state): State<AppState>,
    Json(input): Json<ReleaseRequest>,
) -> AppResult<impl IntoResponse> {
    validate_hold_request(&input.slot, &input.session_id)?;

    state
        .lock_manager
        .release(input.slot.clone(), &input.session_id)
        .await?;

    tracing::info!(
        session_id = %input.session_id,
        slot = %input.slot,
        "Hold released"
    );
    Ok(Json(DataResponse {
        data: serde_json::json!({ "released": true }),
    }))
}

/// POST /api/v1/slots/release-all
///
/// Release every hold owned by a session. Idempotent: repeated calls
/// report a count of zero.
pub async fn release_all(
    State(state): State<AppState>,
    Json(input): Json<ReleaseAllRequest>,
) -> AppResult<impl IntoResponse> {
    if input.session_id.is_empty() {
        return Err(AppError::BadRequest("session_id must not be empty".into()));
    }

    let count = state.lock_manager.release_all(&input.session_id).await;

    if count > 0 {
        tracing::info!(session_id = %input.session_id, count, "All holds released");
    }
    Ok(Json(DataResponse {
        data: serde_json::json!({ "count": count }),
    }))
}

/// POST /api/v1/slots/finalize
///
/// Convert an owned, live hold into a durable booking. Returns 410 if
/// the hold expired first, 409 if the slot is already booked, and a
/// retryable 503 if the booking row could not be written (the slot
/// returns to availability).
pub async fn finalize_slot(
    State(state): State<AppState>,
    Json(input): Json<FinalizeRequest>,
) -> AppResult<impl IntoResponse> {
    validate_hold_request(&input.slot, &input.session_id)?;
    if input.draft.price_cents < 0 {
        return Err(AppError::BadRequest("price_cents must not be negative".into()));
    }

    let booking = state
        .finalizer
        .finalize(input.slot, &input.session_id, input.draft)
        .await?;

    Ok(Json(DataResponse { data: booking }))
}

// ---------------------------------------------------------------------------
// Availability
// ---------------------------------------------------------------------------

/// GET /api/v1/slots/{facility_id}/{date}
///
/// Authoritative snapshot of every held or booked slot in a
/// facility/date view. Clients reconcile against this after missed
/// broadcasts; free slots are simply absent.
pub async fn get_availability(
    State(state): State<AppState>,
    Path((facility_id, date)): Path<(DbId, NaiveDate)>,
) -> AppResult<impl IntoResponse> {
    if facility_id <= 0 {
        return Err(AppError::BadRequest(format!(
            "facility_id must be positive, got {facility_id}"
        )));
    }

    let scope = ViewScope { facility_id, date };
    let snapshot = state.lock_manager.snapshot(scope).await;
    Ok(Json(DataResponse { data: snapshot }))
}
