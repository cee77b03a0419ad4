//! Webhook handlers for the external payment collaborator.
//!
//! A confirmed payment finalizes the payer's hold; a failed or
//! cancelled payment releases it so the slot returns to availability.

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;

use courtside_core::reservation::{validate_slot_key, SlotKey};
use courtside_core::types::{DbId, SessionId};
use courtside_db::models::booking::BookingDraft;

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

/// Payload for a successful payment notification.
#[derive(Debug, Deserialize)]
pub struct PaymentConfirmedRequest {
    pub slot: SlotKey,
    pub session_id: SessionId,
    pub payment_ref: String,
    pub user_id: Option<DbId>,
    /// Amount charged; omitted for zero-cost reservations.
    pub price_cents: Option<i64>,
}

/// Payload for a failed or cancelled payment notification.
#[derive(Debug, Deserialize)]
pub struct PaymentFailedRequest {
    pub slot: SlotKey,
    pub session_id: SessionId,
}

/// POST /api/v1/payments/confirmed
///
/// Finalize the payer's hold into a booking carrying the payment
/// reference.
pub async fn payment_confirmed(
    State(state): State<AppState>,
    Json(input): Json<PaymentConfirmedRequest>,
) -> AppResult<impl IntoResponse> {
    validate_slot_key(&input.slot).map_err(AppError::BadRequest)?;
    if input.payment_ref.trim().is_empty() {
        return Err(AppError::BadRequest("payment_ref must not be empty".into()));
    }

    let draft = BookingDraft {
        user_id: input.user_id,
        price_cents: input.price_cents.unwrap_or(0),
        payment_ref: Some(input.payment_ref.clone()),
    };

    let booking = state
        .finalizer
        .finalize(input.slot, &input.session_id, draft)
        .await?;

    tracing::info!(
        booking_id = booking.id,
        payment_ref = %input.payment_ref,
        "Payment confirmed, booking created"
    );
    Ok(Json(DataResponse { data: booking }))
}

/// POST /api/v1/payments/failed
///
/// Release the payer's hold after a failed or cancelled payment. A
/// hold that already expired or changed hands reports `released: false`
/// rather than an error — the webhook retries must stay harmless.
pub async fn payment_failed(
    State(state): State<AppState>,
    Json(input): Json<PaymentFailedRequest>,
) -> AppResult<impl IntoResponse> {
    validate_slot_key(&input.slot).map_err(AppError::BadRequest)?;

    let released = state
        .lock_manager
        .release(input.slot.clone(), &input.session_id)
        .await
        .is_ok();

    tracing::info!(
        session_id = %input.session_id,
        slot = %input.slot,
        released,
        "Payment failed or cancelled"
    );
    Ok(Json(DataResponse {
        data: serde_json::json!({ "released": released }),
    }))
}
