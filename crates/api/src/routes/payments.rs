//! Route definitions for payment collaborator webhooks.

use axum::routing::post;
use axum::Router;

use crate::handlers::payments;
use crate::state::AppState;

/// Payment webhook routes mounted at `/payments`.
///
/// ```text
/// POST /confirmed   -> payment_confirmed
/// POST /failed      -> payment_failed
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/confirmed", post(payments::payment_confirmed))
        .route("/failed", post(payments::payment_failed))
}
