//! Route definitions for slot holds and availability.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::slots;
use crate::state::AppState;

/// Slot routes mounted at `/slots`.
///
/// ```text
/// POST /acquire                      -> acquire_slot
/// POST /renew                        -> renew_slot
/// POST /release                      -> release_slot
/// POST /release-all                  -> release_all
/// POST /finalize                     -> finalize_slot
/// GET  /{facility_id}/{date}         -> get_availability
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/acquire", post(slots::acquire_slot))
        .route("/renew", post(slots::renew_slot))
        .route("/release", post(slots::release_slot))
        .route("/release-all", post(slots::release_all))
        .route("/finalize", post(slots::finalize_slot))
        .route("/{facility_id}/{date}", get(slots::get_availability))
}
