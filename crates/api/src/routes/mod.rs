pub mod health;
pub mod payments;
pub mod slots;

use axum::routing::get;
use axum::Router;

use crate::state::AppState;
use crate::ws;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /ws                                  WebSocket (sessions + slot events)
///
/// /slots/acquire                       acquire a hold (POST)
/// /slots/renew                         extend a hold (POST)
/// /slots/release                       release a hold (POST)
/// /slots/release-all                   release a session's holds (POST)
/// /slots/finalize                      convert a hold into a booking (POST)
/// /slots/{facility_id}/{date}          availability snapshot (GET)
///
/// /payments/confirmed                  payment webhook -> finalize (POST)
/// /payments/failed                     payment webhook -> release (POST)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/ws", get(ws::ws_handler))
        .nest("/slots", slots::router())
        .nest("/payments", payments::router())
}
