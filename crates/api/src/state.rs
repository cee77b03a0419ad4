use std::sync::Arc;

use courtside_events::EventBus;
use courtside_registry::LockManager;

use crate::config::ServerConfig;
use crate::finalizer::ReservationFinalizer;
use crate::ws::{DisconnectReconciler, SessionManager};

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc`).
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: courtside_db::DbPool,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// WebSocket session manager (browser clients).
    pub sessions: Arc<SessionManager>,
    /// The slot-locking engine.
    pub lock_manager: Arc<LockManager>,
    /// Grace-period release of disconnected sessions' holds.
    pub reconciler: Arc<DisconnectReconciler>,
    /// Converts owned holds into durable bookings.
    pub finalizer: Arc<ReservationFinalizer>,
    /// Centralized bus for slot state-change events.
    pub event_bus: Arc<EventBus>,
}
