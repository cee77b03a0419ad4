//! WebSocket infrastructure: session management, the connection
//! handler, heartbeat pings, and disconnect reconciliation.

pub mod handler;
pub mod heartbeat;
pub mod manager;
pub mod reconciler;

pub use handler::ws_handler;
pub use heartbeat::start_heartbeat;
pub use manager::SessionManager;
pub use reconciler::DisconnectReconciler;
