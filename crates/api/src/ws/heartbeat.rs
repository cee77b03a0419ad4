use std::sync::Arc;
use std::time::Duration;

use crate::config::HoldConfig;
use crate::ws::manager::SessionManager;
use crate::ws::reconciler::DisconnectReconciler;

/// Spawn a background task that sends periodic Ping frames to all
/// connected clients and hands sessions that stopped answering to the
/// disconnect reconciler.
///
/// Heartbeat timeout is the sole disconnect trigger for half-open
/// connections: a session that neither pongs nor sends an application
/// heartbeat within the timeout is removed and its holds enter the
/// grace window. The returned `JoinHandle` can be used to abort the
/// task during shutdown.
pub fn start_heartbeat(
    sessions: Arc<SessionManager>,
    reconciler: Arc<DisconnectReconciler>,
    config: &HoldConfig,
) -> tokio::task::JoinHandle<()> {
    let interval = Duration::from_secs(config.heartbeat_interval_secs);
    let timeout_secs = config.heartbeat_timeout_secs;

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);

        loop {
            ticker.tick().await;

            let count = sessions.connection_count().await;
            tracing::debug!(count, "WebSocket heartbeat ping");
            sessions.ping_all().await;

            for session_id in sessions.stale_sessions(timeout_secs).await {
                tracing::info!(session_id = %session_id, "Heartbeat timeout, treating as disconnect");
                sessions.remove(&session_id).await;
                reconciler.schedule(session_id).await;
            }
        }
    })
}
