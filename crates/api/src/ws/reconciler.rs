//! Grace-period release of disconnected sessions' holds.
//!
//! When the transport reports a disconnect (socket close or heartbeat
//! timeout), the session is scheduled here with a deadline instead of
//! being released immediately: a brief network blip followed by a
//! reconnect with the same session id cancels the pending entry and
//! the client keeps its holds. Once the grace deadline passes, every
//! hold the session still owns is released via the lock manager's
//! idempotent `release_all`, so racing a second disconnect signal or
//! an explicit client cleanup is harmless.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use courtside_core::types::{SessionId, Timestamp};
use courtside_registry::LockManager;

/// How often pending disconnects are checked against their deadlines.
const RECONCILE_INTERVAL: Duration = Duration::from_secs(1);

pub struct DisconnectReconciler {
    /// Sessions awaiting release, keyed to their grace deadline.
    pending: RwLock<HashMap<SessionId, Timestamp>>,
    lock_manager: Arc<LockManager>,
    grace: chrono::Duration,
}

impl DisconnectReconciler {
    pub fn new(lock_manager: Arc<LockManager>, grace_secs: i64) -> Self {
        Self {
            pending: RwLock::new(HashMap::new()),
            lock_manager,
            grace: chrono::Duration::seconds(grace_secs),
        }
    }

    /// Start the grace clock for a disconnected session.
    ///
    /// Re-scheduling an already-pending session keeps the earlier
    /// deadline, so duplicate disconnect signals cannot extend the
    /// grace window.
    pub async fn schedule(&self, session_id: SessionId) {
        let deadline = Utc::now() + self.grace;
        let mut pending = self.pending.write().await;
        let entry = pending.entry(session_id.clone()).or_insert(deadline);
        tracing::debug!(
            session_id = %session_id,
            deadline = %entry,
            "Disconnect scheduled for reconciliation"
        );
    }

    /// Cancel a pending release because the session reconnected.
    /// Returns `true` if there was a pending entry to cancel.
    pub async fn cancel(&self, session_id: &str) -> bool {
        let cancelled = self.pending.write().await.remove(session_id).is_some();
        if cancelled {
            tracing::info!(session_id = %session_id, "Reconnected within grace period, holds restored");
        }
        cancelled
    }

    /// Number of sessions currently inside their grace window.
    pub async fn pending_count(&self) -> usize {
        self.pending.read().await.len()
    }

    /// Release the holds of every session whose grace deadline has
    /// passed as of `now`. Returns the number of sessions reconciled.
    ///
    /// A failure to release one session's holds never blocks the
    /// others.
    pub async fn reconcile_due(&self, now: Timestamp) -> usize {
        let due: Vec<SessionId> = {
            let mut pending = self.pending.write().await;
            let expired: Vec<SessionId> = pending
                .iter()
                .filter_map(|(id, deadline)| (*deadline <= now).then(|| id.clone()))
                .collect();
            for id in &expired {
                pending.remove(id);
            }
            expired
        };

        let count = due.len();
        for session_id in due {
            let freed = self.lock_manager.release_all(&session_id).await;
            if freed > 0 {
                tracing::info!(
                    session_id = %session_id,
                    freed,
                    "Released holds of disconnected session"
                );
            }
        }
        count
    }

    /// Run the reconciliation loop until `cancel` is triggered.
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) {
        tracing::info!(
            grace_secs = self.grace.num_seconds(),
            "Disconnect reconciler started"
        );

        let mut ticker = tokio::time::interval(RECONCILE_INTERVAL);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Disconnect reconciler stopping");
                    break;
                }
                _ = ticker.tick() => {
                    self.reconcile_due(Utc::now()).await;
                }
            }
        }
    }
}
