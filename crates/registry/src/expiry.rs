//! Periodic sweep of expired holds.
//!
//! Spawns alongside the server to guarantee no hold survives past its
//! TTL even if nobody touches the slot again: the sweep purges stale
//! registry entries and tracker references and fires proactive
//! `slot.freed` broadcasts so other viewers learn of the freed slot
//! without polling. Runs on a fixed interval using
//! `tokio::time::interval`.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::manager::LockManager;

/// Run the expired-hold sweep loop until `cancel` is triggered.
pub async fn run(manager: Arc<LockManager>, interval: Duration, cancel: CancellationToken) {
    tracing::info!(
        interval_secs = interval.as_secs(),
        "Hold expiry sweep started"
    );

    let mut ticker = tokio::time::interval(interval);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Hold expiry sweep stopping");
                break;
            }
            _ = ticker.tick() => {
                let freed = manager.sweep_expired().await;
                if freed > 0 {
                    tracing::info!(freed, "Expiry sweep: released stale holds");
                } else {
                    tracing::trace!("Expiry sweep: nothing to release");
                }
            }
        }
    }
}
