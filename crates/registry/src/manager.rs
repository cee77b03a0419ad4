//! Orchestrates hold operations against the slot registry and session
//! tracker, enforcing the hold state machine:
//!
//! ```text
//! FREE -> HELD   (acquire)
//! HELD -> HELD   (renew, idempotent re-acquire by owner)
//! HELD -> FREE   (release, expiry, disconnect reconciliation)
//! HELD -> BOOKED (finalize; terminal except for persistence rollback)
//! ```
//!
//! Every transition is published on the event bus so scoped viewers
//! stay current. The manager is a plain struct designed to be shared
//! via `Arc<LockManager>` — construct one per process (or per test)
//! and inject it; there is no global instance.

use std::sync::Arc;

use chrono::{Duration, Utc};
use serde::Serialize;

use courtside_core::reservation::{HoldError, SlotKey, ViewScope};
use courtside_core::types::{DbId, SessionId, Timestamp};
use courtside_events::{EventBus, SlotEvent};

use crate::registry::{Hold, SlotRegistry, SlotStatus};
use crate::sessions::SessionTracker;

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// A granted (or renewed) hold, as returned to the requesting client.
#[derive(Debug, Clone, Serialize)]
pub struct HoldGrant {
    pub slot: SlotKey,
    pub expires_at: Timestamp,
    pub renew_count: u32,
}

/// An in-memory HELD→BOOKED transition awaiting durable persistence.
///
/// Handed to the reservation finalizer, which either confirms the
/// booking id or rolls the slot back to FREE.
#[derive(Debug, Clone)]
pub struct BookedClaim {
    pub slot: SlotKey,
    pub hold: Hold,
}

// ---------------------------------------------------------------------------
// LockManager
// ---------------------------------------------------------------------------

pub struct LockManager {
    registry: SlotRegistry,
    tracker: SessionTracker,
    bus: Arc<EventBus>,
}

impl LockManager {
    pub fn new(bus: Arc<EventBus>) -> Self {
        Self {
            registry: SlotRegistry::new(),
            tracker: SessionTracker::new(),
            bus,
        }
    }

    /// Attempt to grant an exclusive hold on a slot.
    ///
    /// First writer wins: losers receive [`HoldError::Conflict`] with
    /// no ownership side effects. Re-acquiring a slot the session
    /// already holds extends the TTL instead. `ttl_secs` must already
    /// be validated at the calling edge.
    pub async fn acquire(
        &self,
        slot: SlotKey,
        session_id: &SessionId,
        user_id: Option<DbId>,
        ttl_secs: i64,
    ) -> Result<HoldGrant, HoldError> {
        let now = Utc::now();
        let acquired = self
            .registry
            .try_acquire(&slot, session_id, user_id, Duration::seconds(ttl_secs), now)
            .await?;

        if let Some(stale_owner) = &acquired.evicted_session {
            self.tracker.remove(stale_owner, &slot).await;
        }
        self.tracker.add(session_id, slot.clone()).await;

        self.bus
            .publish(SlotEvent::locked(slot.clone(), acquired.hold.expires_at));

        Ok(HoldGrant {
            slot,
            expires_at: acquired.hold.expires_at,
            renew_count: acquired.hold.renew_count,
        })
    }

    /// Extend the caller's hold. Only the recorded owner may renew,
    /// and only while the hold is still live.
    pub async fn renew(
        &self,
        slot: SlotKey,
        session_id: &SessionId,
        ttl_secs: i64,
    ) -> Result<HoldGrant, HoldError> {
        let now = Utc::now();
        let result = self
            .registry
            .renew(&slot, session_id, Duration::seconds(ttl_secs), now)
            .await;

        match result {
            Ok(hold) => {
                // Republish so scoped viewers see the new expiry.
                self.bus
                    .publish(SlotEvent::locked(slot.clone(), hold.expires_at));
                Ok(HoldGrant {
                    slot,
                    expires_at: hold.expires_at,
                    renew_count: hold.renew_count,
                })
            }
            Err(HoldError::Expired) => {
                self.tracker.remove(session_id, &slot).await;
                self.bus.publish(SlotEvent::freed(slot));
                Err(HoldError::Expired)
            }
            Err(e) => Err(e),
        }
    }

    /// Release the caller's hold, returning the slot to FREE.
    pub async fn release(&self, slot: SlotKey, session_id: &SessionId) -> Result<(), HoldError> {
        self.registry.release(&slot, session_id).await?;
        self.tracker.remove(session_id, &slot).await;
        self.bus.publish(SlotEvent::freed(slot));
        Ok(())
    }

    /// Release every hold owned by a session. Returns the number of
    /// slots actually freed.
    ///
    /// Idempotent: the tracker drain is atomic, so concurrent or
    /// repeated invocations (disconnect reconciliation racing an
    /// explicit client cleanup) see an empty set and report zero.
    pub async fn release_all(&self, session_id: &SessionId) -> usize {
        let mut count = 0;
        for slot in self.tracker.take_all(session_id).await {
            // The registry may have lazily re-granted the key to
            // another session; only free what the session still owns.
            if self.registry.release(&slot, session_id).await.is_ok() {
                self.bus.publish(SlotEvent::freed(slot));
                count += 1;
            }
        }
        count
    }

    /// Transition the caller's live hold to BOOKED in memory.
    ///
    /// The transition serializes with the expiry sweep on the same
    /// key: a hold that expired in the same instant fails cleanly with
    /// [`HoldError::Expired`] and no claim is produced. The returned
    /// claim must be either confirmed ([`Self::confirm_booking`]) or
    /// rolled back ([`Self::rollback_to_free`]) by the caller.
    pub async fn finalize(
        &self,
        slot: SlotKey,
        session_id: &SessionId,
    ) -> Result<BookedClaim, HoldError> {
        let now = Utc::now();
        let result = self.registry.begin_finalize(&slot, session_id, now).await;

        match result {
            Ok(hold) => {
                self.tracker.remove(session_id, &slot).await;
                Ok(BookedClaim { slot, hold })
            }
            Err(HoldError::Expired) => {
                self.tracker.remove(session_id, &slot).await;
                self.bus.publish(SlotEvent::freed(slot));
                Err(HoldError::Expired)
            }
            Err(e) => Err(e),
        }
    }

    /// Stamp the persisted booking id onto the BOOKED slot and
    /// broadcast `slot.booked`.
    pub async fn confirm_booking(&self, slot: &SlotKey, booking_id: DbId) {
        self.registry.confirm_booking(slot, booking_id).await;
        self.bus.publish(SlotEvent::booked(slot.clone(), booking_id));
    }

    /// Compensating path for booking-persistence failure: return a
    /// BOOKED slot to FREE and broadcast `slot.freed`. The only way a
    /// BOOKED slot becomes reservable again.
    pub async fn rollback_to_free(&self, slot: &SlotKey) -> bool {
        let rolled_back = self.registry.rollback_booked(slot).await;
        if rolled_back {
            tracing::warn!(slot = %slot, "Booked slot rolled back to free");
            self.bus.publish(SlotEvent::freed(slot.clone()));
        }
        rolled_back
    }

    /// Free every hold whose TTL elapsed, purge the tracker, and
    /// broadcast `slot.freed` for each. Returns the number freed.
    pub async fn sweep_expired(&self) -> usize {
        self.sweep_expired_at(Utc::now()).await
    }

    /// Sweep with an explicit evaluation time.
    pub async fn sweep_expired_at(&self, now: Timestamp) -> usize {
        let swept = self.registry.sweep_expired(now).await;
        let count = swept.len();
        for (slot, hold) in swept {
            self.tracker.remove(&hold.session_id, &slot).await;
            tracing::debug!(slot = %slot, session_id = %hold.session_id, "Hold expired");
            self.bus.publish(SlotEvent::freed(slot));
        }
        count
    }

    /// Seed BOOKED tombstones from previously persisted bookings so a
    /// restarted process refuses holds on already-sold slots. Live
    /// holds are never overwritten. Returns the number inserted.
    pub async fn hydrate_booked(&self, bookings: Vec<(SlotKey, DbId)>) -> usize {
        let count = bookings.len();
        for (slot, booking_id) in bookings {
            self.registry.insert_booked(slot, booking_id).await;
        }
        count
    }

    /// Consistent availability snapshot for one facility/date view.
    ///
    /// For display and reconciliation only: an acquire always
    /// re-validates against live state.
    pub async fn snapshot(&self, scope: ViewScope) -> Vec<SlotStatus> {
        self.registry.snapshot_scope(scope, Utc::now()).await
    }

    /// Slot keys currently tracked for a session.
    pub async fn held_by(&self, session_id: &SessionId) -> Vec<SlotKey> {
        self.tracker.held_by(session_id).await
    }
}
