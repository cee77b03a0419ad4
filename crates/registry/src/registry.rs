//! Authoritative in-memory map from slot key to hold state.
//!
//! The registry provides the atomic primitives the [`LockManager`]
//! composes: every operation on one slot key runs under that key's
//! shard mutex, so acquire/renew/finalize/sweep on the same key
//! serialize relative to one another while different shards proceed in
//! parallel. No operation performs I/O inside a shard critical
//! section.
//!
//! FREE is the absence of an entry. A BOOKED entry is a tombstone that
//! permanently excludes the slot from future holds; it is removed only
//! by [`SlotRegistry::rollback_booked`], the compensating path for a
//! failed booking persistence.
//!
//! [`LockManager`]: crate::manager::LockManager

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};

use serde::Serialize;
use tokio::sync::Mutex;

use courtside_core::reservation::{HoldError, SlotKey, ViewScope};
use courtside_core::types::{DbId, SessionId, Timestamp};

/// Number of mutex-guarded shards. Keys are distributed by hash.
const SHARD_COUNT: usize = 16;

// ---------------------------------------------------------------------------
// Slot state
// ---------------------------------------------------------------------------

/// A temporary exclusive hold on a slot.
#[derive(Debug, Clone)]
pub struct Hold {
    pub session_id: SessionId,
    pub user_id: Option<DbId>,
    pub granted_at: Timestamp,
    pub expires_at: Timestamp,
    pub renew_count: u32,
}

impl Hold {
    fn is_expired(&self, now: Timestamp) -> bool {
        self.expires_at <= now
    }
}

/// State of a non-FREE slot.
#[derive(Debug, Clone)]
enum SlotState {
    /// Temporarily held by a session, subject to TTL expiry.
    Held(Hold),
    /// Finalized. `booking_id` is stamped once the booking row exists.
    Booked { booking_id: Option<DbId> },
}

/// Outcome of a successful acquire.
#[derive(Debug)]
pub(crate) struct Acquired {
    pub hold: Hold,
    /// Owner of a stale hold that was lazily evicted to grant this one.
    pub evicted_session: Option<SessionId>,
}

/// Snapshot entry for one non-free slot in a view, served by the
/// availability endpoint so clients can reconcile after missed
/// broadcasts.
#[derive(Debug, Clone, Serialize)]
pub struct SlotStatus {
    pub slot: SlotKey,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<Timestamp>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub booking_id: Option<DbId>,
}

// ---------------------------------------------------------------------------
// SlotRegistry
// ---------------------------------------------------------------------------

/// Sharded slot-state map.
///
/// All methods take the evaluation time explicitly so that expiry
/// semantics are deterministic and testable; callers pass
/// `Utc::now()` in production.
pub struct SlotRegistry {
    shards: Vec<Mutex<HashMap<SlotKey, SlotState>>>,
}

impl SlotRegistry {
    pub fn new() -> Self {
        Self {
            shards: (0..SHARD_COUNT).map(|_| Mutex::new(HashMap::new())).collect(),
        }
    }

    fn shard(&self, key: &SlotKey) -> &Mutex<HashMap<SlotKey, SlotState>> {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        &self.shards[(hasher.finish() as usize) % SHARD_COUNT]
    }

    /// Atomic check-and-set acquire.
    ///
    /// - FREE (absent, or held but expired) → grant a new hold.
    /// - HELD by the same session → idempotent renew.
    /// - HELD by another live session → `Conflict`.
    /// - BOOKED → `AlreadyBooked`.
    pub(crate) async fn try_acquire(
        &self,
        key: &SlotKey,
        session_id: &SessionId,
        user_id: Option<DbId>,
        ttl: chrono::Duration,
        now: Timestamp,
    ) -> Result<Acquired, HoldError> {
        let mut shard = self.shard(key).lock().await;

        let evicted_session = match shard.get(key) {
            None => None,
            Some(SlotState::Booked { .. }) => return Err(HoldError::AlreadyBooked),
            Some(SlotState::Held(hold)) => {
                if hold.session_id == *session_id {
                    // Idempotent re-acquire by the current owner.
                    let mut hold = hold.clone();
                    hold.expires_at = now + ttl;
                    hold.renew_count += 1;
                    shard.insert(key.clone(), SlotState::Held(hold.clone()));
                    return Ok(Acquired {
                        hold,
                        evicted_session: None,
                    });
                }
                if !hold.is_expired(now) {
                    return Err(HoldError::Conflict {
                        expires_at: hold.expires_at,
                    });
                }
                // Stale hold: treat as FREE, remember the old owner so
                // the caller can purge its tracker entry.
                Some(hold.session_id.clone())
            }
        };

        let hold = Hold {
            session_id: session_id.clone(),
            user_id,
            granted_at: now,
            expires_at: now + ttl,
            renew_count: 0,
        };
        shard.insert(key.clone(), SlotState::Held(hold.clone()));
        Ok(Acquired {
            hold,
            evicted_session,
        })
    }

    /// Extend the owner's hold. Expired holds are evicted and reported
    /// as `Expired`; foreign holds yield `NotOwner`.
    pub(crate) async fn renew(
        &self,
        key: &SlotKey,
        session_id: &SessionId,
        ttl: chrono::Duration,
        now: Timestamp,
    ) -> Result<Hold, HoldError> {
        let mut shard = self.shard(key).lock().await;

        match shard.get(key) {
            None => Err(HoldError::Expired),
            Some(SlotState::Booked { .. }) => Err(HoldError::AlreadyBooked),
            Some(SlotState::Held(hold)) => {
                if hold.session_id != *session_id {
                    return Err(HoldError::NotOwner);
                }
                if hold.is_expired(now) {
                    shard.remove(key);
                    return Err(HoldError::Expired);
                }
                let mut hold = hold.clone();
                hold.expires_at = now + ttl;
                hold.renew_count += 1;
                shard.insert(key.clone(), SlotState::Held(hold.clone()));
                Ok(hold)
            }
        }
    }

    /// Remove the owner's hold. An expired-but-unswept own hold may
    /// still be released; anything else yields `NotOwner`.
    pub(crate) async fn release(
        &self,
        key: &SlotKey,
        session_id: &SessionId,
    ) -> Result<(), HoldError> {
        let mut shard = self.shard(key).lock().await;

        match shard.get(key) {
            Some(SlotState::Held(hold)) if hold.session_id == *session_id => {
                shard.remove(key);
                Ok(())
            }
            _ => Err(HoldError::NotOwner),
        }
    }

    /// Transition the owner's live hold to BOOKED.
    ///
    /// Runs under the shard mutex, so it is mutually exclusive with
    /// the expiry sweep on the same key: either the sweep frees the
    /// slot first (and this returns `Expired`), or the transition wins
    /// and the sweep no longer sees a hold.
    pub(crate) async fn begin_finalize(
        &self,
        key: &SlotKey,
        session_id: &SessionId,
        now: Timestamp,
    ) -> Result<Hold, HoldError> {
        let mut shard = self.shard(key).lock().await;

        match shard.get(key) {
            None => Err(HoldError::Expired),
            Some(SlotState::Booked { .. }) => Err(HoldError::AlreadyBooked),
            Some(SlotState::Held(hold)) => {
                if hold.session_id != *session_id {
                    return Err(HoldError::NotOwner);
                }
                if hold.is_expired(now) {
                    shard.remove(key);
                    return Err(HoldError::Expired);
                }
                let hold = hold.clone();
                shard.insert(key.clone(), SlotState::Booked { booking_id: None });
                Ok(hold)
            }
        }
    }

    /// Stamp the persisted booking id onto a BOOKED tombstone.
    pub(crate) async fn confirm_booking(&self, key: &SlotKey, booking_id: DbId) {
        let mut shard = self.shard(key).lock().await;
        if let Some(SlotState::Booked { booking_id: id }) = shard.get_mut(key) {
            *id = Some(booking_id);
        }
    }

    /// Remove a BOOKED tombstone, returning the slot to FREE.
    ///
    /// The one BOOKED→FREE path, reserved for booking-persistence
    /// failure. Returns `false` if the slot was not BOOKED.
    pub(crate) async fn rollback_booked(&self, key: &SlotKey) -> bool {
        let mut shard = self.shard(key).lock().await;
        match shard.get(key) {
            Some(SlotState::Booked { .. }) => {
                shard.remove(key);
                true
            }
            _ => false,
        }
    }

    /// Insert a BOOKED tombstone directly (startup hydration from the
    /// bookings table). Never overwrites a live hold.
    pub(crate) async fn insert_booked(&self, key: SlotKey, booking_id: DbId) {
        let mut shard = self.shard(&key).lock().await;
        shard.entry(key).or_insert(SlotState::Booked {
            booking_id: Some(booking_id),
        });
    }

    /// Remove every hold whose TTL elapsed, returning the freed keys
    /// and their former holds.
    pub(crate) async fn sweep_expired(&self, now: Timestamp) -> Vec<(SlotKey, Hold)> {
        let mut swept = Vec::new();
        for shard in &self.shards {
            let mut shard = shard.lock().await;
            let expired: Vec<SlotKey> = shard
                .iter()
                .filter_map(|(key, state)| match state {
                    SlotState::Held(hold) if hold.is_expired(now) => Some(key.clone()),
                    _ => None,
                })
                .collect();
            for key in expired {
                if let Some(SlotState::Held(hold)) = shard.remove(&key) {
                    swept.push((key, hold));
                }
            }
        }
        swept
    }

    /// Consistent snapshot of every non-free slot in a view.
    ///
    /// Expired-but-unswept holds are reported as free (omitted). The
    /// snapshot is for display and reconciliation only — acquires
    /// always re-validate against live state.
    pub(crate) async fn snapshot_scope(&self, scope: ViewScope, now: Timestamp) -> Vec<SlotStatus> {
        let mut out = Vec::new();
        for shard in &self.shards {
            let shard = shard.lock().await;
            for (key, state) in shard.iter() {
                if key.scope() != scope {
                    continue;
                }
                match state {
                    SlotState::Held(hold) if !hold.is_expired(now) => out.push(SlotStatus {
                        slot: key.clone(),
                        status: "held",
                        expires_at: Some(hold.expires_at),
                        booking_id: None,
                    }),
                    SlotState::Held(_) => {}
                    SlotState::Booked { booking_id } => out.push(SlotStatus {
                        slot: key.clone(),
                        status: "booked",
                        expires_at: None,
                        booking_id: *booking_id,
                    }),
                }
            }
        }
        out.sort_by(|a, b| (a.slot.court_id, a.slot.start).cmp(&(b.slot.court_id, b.slot.start)));
        out
    }

    /// Number of non-free entries across all shards.
    pub async fn len(&self) -> usize {
        let mut total = 0;
        for shard in &self.shards {
            total += shard.lock().await.len();
        }
        total
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Default for SlotRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
