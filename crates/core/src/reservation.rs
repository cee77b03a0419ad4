//! Reservation domain: slot identity, hold rules, and the realtime
//! message protocol.
//!
//! This module lives in `core` (zero internal deps) so that the lock
//! registry, the API/WebSocket layer, and the database layer all
//! reference the same slot key type, TTL limits, and message protocol.

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::types::{DbId, SessionId, Timestamp};

// ---------------------------------------------------------------------------
// Hold TTL constants
// ---------------------------------------------------------------------------

/// Default hold time-to-live in seconds (2 minutes).
pub const DEFAULT_HOLD_TTL_SECS: i64 = 120;

/// Maximum allowed hold TTL in seconds (15 minutes).
pub const MAX_HOLD_TTL_SECS: i64 = 900;

/// Minimum hold TTL in seconds.
pub const MIN_HOLD_TTL_SECS: i64 = 15;

/// How often the expired-hold sweep runs (in seconds).
pub const HOLD_SWEEP_INTERVAL_SECS: u64 = 5;

// ---------------------------------------------------------------------------
// Session liveness constants
// ---------------------------------------------------------------------------

/// Interval between WebSocket heartbeat pings (in seconds).
pub const HEARTBEAT_INTERVAL_SECS: u64 = 30;

/// Sessions with no heartbeat for this many seconds are treated as
/// disconnected.
pub const HEARTBEAT_TIMEOUT_SECS: i64 = 90;

/// Default grace period before a disconnected session's holds are
/// released (in seconds). Reconnecting with the same session id within
/// this window restores ownership.
pub const DEFAULT_DISCONNECT_GRACE_SECS: i64 = 30;

// ---------------------------------------------------------------------------
// SlotKey (the reservable unit)
// ---------------------------------------------------------------------------

/// Identity of a reservable unit: one court at one facility for one
/// time range on one date.
///
/// Used as the hashable key for all registry lookups. Two keys are the
/// same slot iff every field matches.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SlotKey {
    pub facility_id: DbId,
    pub court_id: DbId,
    pub date: NaiveDate,
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl SlotKey {
    /// The facility/date view this slot belongs to, used for broadcast
    /// scoping and subscriptions.
    pub fn scope(&self) -> ViewScope {
        ViewScope {
            facility_id: self.facility_id,
            date: self.date,
        }
    }
}

impl std::fmt::Display for SlotKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}/{}/{} {}-{}",
            self.facility_id, self.court_id, self.date, self.start, self.end
        )
    }
}

/// A facility/date calendar view. Sessions subscribe to scopes and
/// receive every slot event whose key falls inside them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ViewScope {
    pub facility_id: DbId,
    pub date: NaiveDate,
}

// ---------------------------------------------------------------------------
// Hold errors
// ---------------------------------------------------------------------------

/// Why a hold operation was refused.
///
/// Every variant is recoverable from the client's point of view: pick
/// another slot, refresh state, or re-acquire.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum HoldError {
    /// The slot is held by another session.
    #[error("slot is held by another session until {expires_at}")]
    Conflict { expires_at: Timestamp },

    /// The slot was already converted into a booking.
    #[error("slot is already booked")]
    AlreadyBooked,

    /// The caller is not the recorded owner of the hold.
    #[error("session does not hold this slot")]
    NotOwner,

    /// The hold's TTL elapsed before the operation completed.
    #[error("hold expired before the operation completed")]
    Expired,
}

// ---------------------------------------------------------------------------
// Validation helpers
// ---------------------------------------------------------------------------

/// Validate a hold TTL in seconds. Returns `Ok(())` or an error message.
pub fn validate_ttl_secs(ttl_secs: i64) -> Result<(), String> {
    if ttl_secs < MIN_HOLD_TTL_SECS {
        return Err(format!(
            "Hold TTL must be at least {MIN_HOLD_TTL_SECS} seconds, got {ttl_secs}"
        ));
    }
    if ttl_secs > MAX_HOLD_TTL_SECS {
        return Err(format!(
            "Hold TTL must be at most {MAX_HOLD_TTL_SECS} seconds, got {ttl_secs}"
        ));
    }
    Ok(())
}

/// Validate that a slot key is well formed: positive ids and a
/// non-empty time range.
pub fn validate_slot_key(slot: &SlotKey) -> Result<(), String> {
    if slot.facility_id <= 0 {
        return Err(format!(
            "facility_id must be positive, got {}",
            slot.facility_id
        ));
    }
    if slot.court_id <= 0 {
        return Err(format!("court_id must be positive, got {}", slot.court_id));
    }
    if slot.end <= slot.start {
        return Err(format!(
            "slot end ({}) must be after start ({})",
            slot.end, slot.start
        ));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Realtime WebSocket message protocol
// ---------------------------------------------------------------------------

/// Messages exchanged over WebSocket for realtime slot state.
///
/// Serialized as JSON with an internally-tagged `"type"` discriminator
/// so that clients can route messages by type string. Broadcast
/// delivery is best-effort; the availability snapshot endpoint is the
/// authoritative reconcile path.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum SlotMessage {
    /// Server sends once after connect: the session identity to use in
    /// all slot operations (and to resume with after a reconnect).
    #[serde(rename = "session.welcome")]
    SessionWelcome {
        session_id: SessionId,
        resumed: bool,
    },

    /// Client sends: start receiving slot events for this view.
    #[serde(rename = "view.subscribe")]
    ViewSubscribe { facility_id: DbId, date: NaiveDate },

    /// Client sends: stop receiving slot events for this view.
    #[serde(rename = "view.unsubscribe")]
    ViewUnsubscribe { facility_id: DbId, date: NaiveDate },

    /// Client sends: liveness signal. Absence beyond the heartbeat
    /// timeout is treated as a disconnect.
    #[serde(rename = "heartbeat")]
    Heartbeat,

    /// Server broadcasts: a hold was granted or renewed on a slot.
    #[serde(rename = "slot.locked")]
    SlotLocked { slot: SlotKey, expires_at: Timestamp },

    /// Server broadcasts: a slot returned to the free pool.
    #[serde(rename = "slot.freed")]
    SlotFreed { slot: SlotKey },

    /// Server broadcasts: a slot was finalized into a booking.
    #[serde(rename = "slot.booked")]
    SlotBooked { slot: SlotKey, booking_id: DbId },
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
