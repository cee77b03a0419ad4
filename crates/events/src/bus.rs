//! In-process event bus backed by a `tokio::sync::broadcast` channel.
//!
//! [`EventBus`] is the publish/subscribe hub for [`SlotEvent`]s. It is
//! designed to be shared via `Arc<EventBus>` across the application.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;

use courtside_core::reservation::{SlotKey, ViewScope};
use courtside_core::types::{DbId, Timestamp};

// ---------------------------------------------------------------------------
// SlotEvent
// ---------------------------------------------------------------------------

/// What happened to a slot.
#[derive(Debug, Clone, Serialize)]
pub enum SlotEventKind {
    /// A hold was granted or renewed; viewers should show the slot as
    /// taken until `expires_at`.
    Locked { expires_at: Timestamp },

    /// The slot returned to the free pool (explicit release, expiry,
    /// disconnect reconciliation, or a finalize rollback).
    Freed,

    /// The slot was finalized into a durable booking.
    Booked { booking_id: DbId },
}

/// A slot state change, broadcast to every subscriber.
///
/// Constructed via [`SlotEvent::locked`], [`SlotEvent::freed`], or
/// [`SlotEvent::booked`].
#[derive(Debug, Clone, Serialize)]
pub struct SlotEvent {
    pub kind: SlotEventKind,
    pub slot: SlotKey,

    /// When the event was created (UTC).
    pub timestamp: DateTime<Utc>,
}

impl SlotEvent {
    pub fn locked(slot: SlotKey, expires_at: Timestamp) -> Self {
        Self {
            kind: SlotEventKind::Locked { expires_at },
            slot,
            timestamp: Utc::now(),
        }
    }

    pub fn freed(slot: SlotKey) -> Self {
        Self {
            kind: SlotEventKind::Freed,
            slot,
            timestamp: Utc::now(),
        }
    }

    pub fn booked(slot: SlotKey, booking_id: DbId) -> Self {
        Self {
            kind: SlotEventKind::Booked { booking_id },
            slot,
            timestamp: Utc::now(),
        }
    }

    /// The facility/date view this event belongs to.
    pub fn scope(&self) -> ViewScope {
        self.slot.scope()
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 1024;

/// In-process fan-out event bus.
///
/// Wraps a [`broadcast::Sender`] so that any number of subscribers can
/// independently receive every published [`SlotEvent`]. Delivery is
/// at-least-once and best-effort: slow receivers observe
/// `RecvError::Lagged` and must reconcile from the registry snapshot.
pub struct EventBus {
    sender: broadcast::Sender<SlotEvent>,
}

impl EventBus {
    /// Create a bus with a specific channel capacity.
    ///
    /// When the buffer is full, the oldest un-consumed messages are
    /// dropped and slow receivers will observe a `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all current subscribers.
    ///
    /// If there are no active subscribers the event is silently
    /// dropped; the registry remains the source of truth.
    pub fn publish(&self, event: SlotEvent) {
        // Ignore the SendError — it only means there are zero receivers.
        let _ = self.sender.send(event);
    }

    /// Subscribe to all events published on this bus.
    pub fn subscribe(&self) -> broadcast::Receiver<SlotEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
