//! Event-to-WebSocket broadcast routing.
//!
//! [`BroadcastRouter`] subscribes to the slot event bus and forwards
//! each event, as a wire-protocol message, to every session currently
//! viewing the affected facility/date scope. Delivery is best-effort
//! and at-least-once: clients reconcile against the availability
//! snapshot endpoint rather than trusting the stream alone.

use std::sync::Arc;

use axum::extract::ws::Message;
use tokio::sync::broadcast;

use courtside_core::reservation::SlotMessage;
use courtside_events::{SlotEvent, SlotEventKind};

use crate::ws::SessionManager;

/// Routes slot events to scoped WebSocket sessions.
pub struct BroadcastRouter {
    sessions: Arc<SessionManager>,
}

impl BroadcastRouter {
    pub fn new(sessions: Arc<SessionManager>) -> Self {
        Self { sessions }
    }

    /// Run the main routing loop.
    ///
    /// Subscribes to the event bus via `receiver` and processes each
    /// event. The loop exits when the channel is closed (i.e. the
    /// [`EventBus`](courtside_events::EventBus) is dropped).
    pub async fn run(self, mut receiver: broadcast::Receiver<SlotEvent>) {
        loop {
            match receiver.recv().await {
                Ok(event) => self.forward(event).await,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "Broadcast router lagged");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::info!("Event bus closed, broadcast router shutting down");
                    break;
                }
            }
        }
    }

    /// Translate one event into its wire message and push it to every
    /// session subscribed to the event's scope.
    async fn forward(&self, event: SlotEvent) {
        let scope = event.scope();
        let message = match event.kind {
            SlotEventKind::Locked { expires_at } => SlotMessage::SlotLocked {
                slot: event.slot,
                expires_at,
            },
            SlotEventKind::Freed => SlotMessage::SlotFreed { slot: event.slot },
            SlotEventKind::Booked { booking_id } => SlotMessage::SlotBooked {
                slot: event.slot,
                booking_id,
            },
        };

        let json = match serde_json::to_string(&message) {
            Ok(json) => json,
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize slot message");
                return;
            }
        };

        let delivered = self
            .sessions
            .send_to_scope(&scope, Message::Text(json.into()))
            .await;
        tracing::trace!(
            facility_id = scope.facility_id,
            date = %scope.date,
            delivered,
            "Slot event broadcast"
        );
    }
}
