//! Courtside realtime event infrastructure.
//!
//! Provides the in-process publish/subscribe hub for slot state
//! changes:
//!
//! - [`EventBus`] — fan-out hub backed by `tokio::sync::broadcast`.
//! - [`SlotEvent`] — the canonical slot state-change envelope.
//!
//! The lock manager publishes every transition here; the WebSocket
//! broadcast router consumes the bus and forwards events to sessions
//! subscribed to the affected facility/date view.

pub mod bus;

pub use bus::{EventBus, SlotEvent, SlotEventKind};
