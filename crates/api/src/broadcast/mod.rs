//! Fan-out of slot state changes to subscribed WebSocket sessions.

pub mod router;

pub use router::BroadcastRouter;
