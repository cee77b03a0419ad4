//! Courtside slot-locking engine.
//!
//! The in-memory authority for who may book which court slot:
//!
//! - [`SlotRegistry`] — sharded map from slot key to hold state; the
//!   single source of truth for availability.
//! - [`SessionTracker`] — reverse index from session id to held keys,
//!   enabling bounded-time mass release on disconnect.
//! - [`LockManager`] — orchestrates acquire/renew/release/finalize and
//!   publishes every transition on the event bus.
//! - [`expiry`] — background sweep that frees holds whose TTL elapsed.
//!
//! The engine is deliberately free of I/O and database dependencies:
//! persistence of finalized bookings happens a layer above, with
//! [`LockManager::rollback_to_free`] as the compensating path when
//! that persistence fails.

pub mod expiry;
pub mod manager;
pub mod registry;
pub mod sessions;

pub use manager::{BookedClaim, HoldGrant, LockManager};
pub use registry::{Hold, SlotRegistry, SlotStatus};
pub use sessions::SessionTracker;
