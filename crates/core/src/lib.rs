//! Courtside domain crate.
//!
//! Zero-internal-dependency types shared by the registry, database,
//! event, and API layers: id and timestamp aliases, the core error
//! type, and the reservation domain module (slot identity, hold
//! rules, and the realtime wire protocol).

pub mod error;
pub mod reservation;
pub mod types;
