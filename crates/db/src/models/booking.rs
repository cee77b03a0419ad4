//! Booking row model and DTOs.

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use courtside_core::reservation::SlotKey;
use courtside_core::types::{DbId, Timestamp};

/// A row from the `bookings` table: the durable record of a completed
/// reservation. Created exactly once per slot by the reservation
/// finalizer.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Booking {
    pub id: DbId,
    pub facility_id: DbId,
    pub court_id: DbId,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub user_id: Option<DbId>,
    pub price_cents: i64,
    pub payment_ref: Option<String>,
    pub created_at: Timestamp,
}

impl Booking {
    /// Reconstruct the slot key this booking occupies, used to seed
    /// the in-memory registry on startup.
    pub fn slot_key(&self) -> SlotKey {
        SlotKey {
            facility_id: self.facility_id,
            court_id: self.court_id,
            date: self.date,
            start: self.start_time,
            end: self.end_time,
        }
    }
}

/// Draft supplied by the client (or the payment webhook) when
/// finalizing a hold into a booking.
#[derive(Debug, Clone, Deserialize)]
pub struct BookingDraft {
    pub user_id: Option<DbId>,
    pub price_cents: i64,
    pub payment_ref: Option<String>,
}
