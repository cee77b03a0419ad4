//! Repository for the `bookings` table.

use chrono::NaiveDate;
use sqlx::PgPool;

use courtside_core::reservation::SlotKey;
use courtside_core::types::DbId;

use crate::models::booking::{Booking, BookingDraft};

/// Column list for `bookings` queries.
const BOOKING_COLUMNS: &str = "id, facility_id, court_id, date, start_time, end_time, \
                                user_id, price_cents, payment_ref, created_at";

/// Provides persistence operations for finalized bookings.
pub struct BookingRepo;

impl BookingRepo {
    /// Insert the booking row for a finalized slot.
    ///
    /// The `uq_bookings_slot` unique index rejects a second booking
    /// for the same slot; callers classify that violation as
    /// already-booked rather than a storage failure.
    pub async fn create(
        pool: &PgPool,
        slot: &SlotKey,
        draft: &BookingDraft,
    ) -> Result<Booking, sqlx::Error> {
        let query = format!(
            "INSERT INTO bookings \
                 (facility_id, court_id, date, start_time, end_time, \
                  user_id, price_cents, payment_ref) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             RETURNING {BOOKING_COLUMNS}"
        );
        sqlx::query_as::<_, Booking>(&query)
            .bind(slot.facility_id)
            .bind(slot.court_id)
            .bind(slot.date)
            .bind(slot.start)
            .bind(slot.end)
            .bind(draft.user_id)
            .bind(draft.price_cents)
            .bind(draft.payment_ref.as_deref())
            .fetch_one(pool)
            .await
    }

    /// Fetch a booking by id.
    pub async fn get_by_id(pool: &PgPool, id: DbId) -> Result<Option<Booking>, sqlx::Error> {
        let query = format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = $1");
        sqlx::query_as::<_, Booking>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Fetch the booking occupying a slot, if any.
    pub async fn get_for_slot(
        pool: &PgPool,
        slot: &SlotKey,
    ) -> Result<Option<Booking>, sqlx::Error> {
        let query = format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings \
             WHERE facility_id = $1 AND court_id = $2 AND date = $3 AND start_time = $4"
        );
        sqlx::query_as::<_, Booking>(&query)
            .bind(slot.facility_id)
            .bind(slot.court_id)
            .bind(slot.date)
            .bind(slot.start)
            .fetch_optional(pool)
            .await
    }

    /// All bookings on or after the given date, used to hydrate the
    /// registry's BOOKED tombstones at startup.
    pub async fn list_from_date(
        pool: &PgPool,
        date: NaiveDate,
    ) -> Result<Vec<Booking>, sqlx::Error> {
        let query = format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings \
             WHERE date >= $1 \
             ORDER BY date, start_time"
        );
        sqlx::query_as::<_, Booking>(&query)
            .bind(date)
            .fetch_all(pool)
            .await
    }
}
