//! Conversion of an owned hold into a durable booking.
//!
//! The lock manager performs the in-memory HELD→BOOKED transition and
//! produces a claim; this module persists the booking row and settles
//! the claim: stamping the booking id on success, or rolling the slot
//! back to free on persistence failure so it does not stay
//! permanently unbookable.

use std::sync::Arc;

use courtside_core::reservation::{HoldError, SlotKey};
use courtside_core::types::SessionId;
use courtside_db::models::booking::{Booking, BookingDraft};
use courtside_db::repositories::BookingRepo;
use courtside_db::DbPool;
use courtside_registry::LockManager;

use crate::error::{is_slot_unique_violation, AppError};

pub struct ReservationFinalizer {
    pool: DbPool,
    lock_manager: Arc<LockManager>,
}

impl ReservationFinalizer {
    pub fn new(pool: DbPool, lock_manager: Arc<LockManager>) -> Self {
        Self { pool, lock_manager }
    }

    /// Finalize an owned, live hold into a booking.
    ///
    /// Preconditions are enforced by the lock manager: the caller must
    /// be the current owner and the hold must not have expired at
    /// evaluation time. The in-memory transition happens before the
    /// durable write; a failed write triggers the compensating
    /// rollback and surfaces as a retryable failure.
    pub async fn finalize(
        &self,
        slot: SlotKey,
        session_id: &SessionId,
        mut draft: BookingDraft,
    ) -> Result<Booking, AppError> {
        let claim = self.lock_manager.finalize(slot.clone(), session_id).await?;

        // An anonymous draft inherits the identity the hold was
        // acquired under, if any.
        if draft.user_id.is_none() {
            draft.user_id = claim.hold.user_id;
        }

        match BookingRepo::create(&self.pool, &slot, &draft).await {
            Ok(booking) => {
                self.lock_manager.confirm_booking(&slot, booking.id).await;
                tracing::info!(
                    booking_id = booking.id,
                    slot = %slot,
                    session_id = %session_id,
                    "Booking finalized"
                );
                Ok(booking)
            }
            Err(e) if is_slot_unique_violation(&e) => {
                // Another writer (a previous instance of this process,
                // or a concurrent one) persisted this slot first. The
                // tombstone stands; adopt the existing booking id.
                if let Ok(Some(existing)) = BookingRepo::get_for_slot(&self.pool, &slot).await {
                    self.lock_manager.confirm_booking(&slot, existing.id).await;
                }
                tracing::warn!(slot = %slot, "Finalize lost the persistence race");
                Err(AppError::Hold(HoldError::AlreadyBooked))
            }
            Err(e) => {
                tracing::error!(slot = %slot, error = %e, "Booking persistence failed, rolling back");
                self.lock_manager.rollback_to_free(&slot).await;
                Err(AppError::PersistenceFailure(e.to_string()))
            }
        }
    }
}
