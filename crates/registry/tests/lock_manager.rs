//! Integration tests for `LockManager`.
//!
//! These exercise the full engine — registry, session tracker, and
//! event publication — through the manager's public operations,
//! covering mutual exclusion, expiry, idempotent mass release, and
//! exactly-once finalization.

use std::sync::Arc;

use assert_matches::assert_matches;
use chrono::{Duration, NaiveDate, NaiveTime, Utc};

use courtside_core::reservation::{HoldError, SlotKey};
use courtside_events::{EventBus, SlotEvent, SlotEventKind};
use courtside_registry::LockManager;

const TTL: i64 = 120;

fn slot(court_id: i64) -> SlotKey {
    SlotKey {
        facility_id: 1,
        court_id,
        date: NaiveDate::from_ymd_opt(2026, 7, 4).unwrap(),
        start: NaiveTime::from_hms_opt(18, 0, 0).unwrap(),
        end: NaiveTime::from_hms_opt(19, 0, 0).unwrap(),
    }
}

fn manager() -> (Arc<LockManager>, Arc<EventBus>) {
    let bus = Arc::new(EventBus::default());
    (Arc::new(LockManager::new(Arc::clone(&bus))), bus)
}

fn drain(rx: &mut tokio::sync::broadcast::Receiver<SlotEvent>) -> Vec<SlotEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

// ---------------------------------------------------------------------------
// Scenario A: a second session acquiring a held slot gets Conflict
// ---------------------------------------------------------------------------

#[tokio::test]
async fn concurrent_acquire_is_first_writer_wins() {
    let (manager, _bus) = manager();

    let grant = manager
        .acquire(slot(1), &"x".to_string(), None, TTL)
        .await
        .expect("first acquire should be granted");

    let err = manager
        .acquire(slot(1), &"y".to_string(), None, TTL)
        .await
        .unwrap_err();

    assert_matches!(err, HoldError::Conflict { expires_at } if expires_at == grant.expires_at);

    // The loser must have gained no ownership.
    assert!(manager.held_by(&"y".to_string()).await.is_empty());
}

// ---------------------------------------------------------------------------
// Scenario B: mass release frees a disconnected session's slots
// ---------------------------------------------------------------------------

#[tokio::test]
async fn release_all_frees_slots_for_other_sessions() {
    let (manager, _bus) = manager();

    manager
        .acquire(slot(1), &"x".to_string(), None, TTL)
        .await
        .unwrap();
    manager
        .acquire(slot(2), &"x".to_string(), None, TTL)
        .await
        .unwrap();

    let count = manager.release_all(&"x".to_string()).await;
    assert_eq!(count, 2);

    manager
        .acquire(slot(1), &"z".to_string(), None, TTL)
        .await
        .expect("freed slot should be acquirable by another session");
}

#[tokio::test]
async fn release_all_is_idempotent() {
    let (manager, _bus) = manager();

    manager
        .acquire(slot(1), &"x".to_string(), None, TTL)
        .await
        .unwrap();

    assert_eq!(manager.release_all(&"x".to_string()).await, 1);
    assert_eq!(manager.release_all(&"x".to_string()).await, 0);
    assert_eq!(manager.release_all(&"x".to_string()).await, 0);
}

// ---------------------------------------------------------------------------
// Scenario C: finalize after TTL expiry fails with Expired
// ---------------------------------------------------------------------------

#[tokio::test]
async fn finalize_after_expiry_creates_no_booking() {
    let (manager, _bus) = manager();

    // A zero TTL expires the hold at grant time.
    manager
        .acquire(slot(1), &"x".to_string(), None, 0)
        .await
        .unwrap();

    let err = manager
        .finalize(slot(1), &"x".to_string())
        .await
        .unwrap_err();
    assert_matches!(err, HoldError::Expired);

    // The slot is free for anyone else.
    manager
        .acquire(slot(1), &"z".to_string(), None, TTL)
        .await
        .expect("expired slot should be free");
}

// ---------------------------------------------------------------------------
// Scenario D: finalize is exactly-once per slot
// ---------------------------------------------------------------------------

#[tokio::test]
async fn finalized_slot_permanently_refuses_acquire_and_finalize() {
    let (manager, _bus) = manager();

    manager
        .acquire(slot(1), &"x".to_string(), None, TTL)
        .await
        .unwrap();
    let claim = manager
        .finalize(slot(1), &"x".to_string())
        .await
        .expect("owner finalize should succeed");
    assert_eq!(claim.hold.session_id, "x");
    manager.confirm_booking(&slot(1), 501).await;

    let err = manager
        .acquire(slot(1), &"y".to_string(), None, TTL)
        .await
        .unwrap_err();
    assert_matches!(err, HoldError::AlreadyBooked);

    let err = manager
        .finalize(slot(1), &"x".to_string())
        .await
        .unwrap_err();
    assert_matches!(err, HoldError::AlreadyBooked);
}

// ---------------------------------------------------------------------------
// Round-trip: acquire then release restores a fresh FREE state
// ---------------------------------------------------------------------------

#[tokio::test]
async fn acquire_release_round_trip_restores_free() {
    let (manager, _bus) = manager();

    manager
        .acquire(slot(1), &"x".to_string(), None, TTL)
        .await
        .unwrap();
    manager
        .release(slot(1), &"x".to_string())
        .await
        .expect("owner release should succeed");

    let grant = manager
        .acquire(slot(1), &"y".to_string(), None, TTL)
        .await
        .expect("released slot should look never-touched");
    assert_eq!(grant.renew_count, 0);
    assert!(manager.held_by(&"x".to_string()).await.is_empty());
}

// ---------------------------------------------------------------------------
// Expiry sweep
// ---------------------------------------------------------------------------

#[tokio::test]
async fn sweep_frees_expired_holds_and_purges_tracker() {
    let (manager, _bus) = manager();

    manager
        .acquire(slot(1), &"x".to_string(), None, TTL)
        .await
        .unwrap();
    manager
        .acquire(slot(2), &"x".to_string(), None, TTL)
        .await
        .unwrap();

    let freed = manager
        .sweep_expired_at(Utc::now() + Duration::seconds(TTL + 1))
        .await;
    assert_eq!(freed, 2);
    assert!(manager.held_by(&"x".to_string()).await.is_empty());

    // A second sweep finds nothing.
    let freed = manager
        .sweep_expired_at(Utc::now() + Duration::seconds(TTL + 1))
        .await;
    assert_eq!(freed, 0);
}

#[tokio::test]
async fn sweep_leaves_live_holds_alone() {
    let (manager, _bus) = manager();

    manager
        .acquire(slot(1), &"x".to_string(), None, TTL)
        .await
        .unwrap();

    assert_eq!(manager.sweep_expired().await, 0);
    assert_eq!(manager.held_by(&"x".to_string()).await.len(), 1);
}

// ---------------------------------------------------------------------------
// Renewal
// ---------------------------------------------------------------------------

#[tokio::test]
async fn renew_extends_expiry_for_owner_only() {
    let (manager, _bus) = manager();

    let grant = manager
        .acquire(slot(1), &"x".to_string(), None, TTL)
        .await
        .unwrap();

    let renewed = manager
        .renew(slot(1), &"x".to_string(), TTL * 2)
        .await
        .expect("owner renew should succeed");
    assert!(renewed.expires_at > grant.expires_at);
    assert_eq!(renewed.renew_count, 1);

    let err = manager
        .renew(slot(1), &"y".to_string(), TTL)
        .await
        .unwrap_err();
    assert_matches!(err, HoldError::NotOwner);
}

#[tokio::test]
async fn reacquire_by_owner_renews_instead_of_conflicting() {
    let (manager, _bus) = manager();

    manager
        .acquire(slot(1), &"x".to_string(), None, TTL)
        .await
        .unwrap();
    let grant = manager
        .acquire(slot(1), &"x".to_string(), None, TTL)
        .await
        .expect("owner re-acquire must not conflict");
    assert_eq!(grant.renew_count, 1);

    // Still exactly one tracked hold.
    assert_eq!(manager.held_by(&"x".to_string()).await.len(), 1);
}

// ---------------------------------------------------------------------------
// Persistence rollback
// ---------------------------------------------------------------------------

#[tokio::test]
async fn rollback_to_free_reopens_the_slot() {
    let (manager, _bus) = manager();

    manager
        .acquire(slot(1), &"x".to_string(), None, TTL)
        .await
        .unwrap();
    manager.finalize(slot(1), &"x".to_string()).await.unwrap();

    assert!(manager.rollback_to_free(&slot(1)).await);

    manager
        .acquire(slot(1), &"y".to_string(), None, TTL)
        .await
        .expect("rolled-back slot should be reservable again");
}

// ---------------------------------------------------------------------------
// Hydration
// ---------------------------------------------------------------------------

#[tokio::test]
async fn hydrated_bookings_refuse_new_holds() {
    let (manager, _bus) = manager();

    assert_eq!(manager.hydrate_booked(vec![(slot(1), 9)]).await, 1);

    let err = manager
        .acquire(slot(1), &"x".to_string(), None, TTL)
        .await
        .unwrap_err();
    assert_matches!(err, HoldError::AlreadyBooked);
}

// ---------------------------------------------------------------------------
// Event publication
// ---------------------------------------------------------------------------

#[tokio::test]
async fn transitions_publish_scoped_events() {
    let (manager, bus) = manager();
    let mut rx = bus.subscribe();

    manager
        .acquire(slot(1), &"x".to_string(), None, TTL)
        .await
        .unwrap();
    manager.release(slot(1), &"x".to_string()).await.unwrap();

    manager
        .acquire(slot(2), &"x".to_string(), None, TTL)
        .await
        .unwrap();
    manager.finalize(slot(2), &"x".to_string()).await.unwrap();
    manager.confirm_booking(&slot(2), 33).await;

    let events = drain(&mut rx);
    let kinds: Vec<&SlotEventKind> = events.iter().map(|e| &e.kind).collect();

    assert_eq!(events.len(), 4);
    assert_matches!(kinds[0], SlotEventKind::Locked { .. });
    assert_matches!(kinds[1], SlotEventKind::Freed);
    assert_matches!(kinds[2], SlotEventKind::Locked { .. });
    assert_matches!(kinds[3], SlotEventKind::Booked { booking_id: 33 });
    assert_eq!(events[3].slot, slot(2));
}

#[tokio::test]
async fn conflicting_acquire_publishes_nothing() {
    let (manager, bus) = manager();

    manager
        .acquire(slot(1), &"x".to_string(), None, TTL)
        .await
        .unwrap();

    let mut rx = bus.subscribe();
    let _ = manager
        .acquire(slot(1), &"y".to_string(), None, TTL)
        .await
        .unwrap_err();

    assert!(drain(&mut rx).is_empty());
}

// ---------------------------------------------------------------------------
// Parallel contention: exactly one winner per slot
// ---------------------------------------------------------------------------

#[tokio::test]
async fn many_concurrent_acquires_yield_one_winner() {
    let (manager, _bus) = manager();

    let mut tasks = Vec::new();
    for i in 0..32 {
        let manager = Arc::clone(&manager);
        tasks.push(tokio::spawn(async move {
            manager
                .acquire(slot(1), &format!("session-{i}"), None, TTL)
                .await
                .is_ok()
        }));
    }

    let mut winners = 0;
    for task in tasks {
        if task.await.unwrap() {
            winners += 1;
        }
    }

    assert_eq!(winners, 1);
}
