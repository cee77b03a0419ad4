//! Reverse index from session id to the slot keys it holds.
//!
//! Enables bounded-time mass release on disconnect: enumerating a
//! session's holds is O(k) in the number of keys that session holds,
//! independent of registry size. Thread-safe via interior `RwLock`;
//! designed to live inside the [`LockManager`].
//!
//! [`LockManager`]: crate::manager::LockManager

use std::collections::{HashMap, HashSet};

use tokio::sync::RwLock;

use courtside_core::reservation::SlotKey;
use courtside_core::types::SessionId;

pub struct SessionTracker {
    owned: RwLock<HashMap<SessionId, HashSet<SlotKey>>>,
}

impl SessionTracker {
    pub fn new() -> Self {
        Self {
            owned: RwLock::new(HashMap::new()),
        }
    }

    /// Record that `session_id` now holds `key`.
    pub async fn add(&self, session_id: &SessionId, key: SlotKey) {
        self.owned
            .write()
            .await
            .entry(session_id.clone())
            .or_default()
            .insert(key);
    }

    /// Forget one (session, key) pair. Empty sets are dropped so the
    /// map does not accumulate dead sessions.
    pub async fn remove(&self, session_id: &SessionId, key: &SlotKey) {
        let mut owned = self.owned.write().await;
        if let Some(keys) = owned.get_mut(session_id) {
            keys.remove(key);
            if keys.is_empty() {
                owned.remove(session_id);
            }
        }
    }

    /// Drain and return every key held by a session.
    ///
    /// The drain is atomic: concurrent or repeated calls for the same
    /// session see an empty set, which is what makes mass release
    /// idempotent.
    pub async fn take_all(&self, session_id: &SessionId) -> Vec<SlotKey> {
        self.owned
            .write()
            .await
            .remove(session_id)
            .map(|keys| keys.into_iter().collect())
            .unwrap_or_default()
    }

    /// Keys currently held by a session, without draining.
    pub async fn held_by(&self, session_id: &SessionId) -> Vec<SlotKey> {
        self.owned
            .read()
            .await
            .get(session_id)
            .map(|keys| keys.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of sessions currently holding at least one slot.
    pub async fn session_count(&self) -> usize {
        self.owned.read().await.len()
    }
}

impl Default for SessionTracker {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime};

    fn slot(court_id: i64) -> SlotKey {
        SlotKey {
            facility_id: 1,
            court_id,
            date: NaiveDate::from_ymd_opt(2026, 6, 20).unwrap(),
            start: NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
            end: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
        }
    }

    #[tokio::test]
    async fn add_and_enumerate() {
        let tracker = SessionTracker::new();
        let session = "s1".to_string();

        tracker.add(&session, slot(1)).await;
        tracker.add(&session, slot(2)).await;

        let mut held = tracker.held_by(&session).await;
        held.sort_by_key(|k| k.court_id);
        assert_eq!(held, vec![slot(1), slot(2)]);
    }

    #[tokio::test]
    async fn remove_drops_empty_sessions() {
        let tracker = SessionTracker::new();
        let session = "s1".to_string();

        tracker.add(&session, slot(1)).await;
        tracker.remove(&session, &slot(1)).await;

        assert_eq!(tracker.session_count().await, 0);
        assert!(tracker.held_by(&session).await.is_empty());
    }

    #[tokio::test]
    async fn take_all_drains_atomically() {
        let tracker = SessionTracker::new();
        let session = "s1".to_string();

        tracker.add(&session, slot(1)).await;
        tracker.add(&session, slot(2)).await;

        let first = tracker.take_all(&session).await;
        let second = tracker.take_all(&session).await;

        assert_eq!(first.len(), 2);
        assert!(second.is_empty());
    }

    #[tokio::test]
    async fn sessions_are_independent() {
        let tracker = SessionTracker::new();

        tracker.add(&"s1".to_string(), slot(1)).await;
        tracker.add(&"s2".to_string(), slot(2)).await;

        let drained = tracker.take_all(&"s1".to_string()).await;
        assert_eq!(drained, vec![slot(1)]);
        assert_eq!(tracker.held_by(&"s2".to_string()).await, vec![slot(2)]);
    }
}
