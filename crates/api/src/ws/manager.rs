use std::collections::{HashMap, HashSet};

use axum::body::Bytes;
use axum::extract::ws::Message;
use chrono::Utc;
use tokio::sync::{mpsc, RwLock};

use courtside_core::reservation::ViewScope;
use courtside_core::types::{DbId, SessionId, Timestamp};

/// Channel sender half for pushing messages to a WebSocket connection.
pub type WsSender = mpsc::UnboundedSender<Message>;

/// Metadata for a single live session.
pub struct WsSession {
    /// Authenticated user ID, if known.
    pub user_id: Option<DbId>,
    /// Channel sender for outbound messages to this connection.
    pub sender: WsSender,
    /// When this connection was established.
    pub connected_at: Timestamp,
    /// Last heartbeat or pong received from the client.
    pub last_heartbeat_at: Timestamp,
    /// Facility/date views this session wants slot events for.
    pub scopes: HashSet<ViewScope>,
}

/// Manages all active WebSocket sessions.
///
/// Thread-safe via interior `RwLock`; designed to be wrapped in `Arc`
/// and shared across the application.
pub struct SessionManager {
    sessions: RwLock<HashMap<SessionId, WsSession>>,
}

impl SessionManager {
    /// Create a new, empty session manager.
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Register a new session.
    ///
    /// Returns the receiver half of the message channel so the caller
    /// can forward messages to the WebSocket sink.
    pub async fn add(
        &self,
        session_id: SessionId,
        user_id: Option<DbId>,
    ) -> mpsc::UnboundedReceiver<Message> {
        let (tx, rx) = mpsc::unbounded_channel();
        let now = Utc::now();
        let session = WsSession {
            user_id,
            sender: tx,
            connected_at: now,
            last_heartbeat_at: now,
            scopes: HashSet::new(),
        };
        self.sessions.write().await.insert(session_id, session);
        rx
    }

    /// Remove a session by its ID.
    pub async fn remove(&self, session_id: &str) {
        self.sessions.write().await.remove(session_id);
    }

    /// Refresh a session's heartbeat stamp. Returns `false` for
    /// unknown sessions.
    pub async fn touch(&self, session_id: &str) -> bool {
        let mut sessions = self.sessions.write().await;
        match sessions.get_mut(session_id) {
            Some(session) => {
                session.last_heartbeat_at = Utc::now();
                true
            }
            None => false,
        }
    }

    /// Subscribe a session to a facility/date view.
    pub async fn subscribe(&self, session_id: &str, scope: ViewScope) {
        if let Some(session) = self.sessions.write().await.get_mut(session_id) {
            session.scopes.insert(scope);
        }
    }

    /// Unsubscribe a session from a facility/date view.
    pub async fn unsubscribe(&self, session_id: &str, scope: &ViewScope) {
        if let Some(session) = self.sessions.write().await.get_mut(session_id) {
            session.scopes.remove(scope);
        }
    }

    /// Send a message to one session. Returns `false` if the session
    /// is unknown or its channel is closed.
    pub async fn send_to(&self, session_id: &str, message: Message) -> bool {
        let sessions = self.sessions.read().await;
        match sessions.get(session_id) {
            Some(session) => session.sender.send(message).is_ok(),
            None => false,
        }
    }

    /// Send a message to every session subscribed to a scope.
    ///
    /// Sessions whose send channels are closed are silently skipped
    /// (they will be cleaned up on their next receive loop iteration).
    /// Returns the number of sessions the message was sent to.
    pub async fn send_to_scope(&self, scope: &ViewScope, message: Message) -> usize {
        let sessions = self.sessions.read().await;
        let mut count = 0;
        for session in sessions.values() {
            if session.scopes.contains(scope) && session.sender.send(message.clone()).is_ok() {
                count += 1;
            }
        }
        count
    }

    /// Sessions whose last heartbeat is older than `timeout_secs`.
    pub async fn stale_sessions(&self, timeout_secs: i64) -> Vec<SessionId> {
        let cutoff = Utc::now() - chrono::Duration::seconds(timeout_secs);
        self.sessions
            .read()
            .await
            .iter()
            .filter_map(|(id, session)| {
                if session.last_heartbeat_at < cutoff {
                    Some(id.clone())
                } else {
                    None
                }
            })
            .collect()
    }

    /// Return the current number of active sessions.
    pub async fn connection_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Send a Ping frame to every connected client.
    ///
    /// Used by the heartbeat task to keep connections alive and detect
    /// stale ones.
    pub async fn ping_all(&self) {
        let sessions = self.sessions.read().await;
        for session in sessions.values() {
            let _ = session.sender.send(Message::Ping(Bytes::new()));
        }
    }

    /// Send a Close frame to every session, then clear the map.
    ///
    /// Used during graceful shutdown to notify all clients before the
    /// server stops accepting new connections.
    pub async fn shutdown_all(&self) {
        let mut sessions = self.sessions.write().await;
        let count = sessions.len();
        for session in sessions.values() {
            let _ = session.sender.send(Message::Close(None));
        }
        sessions.clear();
        tracing::info!(count, "Closed all WebSocket sessions");
    }
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new()
    }
}
