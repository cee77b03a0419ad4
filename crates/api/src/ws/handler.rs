use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;

use courtside_core::reservation::{SlotMessage, ViewScope};

use crate::state::AppState;

/// Query parameters for the WebSocket upgrade.
#[derive(Debug, Deserialize)]
pub struct WsQuery {
    /// Session id issued by a previous `session.welcome`, passed to
    /// resume ownership after a reconnect within the grace period.
    pub session: Option<String>,
}

/// HTTP handler that upgrades the connection to WebSocket.
///
/// After the upgrade the session is registered with `SessionManager`
/// and managed by two tasks (sender + receiver).
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<WsQuery>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, query.session))
}

/// Manage a single WebSocket session after upgrade.
///
/// Splits the socket into a sink (outbound) and stream (inbound), then:
///   1. Resolves the session id (fresh UUID, or the resumed one).
///   2. Cancels any pending disconnect reconciliation for a resume.
///   3. Registers the session and sends `session.welcome`.
///   4. Spawns a sender task and processes inbound messages here.
///   5. On disconnect, hands the session to the reconciler.
async fn handle_socket(socket: WebSocket, state: AppState, resume: Option<String>) {
    let (session_id, resumed) = match resume {
        Some(id) if !id.is_empty() => {
            // Reconnect inside the grace window keeps existing holds.
            let resumed = state.reconciler.cancel(&id).await;
            (id, resumed)
        }
        _ => (uuid::Uuid::new_v4().to_string(), false),
    };
    tracing::info!(session_id = %session_id, resumed, "WebSocket connected");

    // Register and get the receiver for outbound messages.
    let mut rx = state.sessions.add(session_id.clone(), None).await;

    let (mut sink, mut stream) = socket.split();

    // Sender task: forward channel messages to the WebSocket sink.
    let sender_session_id = session_id.clone();
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sink.send(msg).await.is_err() {
                tracing::debug!(session_id = %sender_session_id, "WebSocket sink closed");
                break;
            }
        }
    });

    // Tell the client its identity before anything else.
    let welcome = SlotMessage::SessionWelcome {
        session_id: session_id.clone(),
        resumed,
    };
    if let Ok(json) = serde_json::to_string(&welcome) {
        state
            .sessions
            .send_to(&session_id, Message::Text(json.into()))
            .await;
    }

    // Receiver loop: process inbound messages.
    while let Some(result) = stream.next().await {
        match result {
            Ok(Message::Close(_)) => break,
            Ok(Message::Pong(_)) => {
                state.sessions.touch(&session_id).await;
            }
            Ok(Message::Text(text)) => {
                handle_client_message(&state, &session_id, text.as_str()).await;
            }
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(session_id = %session_id, error = %e, "WebSocket receive error");
                break;
            }
        }
    }

    // Clean up: deregister, abort the sender, and start the
    // disconnect grace clock for this session's holds.
    state.sessions.remove(&session_id).await;
    send_task.abort();
    state.reconciler.schedule(session_id.clone()).await;
    tracing::info!(session_id = %session_id, "WebSocket disconnected");
}

/// Dispatch one inbound client message.
async fn handle_client_message(state: &AppState, session_id: &str, text: &str) {
    let msg: SlotMessage = match serde_json::from_str(text) {
        Ok(msg) => msg,
        Err(e) => {
            tracing::debug!(session_id = %session_id, error = %e, "Unparseable WebSocket message");
            return;
        }
    };

    match msg {
        SlotMessage::ViewSubscribe { facility_id, date } => {
            let scope = ViewScope { facility_id, date };
            state.sessions.subscribe(session_id, scope).await;
            tracing::debug!(session_id = %session_id, facility_id, %date, "View subscribed");
        }
        SlotMessage::ViewUnsubscribe { facility_id, date } => {
            let scope = ViewScope { facility_id, date };
            state.sessions.unsubscribe(session_id, &scope).await;
        }
        SlotMessage::Heartbeat => {
            state.sessions.touch(session_id).await;
        }
        // Server-to-client messages arriving inbound are ignored.
        other => {
            tracing::debug!(session_id = %session_id, ?other, "Ignoring unexpected client message");
        }
    }
}
