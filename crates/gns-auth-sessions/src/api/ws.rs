//! WebSocket push for pairing sessions.
//!
//! A requester connects to `/auth/sessions/{id}/ws` and receives at most one
//! event: the session's terminal state. The socket is closed afterwards.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::Response;
use futures_util::{SinkExt, StreamExt};

use super::state::AppState;
use crate::core::{PairingEngine, SessionEvent, SessionWatch};
use crate::error::Result;

/// GET /auth/sessions/{id}/ws
///
/// Unknown sessions are refused with 404 before the upgrade.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Response> {
    let watch = state.engine.watch_session(&session_id).await?;
    let engine = Arc::clone(&state.engine);
    Ok(ws.on_upgrade(move |socket| handle_socket(socket, engine, session_id, watch)))
}

async fn handle_socket(
    socket: WebSocket,
    engine: Arc<PairingEngine>,
    session_id: String,
    watch: SessionWatch,
) {
    let SessionWatch {
        current,
        subscription,
    } = watch;
    let connection_id = subscription.connection_id.clone();
    let mut events = subscription.receiver;
    tracing::debug!(session_id = %session_id, connection_id = %connection_id, "Pairing listener connected");

    let (mut sink, mut stream) = socket.split();

    let event = match current {
        Some(event) => Some(event),
        None => {
            tokio::select! {
                event = events.recv() => event,
                _ = drain_until_closed(&mut stream) => None,
            }
        }
    };

    if let Some(event) = event {
        match serde_json::to_string(&event) {
            Ok(text) => {
                if sink.send(Message::Text(text.into())).await.is_err() {
                    tracing::debug!(session_id = %session_id, "WebSocket sink closed");
                }
            }
            Err(e) => tracing::error!(error = %e, "Failed to encode session event"),
        }
        let _ = sink.send(Message::Close(None)).await;
        if matches!(event, SessionEvent::Approved(_)) {
            tracing::info!(session_id = %session_id, "Approval pushed over WebSocket");
        }
    }

    engine
        .notifications()
        .unsubscribe(&session_id, &connection_id)
        .await;
    tracing::debug!(session_id = %session_id, connection_id = %connection_id, "Pairing listener disconnected");
}

/// Consume inbound frames until the peer closes or errors.
async fn drain_until_closed(stream: &mut futures_util::stream::SplitStream<WebSocket>) {
    while let Some(result) = stream.next().await {
        match result {
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(error = %e, "WebSocket receive error");
                break;
            }
        }
    }
}
