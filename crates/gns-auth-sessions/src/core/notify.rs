//! Notification Hub
//!
//! Registry of listeners waiting on a pairing session. The engine publishes
//! one terminal event per session; delivery is best-effort since the
//! authoritative state is always available by polling.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, RwLock};

use crate::models::SessionView;

/// Event pushed to a session's listeners.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SessionEvent {
    /// Full approved view, identical to what a poll returns
    Approved(SessionView),
    Rejected {
        #[serde(rename = "sessionId")]
        session_id: String,
    },
    Expired {
        #[serde(rename = "sessionId")]
        session_id: String,
    },
}

impl SessionEvent {
    pub fn session_id(&self) -> &str {
        match self {
            SessionEvent::Approved(view) => &view.session_id,
            SessionEvent::Rejected { session_id } | SessionEvent::Expired { session_id } => {
                session_id
            }
        }
    }
}

pub type EventSender = mpsc::UnboundedSender<SessionEvent>;

/// A registered listener. Dropping the receiver is enough to stop
/// delivery; [`NotificationHub::unsubscribe`] also frees the slot.
#[derive(Debug)]
pub struct Subscription {
    pub connection_id: String,
    pub receiver: mpsc::UnboundedReceiver<SessionEvent>,
}

#[derive(Debug, Default)]
pub struct NotificationHub {
    listeners: RwLock<HashMap<String, HashMap<String, EventSender>>>,
}

impl NotificationHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn subscribe(&self, session_id: &str) -> Subscription {
        let connection_id = uuid::Uuid::new_v4().to_string();
        let (tx, rx) = mpsc::unbounded_channel();
        self.listeners
            .write()
            .await
            .entry(session_id.to_string())
            .or_default()
            .insert(connection_id.clone(), tx);
        tracing::debug!(session_id, connection_id = %connection_id, "Listener subscribed");
        Subscription {
            connection_id,
            receiver: rx,
        }
    }

    pub async fn unsubscribe(&self, session_id: &str, connection_id: &str) {
        let mut listeners = self.listeners.write().await;
        if let Some(conns) = listeners.get_mut(session_id) {
            conns.remove(connection_id);
            if conns.is_empty() {
                listeners.remove(session_id);
            }
        }
    }

    /// Send `event` to every listener of its session.
    ///
    /// Returns the number of listeners reached. Every event is terminal, so
    /// the session entry is released afterwards and forwarders see their
    /// channel end once drained.
    pub async fn publish(&self, event: SessionEvent) -> usize {
        let session_id = event.session_id().to_string();
        let mut listeners = self.listeners.write().await;
        let Some(conns) = listeners.get_mut(&session_id) else {
            return 0;
        };

        let delivered = conns
            .values()
            .filter(|tx| tx.send(event.clone()).is_ok())
            .count();
        listeners.remove(&session_id);
        tracing::debug!(session_id = %session_id, delivered, "Session event published");
        delivered
    }

    /// Drop every listener of a session without sending anything. Their
    /// receivers see the channel end.
    pub async fn release(&self, session_id: &str) -> usize {
        self.listeners
            .write()
            .await
            .remove(session_id)
            .map(|conns| conns.len())
            .unwrap_or(0)
    }

    pub async fn listener_count(&self, session_id: &str) -> usize {
        self.listeners
            .read()
            .await
            .get(session_id)
            .map(HashMap::len)
            .unwrap_or(0)
    }
}
