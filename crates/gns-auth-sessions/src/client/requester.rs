//! Requester agent: starts a pairing and waits for the outcome.
//!
//! Polling is authoritative and bounded by the session's `expiresAt`. The
//! WebSocket listener only shortens the wait; if it fails the poll loop
//! carries on alone.

use std::time::Duration;

use chrono::Utc;
use futures_util::StreamExt;
use tokio_tungstenite::tungstenite::Message;

use super::PairingClient;
use crate::core::SessionEvent;
use crate::error::{Error, Result};
use crate::models::{RequestSessionResponse, SessionStatus, SessionView};

/// Terminal result of a pairing attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum PairingOutcome {
    /// Approved; the view carries the issued session token
    Approved(SessionView),
    Rejected,
    /// Expired or already reaped; start a new session
    Expired,
}

#[derive(Debug, Clone)]
pub struct PairingRequester {
    client: PairingClient,
    poll_interval: Duration,
    use_push: bool,
}

impl PairingRequester {
    pub fn new(client: PairingClient) -> Self {
        Self {
            client,
            poll_interval: Duration::from_secs(2),
            use_push: true,
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Disable the WebSocket listener and rely on polling only.
    pub fn polling_only(mut self) -> Self {
        self.use_push = false;
        self
    }

    pub async fn start(&self, requester_info: Option<&str>) -> Result<RequestSessionResponse> {
        self.client.request_session(requester_info).await
    }

    /// Wait until the session is approved, rejected or expired.
    pub async fn await_outcome(&self, session: &RequestSessionResponse) -> Result<PairingOutcome> {
        let poll = self.poll_until_terminal(session);
        if !self.use_push {
            return poll.await;
        }

        let push = self.listen(&session.session_id);
        tokio::pin!(poll);
        tokio::pin!(push);

        tokio::select! {
            outcome = &mut poll => outcome,
            pushed = &mut push => match pushed {
                Ok(Some(event)) => Ok(outcome_from_event(event)),
                Ok(None) => poll.await,
                Err(e) => {
                    tracing::debug!(error = %e, "Push listener failed, polling only");
                    poll.await
                }
            },
        }
    }

    async fn poll_until_terminal(&self, session: &RequestSessionResponse) -> Result<PairingOutcome> {
        loop {
            match self.client.get_session(&session.session_id).await {
                Ok(view) => match view.status {
                    SessionStatus::Approved => return Ok(PairingOutcome::Approved(view)),
                    SessionStatus::Rejected => return Ok(PairingOutcome::Rejected),
                    SessionStatus::Expired => return Ok(PairingOutcome::Expired),
                    SessionStatus::Pending => {}
                },
                Err(e) if e.requires_new_session() => return Ok(PairingOutcome::Expired),
                Err(e) if e.is_recoverable() => {
                    tracing::debug!(error = %e, "Poll failed, retrying");
                }
                Err(e) => return Err(e),
            }

            if Utc::now() > session.expires_at {
                return Ok(PairingOutcome::Expired);
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    /// First event pushed on the session's WebSocket, if any.
    async fn listen(&self, session_id: &str) -> Result<Option<SessionEvent>> {
        let url = self.client.ws_url(session_id)?;
        let (mut socket, _) = tokio_tungstenite::connect_async(url.as_str()).await?;

        while let Some(message) = socket.next().await {
            match message? {
                Message::Text(text) => return Ok(Some(serde_json::from_str(&text)?)),
                Message::Close(_) => return Ok(None),
                _ => {}
            }
        }
        Ok(None)
    }

    /// Cancel a session this requester started.
    pub async fn cancel(&self, session: &RequestSessionResponse) -> Result<()> {
        self.client
            .cancel_session(&session.session_id, &session.cancel_token)
            .await
    }
}

fn outcome_from_event(event: SessionEvent) -> PairingOutcome {
    match event {
        SessionEvent::Approved(view) => PairingOutcome::Approved(view),
        SessionEvent::Rejected { .. } => PairingOutcome::Rejected,
        SessionEvent::Expired { .. } => PairingOutcome::Expired,
    }
}

impl PairingOutcome {
    /// Session token issued on approval.
    pub fn session_token(&self) -> Option<&str> {
        match self {
            PairingOutcome::Approved(view) => view.session_token.as_deref(),
            _ => None,
        }
    }

    pub fn into_result(self) -> Result<SessionView> {
        match self {
            PairingOutcome::Approved(view) => Ok(view),
            PairingOutcome::Rejected => Err(Error::Conflict("pairing rejected".into())),
            PairingOutcome::Expired => Err(Error::Gone("pairing expired".into())),
        }
    }
}
