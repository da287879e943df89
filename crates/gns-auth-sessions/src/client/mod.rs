//! Pairing Client
//!
//! HTTP binding of the pairing API plus the two client roles built on it:
//! the [`PairingRequester`] (browser side) and the [`PairingApprover`]
//! (identity holder side).

mod approver;
mod requester;

pub use approver::PairingApprover;
pub use requester::{PairingOutcome, PairingRequester};

use std::time::Duration;

use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde_json::json;
use url::Url;

use crate::api::{PUBLIC_KEY_HEADER, SESSION_HEADER};
use crate::error::{Error, Result};
use crate::models::*;

/// HTTP client for a GNS auth session server.
#[derive(Debug, Clone)]
pub struct PairingClient {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl PairingClient {
    /// Create a new client for the server at `base_url`.
    pub fn new(base_url: &str) -> Result<Self> {
        let parsed = Url::parse(base_url)?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(Error::Config(format!(
                "unsupported server scheme '{}'",
                parsed.scheme()
            )));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| Error::Network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(30),
        })
    }

    /// Set request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let response = request.timeout(self.timeout).send().await?;
        decode(response).await
    }

    // ==================== Server ====================

    pub async fn health(&self) -> Result<HealthResponse> {
        self.send(self.client.get(self.url("/health"))).await
    }

    // ==================== Requester ====================

    /// Start a pairing session.
    pub async fn request_session(
        &self,
        requester_info: Option<&str>,
    ) -> Result<RequestSessionResponse> {
        let body = RequestSessionParams {
            requester_info: requester_info.map(str::to_string),
        };
        self.send(self.client.post(self.url("/auth/sessions/request")).json(&body))
            .await
    }

    /// Poll a pairing session.
    pub async fn get_session(&self, session_id: &str) -> Result<SessionView> {
        self.send(
            self.client
                .get(self.url(&format!("/auth/sessions/{}", session_id))),
        )
        .await
    }

    /// Cancel a pending session with its cancel token.
    pub async fn cancel_session(&self, session_id: &str, cancel_token: &str) -> Result<()> {
        let body = CancelSessionParams {
            cancel_token: cancel_token.to_string(),
        };
        let _: serde_json::Value = self
            .send(
                self.client
                    .post(self.url(&format!("/auth/sessions/{}/cancel", session_id)))
                    .json(&body),
            )
            .await?;
        Ok(())
    }

    /// WebSocket URL for push notifications on a session.
    pub fn ws_url(&self, session_id: &str) -> Result<Url> {
        let mut url = Url::parse(&self.url(&format!("/auth/sessions/{}/ws", session_id)))?;
        let scheme = if url.scheme() == "https" { "wss" } else { "ws" };
        url.set_scheme(scheme)
            .map_err(|_| Error::Config("cannot derive WebSocket URL".into()))?;
        Ok(url)
    }

    // ==================== Approver ====================

    pub async fn approve_session(
        &self,
        params: &ApproveSessionParams,
    ) -> Result<ApproveSessionResponse> {
        self.send(self.client.post(self.url("/auth/sessions/approve")).json(params))
            .await
    }

    pub async fn reject_session(&self, params: &RejectSessionParams) -> Result<()> {
        let _: serde_json::Value = self
            .send(self.client.post(self.url("/auth/sessions/reject")).json(params))
            .await?;
        Ok(())
    }

    // ==================== Browser Sessions ====================

    /// Identity behind an issued session token.
    pub async fn me(&self, session_token: &str) -> Result<AuthenticatedIdentity> {
        self.send(
            self.client
                .get(self.url("/auth/me"))
                .header(SESSION_HEADER, session_token),
        )
        .await
    }

    pub async fn list_sessions(&self, public_key: &str) -> Result<Vec<BrowserSessionSummary>> {
        self.send(
            self.client
                .get(self.url("/auth/sessions"))
                .header(PUBLIC_KEY_HEADER, public_key),
        )
        .await
    }

    pub async fn revoke_session(&self, session_token: &str) -> Result<()> {
        let _: serde_json::Value = self
            .send(
                self.client
                    .delete(self.url(&format!("/auth/sessions/{}", session_token))),
            )
            .await?;
        Ok(())
    }

    pub async fn revoke_all_sessions(&self, public_key: &str) -> Result<usize> {
        let response: RevokeAllResponse = self
            .send(
                self.client
                    .post(self.url("/auth/sessions/revoke-all"))
                    .header(PUBLIC_KEY_HEADER, public_key)
                    .json(&json!({})),
            )
            .await?;
        Ok(response.revoked_count)
    }
}

/// Decode a success body, or rebuild the server's error from its body.
async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
    let status = response.status();
    if status.is_success() {
        return Ok(response.json().await?);
    }

    let text = response.text().await.unwrap_or_default();
    match serde_json::from_str::<ErrorResponse>(&text) {
        Ok(body) => Err(body.into_error()),
        Err(_) => Err(Error::Network(format!("Server returned {}: {}", status, text))),
    }
}
