//! Approver agent: scans a pairing QR code and signs the answer.

use chrono::Utc;
use gns_crypto_core::GnsIdentity;

use super::PairingClient;
use crate::core::{pairing_signing_payload, PairingAction};
use crate::error::{Error, Result};
use crate::models::*;

/// Identity holder answering pairing requests.
#[derive(Debug)]
pub struct PairingApprover {
    identity: GnsIdentity,
    client: PairingClient,
    device_info: serde_json::Value,
    encryption_key: Option<String>,
}

impl PairingApprover {
    pub fn new(identity: GnsIdentity, client: PairingClient) -> Self {
        Self {
            identity,
            client,
            device_info: serde_json::Value::Null,
            encryption_key: None,
        }
    }

    /// Device descriptor stored with issued browser sessions.
    pub fn with_device_info(mut self, device_info: serde_json::Value) -> Self {
        self.device_info = device_info;
        self
    }

    /// X25519 key handed to the browser on approval.
    pub fn with_encryption_key(mut self, key: impl Into<String>) -> Self {
        self.encryption_key = Some(key.into());
        self
    }

    pub fn public_key(&self) -> String {
        self.identity.public_key_hex()
    }

    /// Parse scanned QR text into a pairing request.
    ///
    /// An unreadable code is `InvalidInput`; a code whose embedded expiry has
    /// passed is `Gone`, so the user is told to refresh the browser's code.
    pub fn scan(&self, text: &str) -> Result<PairingRequest> {
        let request = parse_scanned(text)
            .into_request()
            .ok_or_else(|| Error::invalid_input("not a GNS pairing code"))?;
        if request.is_expired(Utc::now()) {
            return Err(Error::Gone(format!(
                "pairing code for session {} has expired",
                request.session_id
            )));
        }
        Ok(request)
    }

    /// Sign the canonical payload for `action` on `request`.
    pub fn sign(&self, action: PairingAction, request: &PairingRequest) -> String {
        let payload = pairing_signing_payload(
            action,
            &request.session_id,
            &request.challenge,
            &self.identity.public_key_hex(),
        );
        self.identity.sign_string(&payload)
    }

    pub async fn approve(
        &self,
        request: &PairingRequest,
        message_sync: Option<MessageSync>,
    ) -> Result<ApproveSessionResponse> {
        let params = ApproveSessionParams {
            session_id: request.session_id.clone(),
            public_key: self.identity.public_key_hex(),
            signature: self.sign(PairingAction::Approve, request),
            device_info: Some(self.device_info.clone()),
            encryption_key: self.encryption_key.clone(),
            message_sync,
        };
        let response = self.client.approve_session(&params).await?;
        tracing::info!(session_id = %request.session_id, "Browser pairing approved");
        Ok(response)
    }

    pub async fn reject(&self, request: &PairingRequest) -> Result<()> {
        let params = RejectSessionParams {
            session_id: request.session_id.clone(),
            public_key: Some(self.identity.public_key_hex()),
            signature: Some(self.sign(PairingAction::Reject, request)),
        };
        self.client.reject_session(&params).await
    }

    /// Browser sessions issued for this identity.
    pub async fn list_sessions(&self) -> Result<Vec<BrowserSessionSummary>> {
        self.client.list_sessions(&self.public_key()).await
    }

    pub async fn revoke_all_sessions(&self) -> Result<usize> {
        self.client.revoke_all_sessions(&self.public_key()).await
    }
}
