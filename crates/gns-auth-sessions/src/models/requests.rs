//! Request and Response Bodies
//!
//! Typed bodies for every pairing operation. Each request type validates its
//! own shape so malformed input is refused as `InvalidInput` before the
//! engine runs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::message_sync::MessageSync;
use super::session::ApproverInfo;
use crate::error::{Error, Result};

/// Length of a hex X25519 encryption key.
const ENCRYPTION_KEY_HEX_LEN: usize = 64;

/// `POST /auth/sessions/request`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestSessionParams {
    /// Falls back to the `User-Agent` header
    #[serde(default, alias = "browserInfo")]
    pub requester_info: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestSessionResponse {
    pub session_id: String,
    pub challenge: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub expires_at: DateTime<Utc>,
    /// Seconds until expiry
    pub expires_in: i64,
    /// JSON QR payload
    pub qr_data: String,
    /// Deep-link form of the same payload
    pub deep_link: String,
    /// Keep private; never part of the QR code
    pub cancel_token: String,
}

/// `POST /auth/sessions/approve`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApproveSessionParams {
    pub session_id: String,
    #[serde(alias = "approverPublicKey")]
    pub public_key: String,
    /// Signature over the canonical approve payload (hex or base64)
    pub signature: String,
    #[serde(default)]
    pub device_info: Option<serde_json::Value>,
    #[serde(default, alias = "approverEncryptionKey")]
    pub encryption_key: Option<String>,
    #[serde(default)]
    pub message_sync: Option<MessageSync>,
}

impl ApproveSessionParams {
    pub fn validate(&self, max_sync_messages: usize) -> Result<()> {
        require("sessionId", &self.session_id)?;
        require("publicKey", &self.public_key)?;
        require("signature", &self.signature)?;

        if let Some(key) = &self.encryption_key {
            if key.len() != ENCRYPTION_KEY_HEX_LEN || !key.bytes().all(|b| b.is_ascii_hexdigit())
            {
                return Err(Error::invalid_input(
                    "encryptionKey must be 64 hex characters",
                ));
            }
        }
        if let Some(sync) = &self.message_sync {
            sync.validate(max_sync_messages)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApproveSessionResponse {
    pub session_id: String,
    pub approver_info: ApproverInfo,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub approved_at: DateTime<Utc>,
    pub messages_synced: usize,
}

/// `POST /auth/sessions/reject`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RejectSessionParams {
    pub session_id: String,
    #[serde(default, alias = "approverPublicKey")]
    pub public_key: Option<String>,
    #[serde(default)]
    pub signature: Option<String>,
}

impl RejectSessionParams {
    pub fn validate(&self) -> Result<()> {
        require("sessionId", &self.session_id)?;
        match (&self.public_key, &self.signature) {
            (Some(pk), Some(sig)) => {
                require("publicKey", pk)?;
                require("signature", sig)
            }
            (None, None) => Ok(()),
            _ => Err(Error::invalid_input(
                "publicKey and signature must be supplied together",
            )),
        }
    }
}

/// `POST /auth/sessions/{id}/cancel`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelSessionParams {
    pub cancel_token: String,
}

impl CancelSessionParams {
    pub fn validate(&self) -> Result<()> {
        require("cancelToken", &self.cancel_token)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevokeAllResponse {
    pub revoked_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub active_sessions: usize,
}

/// JSON error body returned by every failing endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

impl ErrorResponse {
    pub fn into_error(self) -> Error {
        Error::from_code(&self.code, self.error)
    }
}

fn require(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::invalid_input(format!("{field} is required")));
    }
    Ok(())
}
