//! Browser Session Models
//!
//! Long-lived sessions issued to a browser once a pairing is approved, and
//! the identity records the approval is checked against.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Characters of a session token shown in listings.
pub const TOKEN_PREVIEW_LEN: usize = 8;

/// A browser session persisted at approval time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedBrowserSession {
    /// Bearer token presented as `X-Identity-Session`
    pub session_token: String,
    pub approver_public_key: String,
    pub approver_handle: Option<String>,
    pub requester_info: String,
    /// Free-form device descriptor supplied by the approver
    pub device_info: serde_json::Value,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub expires_at: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub last_used_at: DateTime<Utc>,
    pub is_active: bool,
}

impl PersistedBrowserSession {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    pub fn summary(&self) -> BrowserSessionSummary {
        BrowserSessionSummary {
            token_preview: redact_token(&self.session_token),
            requester_info: self.requester_info.clone(),
            device_info: self.device_info.clone(),
            created_at: self.created_at,
            expires_at: self.expires_at,
            last_used_at: self.last_used_at,
            is_active: self.is_active,
        }
    }
}

/// Listing entry with the token redacted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrowserSessionSummary {
    pub token_preview: String,
    pub requester_info: String,
    pub device_info: serde_json::Value,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub expires_at: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub last_used_at: DateTime<Utc>,
    pub is_active: bool,
}

/// First [`TOKEN_PREVIEW_LEN`] characters followed by `...`.
pub fn redact_token(token: &str) -> String {
    let preview: String = token.chars().take(TOKEN_PREVIEW_LEN).collect();
    format!("{preview}...")
}

/// A registered GNS identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityRecord {
    /// Ed25519 public key, lowercase hex
    pub public_key: String,
    pub handle: Option<String>,
    /// X25519 encryption key, if published
    pub encryption_key: Option<String>,
}

/// Identity attached to an authenticated call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticatedIdentity {
    pub public_key: String,
    pub handle: Option<String>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub expires_at: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub last_used_at: DateTime<Utc>,
}

impl From<&PersistedBrowserSession> for AuthenticatedIdentity {
    fn from(session: &PersistedBrowserSession) -> Self {
        Self {
            public_key: session.approver_public_key.clone(),
            handle: session.approver_handle.clone(),
            expires_at: session.expires_at,
            last_used_at: session.last_used_at,
        }
    }
}
