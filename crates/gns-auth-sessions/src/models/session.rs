//! Pairing Session Models
//!
//! The short-lived pairing session and the view of it served to requesters.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::message_sync::MessageSync;

/// Longest requester descriptor kept on a session.
pub const MAX_REQUESTER_INFO_LEN: usize = 512;

/// Descriptor used when the requester supplied none.
pub const UNKNOWN_REQUESTER: &str = "Unknown browser";

/// Lifecycle of a pairing session.
///
/// Transitions are one-way: `Pending` moves to exactly one of the other
/// three and never back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Pending,
    Approved,
    Rejected,
    Expired,
}

impl SessionStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, SessionStatus::Pending)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Pending => "pending",
            SessionStatus::Approved => "approved",
            SessionStatus::Rejected => "rejected",
            SessionStatus::Expired => "expired",
        }
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A pairing session held in memory by the engine.
///
/// `issued_session_token` is `Some` exactly when `status` is `Approved`.
#[derive(Debug, Clone)]
pub struct PendingSession {
    /// 128-bit random identifier (hex)
    pub id: String,
    /// 256-bit random challenge the approver signs
    pub challenge: String,
    /// Requester-only secret authorizing cancellation
    pub cancel_token: String,
    /// User agent or other free-text descriptor of the requester
    pub requester_info: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub status: SessionStatus,
    pub approver_public_key: Option<String>,
    pub approver_handle: Option<String>,
    pub approved_at: Option<DateTime<Utc>>,
    pub issued_session_token: Option<String>,
    pub approver_encryption_key: Option<String>,
    pub message_sync: Option<MessageSync>,
    /// First time a terminal status was reported to the requester
    pub observed_at: Option<DateTime<Utc>>,
}

impl PendingSession {
    pub fn new(
        id: String,
        challenge: String,
        cancel_token: String,
        requester_info: String,
        created_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            challenge,
            cancel_token,
            requester_info,
            created_at,
            expires_at,
            status: SessionStatus::Pending,
            approver_public_key: None,
            approver_handle: None,
            approved_at: None,
            issued_session_token: None,
            approver_encryption_key: None,
            message_sync: None,
            observed_at: None,
        }
    }

    /// Strictly past `expires_at`.
    pub fn is_past_expiry(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    /// Pending and not yet past expiry.
    pub fn is_open(&self, now: DateTime<Utc>) -> bool {
        self.status == SessionStatus::Pending && !self.is_past_expiry(now)
    }

    pub fn view(&self, now: DateTime<Utc>) -> SessionView {
        let approved = self.status == SessionStatus::Approved;
        SessionView {
            session_id: self.id.clone(),
            status: self.status,
            challenge: (self.status == SessionStatus::Pending).then(|| self.challenge.clone()),
            requester_info: self.requester_info.clone(),
            created_at: self.created_at,
            expires_at: self.expires_at,
            expires_in: (self.expires_at - now).num_seconds().max(0),
            approver_public_key: self.approver_public_key.clone().filter(|_| approved),
            approver_handle: self.approver_handle.clone().filter(|_| approved),
            session_token: self.issued_session_token.clone().filter(|_| approved),
            approver_encryption_key: self.approver_encryption_key.clone().filter(|_| approved),
            message_sync: self.message_sync.clone().filter(|_| approved),
            approved_at: self.approved_at.filter(|_| approved),
        }
    }
}

/// Trim and bound a requester descriptor, falling back to
/// [`UNKNOWN_REQUESTER`].
pub fn normalize_requester_info(raw: Option<&str>) -> String {
    let trimmed = raw.map(str::trim).unwrap_or_default();
    if trimmed.is_empty() {
        return UNKNOWN_REQUESTER.to_string();
    }
    trimmed.chars().take(MAX_REQUESTER_INFO_LEN).collect()
}

/// What a requester sees when polling a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub session_id: String,
    pub status: SessionStatus,
    /// Present while pending
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub challenge: Option<String>,
    pub requester_info: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub expires_at: DateTime<Utc>,
    /// Seconds until expiry, floored at zero
    pub expires_in: i64,

    // Approval fields, only when approved
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approver_public_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approver_handle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approver_encryption_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_sync: Option<MessageSync>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "chrono::serde::ts_milliseconds_option"
    )]
    pub approved_at: Option<DateTime<Utc>>,
}

impl SessionView {
    pub fn approver_info(&self) -> Option<ApproverInfo> {
        self.approver_public_key.as_ref().map(|pk| ApproverInfo {
            public_key: pk.clone(),
            handle: self.approver_handle.clone(),
        })
    }

    pub fn messages_synced(&self) -> usize {
        self.message_sync
            .as_ref()
            .map(MessageSync::message_count)
            .unwrap_or(0)
    }
}

/// Identity that approved a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApproverInfo {
    pub public_key: String,
    pub handle: Option<String>,
}
