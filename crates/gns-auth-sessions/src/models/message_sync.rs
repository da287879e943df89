//! Message Sync Models
//!
//! One-time bundle of already-decrypted conversation history the approver
//! hands to the browser at approval time.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Direction of a synced message relative to the approving identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageDirection {
    Incoming,
    Outgoing,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncedMessage {
    pub id: String,
    pub direction: MessageDirection,
    pub text: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncedConversation {
    pub counterparty_public_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub counterparty_handle: Option<String>,
    #[serde(default)]
    pub messages: Vec<SyncedMessage>,
}

/// Conversation history attached to an approval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageSync {
    #[serde(default)]
    pub conversations: Vec<SyncedConversation>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub synced_at: DateTime<Utc>,
}

impl MessageSync {
    /// Total messages across all conversations.
    pub fn message_count(&self) -> usize {
        self.conversations.iter().map(|c| c.messages.len()).sum()
    }

    /// Check shape and size before the bundle reaches the engine.
    pub fn validate(&self, max_messages: usize) -> Result<()> {
        let count = self.message_count();
        if count > max_messages {
            return Err(Error::invalid_input(format!(
                "messageSync carries {count} messages, limit is {max_messages}"
            )));
        }
        for conversation in &self.conversations {
            if conversation.counterparty_public_key.trim().is_empty() {
                return Err(Error::invalid_input(
                    "messageSync conversation without counterpartyPublicKey",
                ));
            }
            if conversation.messages.iter().any(|m| m.id.trim().is_empty()) {
                return Err(Error::invalid_input("messageSync message without id"));
            }
        }
        Ok(())
    }
}
