//! GNS Auth Session Error Types
//!
//! One taxonomy shared by the pairing engine, the HTTP surface and the
//! client agents, so a failure keeps its meaning end to end.

use serde::{Deserialize, Serialize};

/// Result type alias for pairing operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Pairing Error Types
///
/// Every precondition violation in the engine maps to exactly one of these.
/// Errors are serializable so client agents can rebuild them from an HTTP
/// error body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[serde(tag = "type", content = "message")]
pub enum Error {
    /// Unknown pairing session, browser session or identity
    #[error("Not found: {0}")]
    NotFound(String),

    /// Pairing session expired; the requester must start over
    #[error("Session expired: {0}")]
    Gone(String),

    /// Pairing session already resolved
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Malformed public key, signature or request body
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Signature verification failed, or session token invalid/expired
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Persistent store failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// Network operation failed (client agents)
    #[error("Network error: {0}")]
    Network(String),

    /// Operation timed out
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error (unexpected condition)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a not-found error with context
    pub fn not_found(msg: impl Into<String>) -> Self {
        Error::NotFound(msg.into())
    }

    /// Create an invalid-input error with context
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Error::InvalidInput(msg.into())
    }

    /// Create an unauthorized error with context
    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Error::Unauthorized(msg.into())
    }

    /// Create a storage error with context
    pub fn storage(msg: impl Into<String>) -> Self {
        Error::Storage(msg.into())
    }

    /// Whether the requester should generate a brand-new pairing session.
    ///
    /// An expired or reaped session can never be revived.
    pub fn requires_new_session(&self) -> bool {
        matches!(self, Error::NotFound(_) | Error::Gone(_))
    }

    /// Check if this error is recoverable by retrying the same call
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::Network(_) | Error::Timeout(_))
    }

    /// Get the error code for this error type
    pub fn code(&self) -> &'static str {
        match self {
            Error::NotFound(_) => "GNS_NOT_FOUND",
            Error::Gone(_) => "GNS_SESSION_EXPIRED",
            Error::Conflict(_) => "GNS_CONFLICT",
            Error::InvalidInput(_) => "GNS_INVALID_INPUT",
            Error::Unauthorized(_) => "GNS_UNAUTHORIZED",
            Error::Storage(_) => "GNS_STORAGE",
            Error::Network(_) => "GNS_NETWORK",
            Error::Timeout(_) => "GNS_TIMEOUT",
            Error::Serialization(_) => "GNS_SERIALIZATION",
            Error::Config(_) => "GNS_CONFIG",
            Error::Internal(_) => "GNS_INTERNAL",
        }
    }

    /// Rebuild an error from the `code` and `error` fields of an HTTP error body.
    pub fn from_code(code: &str, message: impl Into<String>) -> Self {
        let message = message.into();
        match code {
            "GNS_NOT_FOUND" => Error::NotFound(message),
            "GNS_SESSION_EXPIRED" => Error::Gone(message),
            "GNS_CONFLICT" => Error::Conflict(message),
            "GNS_INVALID_INPUT" => Error::InvalidInput(message),
            "GNS_UNAUTHORIZED" => Error::Unauthorized(message),
            "GNS_STORAGE" => Error::Storage(message),
            "GNS_NETWORK" => Error::Network(message),
            "GNS_TIMEOUT" => Error::Timeout(message),
            "GNS_SERIALIZATION" => Error::Serialization(message),
            "GNS_CONFIG" => Error::Config(message),
            _ => Error::Internal(message),
        }
    }
}

// Convert from various error types

impl From<gns_crypto_core::CryptoError> for Error {
    fn from(e: gns_crypto_core::CryptoError) -> Self {
        Error::InvalidInput(e.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        if e.kind() == std::io::ErrorKind::TimedOut {
            Error::Timeout(e.to_string())
        } else {
            Error::Internal(format!("IO error: {}", e))
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<rusqlite::Error> for Error {
    fn from(e: rusqlite::Error) -> Self {
        Error::Storage(e.to_string())
    }
}

impl From<tokio::task::JoinError> for Error {
    fn from(e: tokio::task::JoinError) -> Self {
        Error::Internal(format!("Background task failed: {}", e))
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Error::Timeout(e.to_string())
        } else if e.is_connect() {
            Error::Network(format!("Connection failed: {}", e))
        } else if e.is_decode() {
            Error::Serialization(e.to_string())
        } else {
            Error::Network(e.to_string())
        }
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for Error {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
        Error::Network(format!("WebSocket error: {}", e))
    }
}

impl From<url::ParseError> for Error {
    fn from(e: url::ParseError) -> Self {
        Error::InvalidInput(format!("Invalid URL: {}", e))
    }
}
