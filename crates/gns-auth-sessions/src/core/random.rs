//! Token sources
//!
//! Session identifiers, challenges, cancel tokens and browser session tokens
//! all come from a [`TokenSource`]. Production uses the OS CSPRNG; tests
//! script exact values.

use std::collections::VecDeque;
use std::sync::Mutex;

/// Which token is being minted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// 128-bit pairing session id
    SessionId,
    /// 256-bit pairing challenge
    Challenge,
    /// 256-bit requester cancel token
    CancelToken,
    /// 256-bit browser session bearer token
    SessionToken,
}

pub trait TokenSource: Send + Sync {
    fn token(&self, kind: TokenKind) -> String;
}

/// CSPRNG-backed tokens.
#[derive(Debug, Default, Clone, Copy)]
pub struct OsTokenSource;

impl TokenSource for OsTokenSource {
    fn token(&self, kind: TokenKind) -> String {
        match kind {
            TokenKind::SessionId => gns_crypto_core::random_token_128(),
            TokenKind::Challenge | TokenKind::CancelToken | TokenKind::SessionToken => {
                gns_crypto_core::random_token_256()
            }
        }
    }
}

/// Hands out queued values per kind, then falls back to the OS source.
#[derive(Debug, Default)]
pub struct ScriptedTokens {
    queue: Mutex<VecDeque<(TokenKind, String)>>,
}

impl ScriptedTokens {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, kind: TokenKind, value: impl Into<String>) -> &Self {
        self.queue
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back((kind, value.into()));
        self
    }
}

impl TokenSource for ScriptedTokens {
    fn token(&self, kind: TokenKind) -> String {
        let mut queue = self.queue.lock().unwrap_or_else(|e| e.into_inner());
        match queue.iter().position(|(k, _)| *k == kind) {
            Some(index) => queue
                .remove(index)
                .map(|(_, value)| value)
                .unwrap_or_else(|| OsTokenSource.token(kind)),
            None => OsTokenSource.token(kind),
        }
    }
}
