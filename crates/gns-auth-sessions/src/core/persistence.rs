//! Persistence collaborators
//!
//! The engine stores long-lived browser sessions and looks up identities
//! through these traits. [`MemoryStore`] backs tests and single-process
//! deployments; [`super::storage::SqliteStore`] is the durable one.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::{Error, Result};
use crate::models::{IdentityRecord, PersistedBrowserSession};

/// Durable store of approved browser sessions.
#[async_trait]
pub trait BrowserSessionStore: Send + Sync {
    /// Persist a new session. Fails if the token already exists.
    async fn create(&self, session: PersistedBrowserSession) -> Result<()>;

    /// Look up a session by token, active or not.
    async fn get(&self, token: &str) -> Result<Option<PersistedBrowserSession>>;

    /// Bump `last_used_at`.
    async fn touch(&self, token: &str, at: DateTime<Utc>) -> Result<()>;

    /// Deactivate one session. Returns whether an active session was found.
    async fn revoke(&self, token: &str) -> Result<bool>;

    /// Active sessions of an identity, newest first.
    async fn list_for_identity(&self, public_key: &str) -> Result<Vec<PersistedBrowserSession>>;

    /// Deactivate every active session of an identity.
    async fn revoke_all_for_identity(&self, public_key: &str) -> Result<usize>;
}

/// Lookup of registered identities.
#[async_trait]
pub trait IdentityDirectory: Send + Sync {
    async fn resolve(&self, public_key: &str) -> Result<Option<IdentityRecord>>;
}

/// In-memory implementation of both collaborators.
#[derive(Debug, Default)]
pub struct MemoryStore {
    sessions: Mutex<HashMap<String, PersistedBrowserSession>>,
    identities: Mutex<HashMap<String, IdentityRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_identity(&self, record: IdentityRecord) {
        let mut record = record;
        record.public_key = record.public_key.to_lowercase();
        lock(&self.identities).insert(record.public_key.clone(), record);
    }

    pub fn session_count(&self) -> usize {
        lock(&self.sessions).len()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

#[async_trait]
impl BrowserSessionStore for MemoryStore {
    async fn create(&self, session: PersistedBrowserSession) -> Result<()> {
        let mut sessions = lock(&self.sessions);
        if sessions.contains_key(&session.session_token) {
            return Err(Error::storage("session token already exists"));
        }
        sessions.insert(session.session_token.clone(), session);
        Ok(())
    }

    async fn get(&self, token: &str) -> Result<Option<PersistedBrowserSession>> {
        Ok(lock(&self.sessions).get(token).cloned())
    }

    async fn touch(&self, token: &str, at: DateTime<Utc>) -> Result<()> {
        if let Some(session) = lock(&self.sessions).get_mut(token) {
            session.last_used_at = at;
        }
        Ok(())
    }

    async fn revoke(&self, token: &str) -> Result<bool> {
        Ok(match lock(&self.sessions).get_mut(token) {
            Some(session) if session.is_active => {
                session.is_active = false;
                true
            }
            _ => false,
        })
    }

    async fn list_for_identity(&self, public_key: &str) -> Result<Vec<PersistedBrowserSession>> {
        let public_key = public_key.to_lowercase();
        let mut sessions: Vec<_> = lock(&self.sessions)
            .values()
            .filter(|s| s.is_active && s.approver_public_key == public_key)
            .cloned()
            .collect();
        sessions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(sessions)
    }

    async fn revoke_all_for_identity(&self, public_key: &str) -> Result<usize> {
        let public_key = public_key.to_lowercase();
        let mut count = 0;
        for session in lock(&self.sessions).values_mut() {
            if session.is_active && session.approver_public_key == public_key {
                session.is_active = false;
                count += 1;
            }
        }
        Ok(count)
    }
}

#[async_trait]
impl IdentityDirectory for MemoryStore {
    async fn resolve(&self, public_key: &str) -> Result<Option<IdentityRecord>> {
        Ok(lock(&self.identities).get(&public_key.to_lowercase()).cloned())
    }
}
