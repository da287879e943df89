//! Session Store
//!
//! In-memory map of live pairing sessions. The map itself sits behind a
//! synchronous `RwLock` that is only held to look up, insert or remove an
//! entry; every session carries its own async mutex which serializes the
//! operations on that session.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Duration, Utc};
use tokio::sync::Mutex;

use crate::models::{PendingSession, SessionStatus};

/// Shared, individually locked session.
pub type SessionHandle = Arc<Mutex<PendingSession>>;

/// Retention windows applied by [`SessionStore::sweep`].
#[derive(Debug, Clone, Copy)]
pub struct SweepPolicy {
    /// Lifetime of an approved session after the requester observed it
    pub approved_grace: Duration,
    /// Lifetime of any session after `expires_at`
    pub abandoned_grace: Duration,
}

/// Outcome of one sweep.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SweepReport {
    pub removed: usize,
    /// Id and last status of every removed session
    pub reaped: Vec<(String, SessionStatus)>,
    /// Sessions skipped because an operation held their lock
    pub skipped_locked: usize,
    pub remaining: usize,
}

/// Whether `session` can be dropped at `now`.
pub fn is_reapable(session: &PendingSession, now: DateTime<Utc>, policy: &SweepPolicy) -> bool {
    if now > session.expires_at + policy.abandoned_grace {
        return true;
    }
    match session.observed_at {
        Some(observed) if session.status == SessionStatus::Approved => {
            now >= observed + policy.approved_grace
        }
        Some(_) => session.status.is_terminal() && session.is_past_expiry(now),
        None => false,
    }
}

#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<String, SessionHandle>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    // Poisoning only means another thread panicked mid-update of the map;
    // the map itself is still consistent.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, SessionHandle>> {
        self.sessions.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, SessionHandle>> {
        self.sessions.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Insert a new session. Returns `false` if the id is already live.
    pub fn insert(&self, session: PendingSession) -> bool {
        let mut sessions = self.write();
        if sessions.contains_key(&session.id) {
            return false;
        }
        sessions.insert(session.id.clone(), Arc::new(Mutex::new(session)));
        true
    }

    pub fn get(&self, id: &str) -> Option<SessionHandle> {
        self.read().get(id).cloned()
    }

    pub fn remove(&self, id: &str) -> bool {
        self.write().remove(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Drop every reapable session whose lock is free.
    pub fn sweep(&self, now: DateTime<Utc>, policy: &SweepPolicy) -> SweepReport {
        let snapshot: Vec<(String, SessionHandle)> = self
            .read()
            .iter()
            .map(|(id, handle)| (id.clone(), Arc::clone(handle)))
            .collect();

        let mut report = SweepReport::default();
        let mut doomed = Vec::new();
        for (id, handle) in snapshot {
            match handle.try_lock() {
                Ok(session) => {
                    if is_reapable(&session, now, policy) {
                        doomed.push((id, session.status, Arc::clone(&handle)));
                    }
                }
                Err(_) => report.skipped_locked += 1,
            }
        }

        let mut sessions = self.write();
        for (id, status, handle) in doomed {
            if sessions
                .get(&id)
                .is_some_and(|current| Arc::ptr_eq(current, &handle))
            {
                sessions.remove(&id);
                report.removed += 1;
                report.reaped.push((id, status));
            }
        }
        report.remaining = sessions.len();
        report
    }
}
