//! Pairing Engine
//!
//! The state machine behind browser pairing:
//!
//! ```text
//! (none)  --request-->                          pending
//! pending --approve (valid signature)-->        approved
//! pending --reject (signature) / cancel-->      rejected
//! pending --expiresAt passes-->                 expired
//! ```
//!
//! Every transition out of `pending` happens under the session's own lock,
//! so exactly one of several racing calls wins and the others see
//! `Conflict`. A session past `expiresAt` is never reported as pending and
//! never approved.

use std::sync::{Arc, Weak};

use chrono::{DateTime, Utc};
use subtle::ConstantTimeEq;

use super::clock::{Clock, SystemClock};
use super::notify::{NotificationHub, SessionEvent, Subscription};
use super::persistence::{BrowserSessionStore, IdentityDirectory, MemoryStore};
use super::random::{OsTokenSource, TokenKind, TokenSource};
use super::store::{SessionStore, SweepPolicy, SweepReport};
use super::verifier::{pairing_signing_payload, Ed25519Verifier, PairingAction, SignatureVerifier};
use crate::config::PairingConfig;
use crate::error::{Error, Result};
use crate::models::*;

/// Attempts at drawing an unused session id before giving up.
const MAX_ID_ATTEMPTS: usize = 3;

/// Owns the live pairing sessions and every collaborator they need.
pub struct PairingEngine {
    config: PairingConfig,
    store: Arc<SessionStore>,
    browser_sessions: Arc<dyn BrowserSessionStore>,
    identities: Arc<dyn IdentityDirectory>,
    verifier: Arc<dyn SignatureVerifier>,
    notifications: Arc<NotificationHub>,
    clock: Arc<dyn Clock>,
    tokens: Arc<dyn TokenSource>,
}

/// A listener registered on a session, plus the terminal state the session
/// was already in when the listener arrived.
#[derive(Debug)]
pub struct SessionWatch {
    pub current: Option<SessionEvent>,
    pub subscription: Subscription,
}

impl PairingEngine {
    pub fn builder(config: PairingConfig) -> PairingEngineBuilder {
        PairingEngineBuilder::new(config)
    }

    pub fn config(&self) -> &PairingConfig {
        &self.config
    }

    pub fn notifications(&self) -> &Arc<NotificationHub> {
        &self.notifications
    }

    /// Number of pairing sessions currently held in memory.
    pub fn active_sessions(&self) -> usize {
        self.store.len()
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    // ==================== Pairing ====================

    /// Create a pending session and the QR payload that advertises it.
    pub fn request_session(&self, requester_info: Option<&str>) -> Result<RequestSessionResponse> {
        let requester_info = normalize_requester_info(requester_info);
        let now = self.clock.now();
        let expires_at = now + self.config.session_ttl();

        for _ in 0..MAX_ID_ATTEMPTS {
            let session = PendingSession::new(
                self.tokens.token(TokenKind::SessionId),
                self.tokens.token(TokenKind::Challenge),
                self.tokens.token(TokenKind::CancelToken),
                requester_info.clone(),
                now,
                expires_at,
            );
            let session_id = session.id.clone();
            let challenge = session.challenge.clone();
            let cancel_token = session.cancel_token.clone();

            if !self.store.insert(session) {
                tracing::warn!(session_id = %session_id, "Session id collision, drawing again");
                continue;
            }

            let qr = QrPayload::new(&session_id, &challenge, &requester_info, expires_at);
            tracing::info!(
                session_id = %session_id,
                requester = %requester_info,
                "Pairing session created"
            );
            return Ok(RequestSessionResponse {
                session_id,
                challenge,
                expires_at,
                expires_in: self.config.session_ttl().num_seconds(),
                qr_data: qr.to_json()?,
                deep_link: qr.to_deep_link(&self.config.qr_scheme)?,
                cancel_token,
            });
        }

        Err(Error::Internal("could not allocate a session id".into()))
    }

    /// Current state of a session, as served to a polling requester.
    ///
    /// The first read of an approved session starts its grace window; once
    /// the window has passed the session reads as `NotFound`.
    pub async fn get_session_status(&self, session_id: &str) -> Result<SessionView> {
        let session_id = session_id.trim();
        let handle = self.lookup(session_id)?;
        let mut session = handle.lock().await;
        let now = self.clock.now();

        let (status, observed_at) = (session.status, session.observed_at);
        match status {
            SessionStatus::Pending if session.is_past_expiry(now) => {
                self.expire_locked(&mut session, now);
                drop(session);
                self.publish_expired(session_id).await;
                Err(expired(session_id))
            }
            SessionStatus::Pending => Ok(session.view(now)),
            SessionStatus::Expired => {
                session.observed_at.get_or_insert(now);
                Err(expired(session_id))
            }
            SessionStatus::Rejected => {
                session.observed_at.get_or_insert(now);
                Ok(session.view(now))
            }
            SessionStatus::Approved => match observed_at {
                Some(observed) if now >= observed + self.config.approved_grace() => {
                    drop(session);
                    self.store.remove(session_id);
                    Err(Error::not_found(format!("session {session_id} not found")))
                }
                Some(_) => Ok(session.view(now)),
                None => {
                    self.mark_observed(&mut session, now);
                    Ok(session.view(now))
                }
            },
        }
    }

    /// Approve a pending session on behalf of a registered identity.
    ///
    /// Checks run in a fixed order: session exists, still pending, public
    /// key well formed, signature valid, identity registered. The browser
    /// session is persisted before the in-memory transition, so a storage
    /// failure leaves the pairing session pending.
    pub async fn approve_session(&self, params: ApproveSessionParams) -> Result<SessionView> {
        params.validate(self.config.max_sync_messages)?;

        let session_id = params.session_id.trim();
        let handle = self.lookup(session_id)?;
        let mut session = handle.lock().await;
        let now = self.clock.now();

        if let Err(e) = self.ensure_open(&mut session, now) {
            drop(session);
            if matches!(e, Error::Gone(_)) {
                self.publish_expired(session_id).await;
            }
            return Err(e);
        }

        let public_key = params.public_key.trim().to_lowercase();
        if !self.verifier.is_valid_public_key(&public_key) {
            return Err(Error::invalid_input("publicKey is not a valid Ed25519 key"));
        }
        self.check_signature(
            PairingAction::Approve,
            &session,
            &public_key,
            &params.signature,
        )?;

        let identity = self
            .identities
            .resolve(&public_key)
            .await?
            .ok_or_else(|| Error::not_found("identity not registered"))?;

        let session_token = self.tokens.token(TokenKind::SessionToken);
        let persisted = PersistedBrowserSession {
            session_token: session_token.clone(),
            approver_public_key: public_key.clone(),
            approver_handle: identity.handle.clone(),
            requester_info: session.requester_info.clone(),
            device_info: params.device_info.clone().unwrap_or(serde_json::Value::Null),
            created_at: now,
            expires_at: now + self.config.browser_session_ttl(),
            last_used_at: now,
            is_active: true,
        };
        if let Err(e) = self.browser_sessions.create(persisted).await {
            tracing::error!(
                session_id = %session.id,
                error = %e,
                "Failed to persist browser session, pairing left pending"
            );
            return Err(Error::Internal("failed to persist browser session".into()));
        }

        session.status = SessionStatus::Approved;
        session.approver_public_key = Some(public_key.clone());
        session.approver_handle = identity.handle.clone();
        session.approved_at = Some(now);
        session.issued_session_token = Some(session_token);
        session.approver_encryption_key = params.encryption_key.clone().or(identity.encryption_key);
        session.message_sync = params.message_sync;

        let view = session.view(now);
        drop(session);

        tracing::info!(
            session_id = %view.session_id,
            approver = %public_key,
            handle = ?view.approver_handle,
            messages_synced = view.messages_synced(),
            "Pairing session approved"
        );

        let delivered = self
            .notifications
            .publish(SessionEvent::Approved(view.clone()))
            .await;
        if delivered > 0 {
            // A pushed approval counts as the requester's first read.
            let mut session = handle.lock().await;
            if session.observed_at.is_none() {
                self.mark_observed(&mut session, self.clock.now());
            }
        }

        Ok(view)
    }

    /// Reject a pending session.
    ///
    /// A supplied key and signature are verified over the `reject` payload.
    /// Unsigned rejects are refused unless `allow_unsigned_reject` is set.
    pub async fn reject_session(&self, params: RejectSessionParams) -> Result<()> {
        params.validate()?;

        let session_id = params.session_id.trim();
        let handle = self.lookup(session_id)?;
        let mut session = handle.lock().await;
        let now = self.clock.now();

        if let Err(e) = self.ensure_open(&mut session, now) {
            drop(session);
            if matches!(e, Error::Gone(_)) {
                self.publish_expired(session_id).await;
            }
            return Err(e);
        }

        match (params.public_key.as_deref(), params.signature.as_deref()) {
            (Some(public_key), Some(signature)) => {
                let public_key = public_key.trim().to_lowercase();
                if !self.verifier.is_valid_public_key(&public_key) {
                    return Err(Error::invalid_input("publicKey is not a valid Ed25519 key"));
                }
                self.check_signature(PairingAction::Reject, &session, &public_key, signature)?;
            }
            _ if self.config.allow_unsigned_reject => {
                tracing::debug!(session_id = %session.id, "Accepting unsigned reject");
            }
            _ => return Err(Error::unauthorized("reject requires a signature")),
        }

        session.status = SessionStatus::Rejected;
        drop(session);

        tracing::info!(session_id, "Pairing session rejected");
        self.notifications
            .publish(SessionEvent::Rejected {
                session_id: session_id.to_string(),
            })
            .await;
        Ok(())
    }

    /// Requester-initiated cancel, authorized by the cancel token returned
    /// from [`Self::request_session`].
    pub async fn cancel_session(&self, session_id: &str, params: CancelSessionParams) -> Result<()> {
        params.validate()?;

        let session_id = session_id.trim();
        let handle = self.lookup(session_id)?;
        let mut session = handle.lock().await;

        let token_ok: bool = session
            .cancel_token
            .as_bytes()
            .ct_eq(params.cancel_token.trim().as_bytes())
            .into();
        if !token_ok {
            return Err(Error::unauthorized("invalid cancel token"));
        }

        let now = self.clock.now();
        if let Err(e) = self.ensure_open(&mut session, now) {
            drop(session);
            if matches!(e, Error::Gone(_)) {
                self.publish_expired(session_id).await;
            }
            return Err(e);
        }

        session.status = SessionStatus::Rejected;
        session.observed_at = Some(now);
        drop(session);

        tracing::info!(session_id, "Pairing session cancelled by requester");
        self.notifications
            .publish(SessionEvent::Rejected {
                session_id: session_id.to_string(),
            })
            .await;
        Ok(())
    }

    /// Register a push listener on a session.
    ///
    /// The listener is registered before the state is read, so a transition
    /// racing with the call is either in `current` or delivered on the
    /// channel.
    pub async fn watch_session(&self, session_id: &str) -> Result<SessionWatch> {
        let session_id = session_id.trim();
        let handle = self.lookup(session_id)?;
        let subscription = self.notifications.subscribe(session_id).await;

        let mut session = handle.lock().await;
        let now = self.clock.now();
        let status = session.status;
        let current = match status {
            SessionStatus::Pending if session.is_past_expiry(now) => {
                self.expire_locked(&mut session, now);
                Some(SessionEvent::Expired {
                    session_id: session_id.to_string(),
                })
            }
            SessionStatus::Pending => None,
            SessionStatus::Approved => {
                if session.observed_at.is_none() {
                    self.mark_observed(&mut session, now);
                }
                Some(SessionEvent::Approved(session.view(now)))
            }
            SessionStatus::Rejected => Some(SessionEvent::Rejected {
                session_id: session_id.to_string(),
            }),
            SessionStatus::Expired => Some(SessionEvent::Expired {
                session_id: session_id.to_string(),
            }),
        };
        drop(session);

        if current.is_some() {
            self.notifications
                .unsubscribe(session_id, &subscription.connection_id)
                .await;
        }
        Ok(SessionWatch {
            current,
            subscription,
        })
    }

    // ==================== Browser Sessions ====================

    /// Resolve the bearer token of an authenticated call.
    ///
    /// Unknown, revoked and expired tokens are all `Unauthorized`; an
    /// expired token is revoked on the way out.
    pub async fn authenticate(&self, session_token: &str) -> Result<PersistedBrowserSession> {
        let token = session_token.trim();
        if token.is_empty() {
            return Err(Error::unauthorized("missing session token"));
        }

        let mut session = match self.browser_sessions.get(token).await? {
            Some(session) if session.is_active => session,
            _ => return Err(Error::unauthorized("invalid session token")),
        };

        let now = self.clock.now();
        if session.is_expired(now) {
            self.browser_sessions.revoke(token).await?;
            tracing::info!(approver = %session.approver_public_key, "Expired browser session revoked");
            return Err(Error::unauthorized("session expired"));
        }

        self.browser_sessions.touch(token, now).await?;
        session.last_used_at = now;
        Ok(session)
    }

    /// Active, unexpired browser sessions of an identity with tokens redacted.
    pub async fn list_browser_sessions(&self, public_key: &str) -> Result<Vec<BrowserSessionSummary>> {
        let public_key = self.require_public_key(public_key)?;
        let now = self.clock.now();
        Ok(self
            .browser_sessions
            .list_for_identity(&public_key)
            .await?
            .iter()
            .filter(|s| !s.is_expired(now))
            .map(PersistedBrowserSession::summary)
            .collect())
    }

    pub async fn revoke_browser_session(&self, session_token: &str) -> Result<()> {
        let token = session_token.trim();
        if token.is_empty() || !self.browser_sessions.revoke(token).await? {
            return Err(Error::not_found("browser session not found"));
        }
        tracing::info!("Browser session revoked");
        Ok(())
    }

    pub async fn revoke_all_browser_sessions(&self, public_key: &str) -> Result<usize> {
        let public_key = self.require_public_key(public_key)?;
        let count = self
            .browser_sessions
            .revoke_all_for_identity(&public_key)
            .await?;
        tracing::info!(approver = %public_key, count, "Browser sessions revoked");
        Ok(count)
    }

    // ==================== Maintenance ====================

    /// One reaper pass over the live sessions.
    ///
    /// Listeners of a session reaped before it was resolved receive
    /// `Expired`; any other listener left on a reaped session is released.
    pub async fn reap(&self) -> SweepReport {
        let report = self.store.sweep(self.clock.now(), &self.sweep_policy());
        for (session_id, status) in &report.reaped {
            match status {
                SessionStatus::Pending | SessionStatus::Expired => {
                    self.publish_expired(session_id).await;
                }
                SessionStatus::Approved | SessionStatus::Rejected => {
                    self.notifications.release(session_id).await;
                }
            }
        }
        if report.removed > 0 || report.skipped_locked > 0 {
            tracing::debug!(
                removed = report.removed,
                skipped = report.skipped_locked,
                remaining = report.remaining,
                "Reaped pairing sessions"
            );
        }
        report
    }

    fn sweep_policy(&self) -> SweepPolicy {
        SweepPolicy {
            approved_grace: self.config.approved_grace(),
            abandoned_grace: self.config.abandoned_grace(),
        }
    }

    // ==================== Internals ====================

    /// Callers pass the trimmed id, which is also the key listeners are
    /// registered under.
    fn lookup(&self, session_id: &str) -> Result<super::store::SessionHandle> {
        self.store
            .get(session_id)
            .ok_or_else(|| Error::not_found(format!("session {session_id} not found")))
    }

    fn require_public_key(&self, public_key: &str) -> Result<String> {
        let public_key = public_key.trim().to_lowercase();
        if !self.verifier.is_valid_public_key(&public_key) {
            return Err(Error::invalid_input("invalid identity public key"));
        }
        Ok(public_key)
    }

    /// `Conflict` for resolved sessions, `Gone` for expired ones. A pending
    /// session found past expiry is moved to `expired` here.
    fn ensure_open(&self, session: &mut PendingSession, now: DateTime<Utc>) -> Result<()> {
        match session.status {
            SessionStatus::Pending if session.is_past_expiry(now) => {
                self.expire_locked(session, now);
                Err(expired(&session.id))
            }
            SessionStatus::Pending => Ok(()),
            SessionStatus::Expired => Err(expired(&session.id)),
            SessionStatus::Approved | SessionStatus::Rejected => Err(Error::Conflict(format!(
                "session {} already {}",
                session.id, session.status
            ))),
        }
    }

    fn expire_locked(&self, session: &mut PendingSession, now: DateTime<Utc>) {
        session.status = SessionStatus::Expired;
        session.observed_at.get_or_insert(now);
        tracing::debug!(session_id = %session.id, "Pairing session expired");
    }

    async fn publish_expired(&self, session_id: &str) {
        self.notifications
            .publish(SessionEvent::Expired {
                session_id: session_id.to_string(),
            })
            .await;
    }

    fn check_signature(
        &self,
        action: PairingAction,
        session: &PendingSession,
        public_key: &str,
        signature: &str,
    ) -> Result<()> {
        let payload = pairing_signing_payload(action, &session.id, &session.challenge, public_key);
        match self.verifier.verify(public_key, payload.as_bytes(), signature) {
            Ok(true) => Ok(()),
            Ok(false) => {
                tracing::warn!(
                    session_id = %session.id,
                    action = action.as_str(),
                    "Pairing signature rejected"
                );
                Err(Error::unauthorized("signature verification failed"))
            }
            Err(e) => Err(Error::unauthorized(format!("malformed signature: {e}"))),
        }
    }

    /// Record the first terminal read and schedule removal once the
    /// approved grace window has passed.
    fn mark_observed(&self, session: &mut PendingSession, now: DateTime<Utc>) {
        session.observed_at = Some(now);
        if session.status != SessionStatus::Approved {
            return;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let store: Weak<SessionStore> = Arc::downgrade(&self.store);
        let session_id = session.id.clone();
        let grace = self
            .config
            .approved_grace()
            .to_std()
            .unwrap_or_default();
        runtime.spawn(async move {
            tokio::time::sleep(grace).await;
            if let Some(store) = store.upgrade() {
                if store.remove(&session_id) {
                    tracing::debug!(session_id = %session_id, "Consumed pairing session removed");
                }
            }
        });
    }
}

fn expired(session_id: &str) -> Error {
    Error::Gone(format!("session {session_id} expired"))
}

impl std::fmt::Debug for PairingEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PairingEngine")
            .field("config", &self.config)
            .field("active_sessions", &self.store.len())
            .finish_non_exhaustive()
    }
}

/// Builder for [`PairingEngine`].
///
/// Collaborators default to an in-memory store, Ed25519 verification, the
/// system clock and OS randomness.
///
/// ```rust
/// use gns_auth_sessions::{PairingConfig, PairingEngine};
///
/// let engine = PairingEngine::builder(PairingConfig::default()).build().unwrap();
/// assert_eq!(engine.active_sessions(), 0);
/// ```
pub struct PairingEngineBuilder {
    config: PairingConfig,
    browser_sessions: Option<Arc<dyn BrowserSessionStore>>,
    identities: Option<Arc<dyn IdentityDirectory>>,
    verifier: Arc<dyn SignatureVerifier>,
    notifications: Arc<NotificationHub>,
    clock: Arc<dyn Clock>,
    tokens: Arc<dyn TokenSource>,
}

impl PairingEngineBuilder {
    pub fn new(config: PairingConfig) -> Self {
        Self {
            config,
            browser_sessions: None,
            identities: None,
            verifier: Arc::new(Ed25519Verifier),
            notifications: Arc::new(NotificationHub::new()),
            clock: Arc::new(SystemClock),
            tokens: Arc::new(OsTokenSource),
        }
    }

    /// Store for approved browser sessions.
    pub fn browser_sessions(mut self, store: Arc<dyn BrowserSessionStore>) -> Self {
        self.browser_sessions = Some(store);
        self
    }

    /// Directory approvals are checked against.
    pub fn identities(mut self, directory: Arc<dyn IdentityDirectory>) -> Self {
        self.identities = Some(directory);
        self
    }

    pub fn verifier(mut self, verifier: Arc<dyn SignatureVerifier>) -> Self {
        self.verifier = verifier;
        self
    }

    pub fn notifications(mut self, hub: Arc<NotificationHub>) -> Self {
        self.notifications = hub;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn tokens(mut self, tokens: Arc<dyn TokenSource>) -> Self {
        self.tokens = tokens;
        self
    }

    pub fn build(self) -> Result<Arc<PairingEngine>> {
        self.config.validate()?;

        let (browser_sessions, identities) = match (self.browser_sessions, self.identities) {
            (Some(sessions), Some(identities)) => (sessions, identities),
            (sessions, identities) => {
                let memory = Arc::new(MemoryStore::new());
                let sessions = sessions
                    .unwrap_or_else(|| memory.clone() as Arc<dyn BrowserSessionStore>);
                let identities =
                    identities.unwrap_or_else(|| memory as Arc<dyn IdentityDirectory>);
                (sessions, identities)
            }
        };

        Ok(Arc::new(PairingEngine {
            config: self.config,
            store: Arc::new(SessionStore::new()),
            browser_sessions,
            identities,
            verifier: self.verifier,
            notifications: self.notifications,
            clock: self.clock,
            tokens: self.tokens,
        }))
    }
}
