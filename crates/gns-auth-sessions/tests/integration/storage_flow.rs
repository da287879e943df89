//! Integration Tests: SQLite Storage Flow
//!
//! Tests browser sessions persisted through the engine:
//! - Approval writes a session that survives reopening the database
//! - Authentication, listing and revocation
//! - Expired sessions revoked on use

use std::sync::Arc;

use chrono::Duration;
use tempfile::TempDir;

use gns_auth_sessions::core::{ManualClock, TokenKind};
use gns_auth_sessions::{
    BrowserSessionStore, Error, IdentityRecord, PairingConfig, PairingEngine, SqliteStore,
};
use gns_crypto_core::GnsIdentity;

use crate::support::approve_params_for;

struct SqliteHarness {
    engine: Arc<PairingEngine>,
    store: Arc<SqliteStore>,
    clock: Arc<ManualClock>,
    identity: GnsIdentity,
    _temp_dir: TempDir,
}

fn sqlite_harness() -> SqliteHarness {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let store = Arc::new(
        SqliteStore::open(&temp_dir.path().join("auth.db")).expect("Failed to open store"),
    );
    let identity = GnsIdentity::generate();
    store
        .register_identity(&IdentityRecord {
            public_key: identity.public_key_hex(),
            handle: Some("carol".into()),
            encryption_key: Some("12".repeat(32)),
        })
        .expect("Failed to register identity");

    let clock = Arc::new(ManualClock::default());
    let engine = PairingEngine::builder(PairingConfig::default())
        .browser_sessions(store.clone())
        .identities(store.clone())
        .clock(clock.clone())
        .build()
        .expect("engine builds");

    SqliteHarness {
        engine,
        store,
        clock,
        identity,
        _temp_dir: temp_dir,
    }
}

async fn pair(h: &SqliteHarness, requester: &str) -> String {
    let session = h.engine.request_session(Some(requester)).unwrap();
    h.engine
        .approve_session(approve_params_for(
            &h.identity,
            &session.session_id,
            &session.challenge,
        ))
        .await
        .unwrap()
        .session_token
        .expect("approved view carries the token")
}

/// Test: approval persists a session that reopening the database keeps
#[tokio::test]
async fn test_approved_session_is_durable() {
    let h = sqlite_harness();
    let token = pair(&h, "Safari").await;

    let me = h.engine.authenticate(&token).await.unwrap();
    assert_eq!(me.approver_handle.as_deref(), Some("carol"));

    let reopened = SqliteStore::open(&h._temp_dir.path().join("auth.db")).unwrap();
    let stored = reopened
        .get(&token)
        .await
        .unwrap()
        .expect("session persisted");
    assert_eq!(stored.approver_public_key, h.identity.public_key_hex());
    assert_eq!(stored.requester_info, "Safari");
    assert!(stored.is_active);
}

/// Test: the directory's encryption key is handed out when none is supplied
#[tokio::test]
async fn test_encryption_key_from_directory() {
    let h = sqlite_harness();
    let session = h.engine.request_session(None).unwrap();
    let view = h
        .engine
        .approve_session(approve_params_for(
            &h.identity,
            &session.session_id,
            &session.challenge,
        ))
        .await
        .unwrap();
    assert_eq!(
        view.approver_encryption_key.as_deref(),
        Some("12".repeat(32).as_str())
    );
}

/// Test: list and revoke the sessions of an identity
#[tokio::test]
async fn test_list_and_revoke_sessions() {
    let h = sqlite_harness();
    let first = pair(&h, "Firefox").await;
    h.clock.advance(Duration::seconds(1));
    let second = pair(&h, "Chrome").await;

    let listed = h
        .engine
        .list_browser_sessions(&h.identity.public_key_hex())
        .await
        .unwrap();
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].requester_info, "Chrome");
    assert_eq!(listed[0].token_preview, format!("{}...", &second[..8]));
    assert_eq!(listed[1].token_preview, format!("{}...", &first[..8]));

    h.engine.revoke_browser_session(&first).await.unwrap();
    assert!(matches!(
        h.engine.authenticate(&first).await,
        Err(Error::Unauthorized(_))
    ));
    assert!(matches!(
        h.engine.revoke_browser_session(&first).await,
        Err(Error::NotFound(_))
    ));

    let revoked = h
        .engine
        .revoke_all_browser_sessions(&h.identity.public_key_hex())
        .await
        .unwrap();
    assert_eq!(revoked, 1);
    assert!(h
        .engine
        .list_browser_sessions(&h.identity.public_key_hex())
        .await
        .unwrap()
        .is_empty());
}

/// Test: an expired browser session is revoked when presented
#[tokio::test]
async fn test_expired_session_revoked_on_use() {
    let h = sqlite_harness();
    let token = pair(&h, "Edge").await;

    h.clock.advance(Duration::days(7) + Duration::seconds(1));
    assert!(matches!(
        h.engine.authenticate(&token).await,
        Err(Error::Unauthorized(_))
    ));

    let stored = h.store.get(&token).await.unwrap().unwrap();
    assert!(!stored.is_active);
}

/// Test: duplicate session tokens are refused by the store
#[tokio::test]
async fn test_duplicate_token_leaves_session_pending() {
    let h = sqlite_harness();
    let tokens = Arc::new(gns_auth_sessions::core::ScriptedTokens::new());
    tokens
        .push(TokenKind::SessionToken, "dup")
        .push(TokenKind::SessionToken, "dup");
    let engine = PairingEngine::builder(PairingConfig::default())
        .browser_sessions(h.store.clone())
        .identities(h.store.clone())
        .tokens(tokens)
        .build()
        .unwrap();

    let first = engine.request_session(None).unwrap();
    engine
        .approve_session(approve_params_for(
            &h.identity,
            &first.session_id,
            &first.challenge,
        ))
        .await
        .unwrap();

    let second = engine.request_session(None).unwrap();
    let result = engine
        .approve_session(approve_params_for(
            &h.identity,
            &second.session_id,
            &second.challenge,
        ))
        .await;
    assert!(matches!(result, Err(Error::Internal(_))));

    let view = engine.get_session_status(&second.session_id).await.unwrap();
    assert_eq!(view.status, gns_auth_sessions::SessionStatus::Pending);
}
