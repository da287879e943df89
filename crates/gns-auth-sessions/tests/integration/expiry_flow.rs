//! Integration Tests: Expiry and Reaping
//!
//! Tests the time-driven side of the engine:
//! - The expiresAt boundary
//! - Late approvals issuing nothing
//! - Reaper passes over approved, rejected and abandoned sessions

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::Duration;

use gns_auth_sessions::core::{ManualClock, ReaperHandle};
use gns_auth_sessions::{Error, PairingConfig, PairingEngine, SessionEvent, SessionStatus};

use crate::support::Harness;

/// Test: a session is still approvable exactly at expiresAt
#[tokio::test]
async fn test_expiry_boundary_is_inclusive() {
    let h = Harness::new();
    let session = h.engine.request_session(None).unwrap();

    h.clock.advance(Duration::seconds(300));
    let view = h
        .engine
        .get_session_status(&session.session_id)
        .await
        .unwrap();
    assert_eq!(view.status, SessionStatus::Pending);
    assert_eq!(view.expires_in, 0);

    h.engine
        .approve_session(h.approve_params(&session))
        .await
        .unwrap();
}

/// Test: approve after expiry is Gone and issues no token
#[tokio::test]
async fn test_approve_after_expiry_is_gone() {
    let h = Harness::new();
    let session = h.engine.request_session(None).unwrap();

    h.clock.advance(Duration::seconds(301));
    let result = h.engine.approve_session(h.approve_params(&session)).await;

    assert!(matches!(result, Err(Error::Gone(_))));
    assert_eq!(h.store.session_count(), 0);

    let polled = h.engine.get_session_status(&session.session_id).await;
    assert!(matches!(polled, Err(Error::Gone(_))));
}

/// Test: a poll past expiry reports Gone and pushes Expired
#[tokio::test]
async fn test_poll_after_expiry_notifies_watchers() {
    let h = Harness::new();
    let session = h.engine.request_session(None).unwrap();
    let watch = h.engine.watch_session(&session.session_id).await.unwrap();
    let mut receiver = watch.subscription.receiver;

    h.clock.advance(Duration::minutes(6));
    let polled = h.engine.get_session_status(&session.session_id).await;
    assert!(matches!(polled, Err(Error::Gone(_))));

    assert_eq!(
        receiver.recv().await,
        Some(SessionEvent::Expired {
            session_id: session.session_id.clone()
        })
    );

    // A late watcher gets the terminal state immediately.
    let late = h.engine.watch_session(&session.session_id).await.unwrap();
    assert!(matches!(late.current, Some(SessionEvent::Expired { .. })));
}

/// Test: cancel after expiry is Gone
#[tokio::test]
async fn test_cancel_after_expiry_is_gone() {
    let h = Harness::new();
    let session = h.engine.request_session(None).unwrap();

    h.clock.advance(Duration::seconds(301));
    let result = h
        .engine
        .cancel_session(
            &session.session_id,
            gns_auth_sessions::CancelSessionParams {
                cancel_token: session.cancel_token.clone(),
            },
        )
        .await;
    assert!(matches!(result, Err(Error::Gone(_))));
}

/// Test: reap removes observed approvals after the grace window
#[tokio::test]
async fn test_reap_observed_approval() {
    let h = Harness::new();
    let session = h.engine.request_session(None).unwrap();
    h.engine
        .approve_session(h.approve_params(&session))
        .await
        .unwrap();

    // Unobserved approvals survive until the abandoned window closes.
    h.clock.advance(Duration::seconds(30));
    assert_eq!(h.engine.reap().await.removed, 0);

    h.engine
        .get_session_status(&session.session_id)
        .await
        .unwrap();
    h.clock.advance(Duration::seconds(10));
    let report = h.engine.reap().await;
    assert_eq!(report.removed, 1);
    assert_eq!(report.remaining, 0);
}

/// Test: reap removes sessions abandoned past expiry
#[tokio::test]
async fn test_reap_abandoned_sessions() {
    let h = Harness::new();
    h.engine.request_session(None).unwrap();
    h.engine.request_session(None).unwrap();

    h.clock.advance(Duration::seconds(301));
    assert_eq!(h.engine.reap().await.removed, 0);

    h.clock.advance(Duration::minutes(5));
    let report = h.engine.reap().await;
    assert_eq!(report.removed, 2);
    assert_eq!(h.engine.active_sessions(), 0);
}

/// Test: a watcher of an abandoned session is told it expired when reaped
#[tokio::test]
async fn test_reap_notifies_abandoned_watchers() {
    let h = Harness::new();
    let session = h.engine.request_session(None).unwrap();
    let watch = h.engine.watch_session(&session.session_id).await.unwrap();
    assert!(watch.current.is_none());
    let mut receiver = watch.subscription.receiver;

    h.clock.advance(Duration::minutes(11));
    let report = h.engine.reap().await;
    assert_eq!(report.removed, 1);
    assert_eq!(h.engine.active_sessions(), 0);

    assert_eq!(
        receiver.recv().await,
        Some(SessionEvent::Expired {
            session_id: session.session_id.clone()
        })
    );
    assert!(receiver.recv().await.is_none());
    assert_eq!(
        h.engine
            .notifications()
            .listener_count(&session.session_id)
            .await,
        0
    );
}

/// Test: listeners left on a reaped approval are released
#[tokio::test]
async fn test_reap_releases_stale_listeners() {
    let h = Harness::new();
    let session = h.engine.request_session(None).unwrap();
    h.engine
        .approve_session(h.approve_params(&session))
        .await
        .unwrap();
    let mut stale = h.engine.notifications().subscribe(&session.session_id).await;

    h.clock.advance(Duration::minutes(11));
    assert_eq!(h.engine.reap().await.removed, 1);

    assert!(stale.receiver.recv().await.is_none());
    assert_eq!(
        h.engine
            .notifications()
            .listener_count(&session.session_id)
            .await,
        0
    );
}

/// Test: rejected sessions are dropped once observed and past expiry
#[tokio::test]
async fn test_reap_observed_rejection_after_expiry() {
    let h = Harness::with_config(PairingConfig {
        allow_unsigned_reject: true,
        ..PairingConfig::default()
    });
    let session = h.engine.request_session(None).unwrap();
    h.engine
        .reject_session(gns_auth_sessions::RejectSessionParams {
            session_id: session.session_id.clone(),
            public_key: None,
            signature: None,
        })
        .await
        .unwrap();
    h.engine
        .get_session_status(&session.session_id)
        .await
        .unwrap();

    assert_eq!(h.engine.reap().await.removed, 0);
    h.clock.advance(Duration::seconds(301));
    assert_eq!(h.engine.reap().await.removed, 1);
}

/// Test: the background reaper runs on its interval and stops cleanly
#[tokio::test(start_paused = true)]
async fn test_background_reaper() {
    let clock = Arc::new(ManualClock::default());
    let engine = PairingEngine::builder(PairingConfig::default())
        .clock(clock.clone())
        .build()
        .unwrap();
    engine.request_session(None).unwrap();

    let reaper = ReaperHandle::spawn_with_interval(Arc::clone(&engine), StdDuration::from_secs(60));
    clock.advance(Duration::minutes(11));

    tokio::time::sleep(StdDuration::from_secs(61)).await;
    assert_eq!(engine.active_sessions(), 0);

    reaper.shutdown().await;
}
