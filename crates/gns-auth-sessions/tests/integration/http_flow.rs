//! Integration Tests: HTTP Flow
//!
//! Tests the pairing API over HTTP:
//! - Router status codes and error bodies, in-process
//! - A live server driven by the requester and approver agents

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use gns_auth_sessions::api::{self, AppState, SESSION_HEADER};
use gns_auth_sessions::{
    Error, ErrorResponse, IdentityRecord, MemoryStore, PairingApprover, PairingClient,
    PairingConfig, PairingEngine, PairingOutcome, PairingRequester, RequestSessionResponse,
    SessionView,
};
use gns_crypto_core::GnsIdentity;

use crate::support::Harness;

async fn send(app: axum::Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::post(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// Test: request without a body falls back to the User-Agent
#[tokio::test]
async fn test_request_session_uses_user_agent() {
    let h = Harness::new();
    let app = api::router(AppState::new(h.engine.clone()));

    let request = Request::post("/auth/sessions/request")
        .header(header::USER_AGENT, "Mozilla/5.0 Test")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(app.clone(), request).await;
    assert_eq!(status, StatusCode::CREATED);

    let created: RequestSessionResponse = serde_json::from_value(body).unwrap();
    assert_eq!(created.expires_in, 300);

    let uri = format!("/auth/sessions/{}", created.session_id);
    let (status, body) = send(app, Request::get(uri).body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::OK);
    let view: SessionView = serde_json::from_value(body).unwrap();
    assert_eq!(view.requester_info, "Mozilla/5.0 Test");
}

/// Test: error bodies carry the error code
#[tokio::test]
async fn test_error_status_codes() {
    let h = Harness::new();
    let app = api::router(AppState::new(h.engine.clone()));

    let (status, body) = send(
        app.clone(),
        Request::get("/auth/sessions/does-not-exist")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let error: ErrorResponse = serde_json::from_value(body).unwrap();
    assert_eq!(error.code, "GNS_NOT_FOUND");

    let (status, _) = send(
        app.clone(),
        post_json("/auth/sessions/approve", json!({ "sessionId": 42 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(
        app.clone(),
        Request::get("/auth/me").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "GNS_UNAUTHORIZED");

    let (status, _) = send(
        app,
        Request::get("/auth/sessions")
            .header("x-identity-publickey", "not-a-key")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

/// Test: bad signature is 401, late approval is 409
#[tokio::test]
async fn test_approve_over_http() {
    let h = Harness::new();
    let app = api::router(AppState::new(h.engine.clone()));
    let session = h.engine.request_session(None).unwrap();

    let mut params = h.approve_params(&session);
    params.signature = "00".repeat(64);
    let (status, body) = send(
        app.clone(),
        post_json("/auth/sessions/approve", serde_json::to_value(&params).unwrap()),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "GNS_UNAUTHORIZED");

    let params = h.approve_params(&session);
    let (status, body) = send(
        app.clone(),
        post_json("/auth/sessions/approve", serde_json::to_value(&params).unwrap()),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["approverInfo"]["handle"], "alice");

    let (status, body) = send(
        app.clone(),
        post_json("/auth/sessions/approve", serde_json::to_value(&params).unwrap()),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "GNS_CONFLICT");

    let uri = format!("/auth/sessions/{}", session.session_id);
    let (_, body) = send(app.clone(), Request::get(uri).body(Body::empty()).unwrap()).await;
    let token = body["sessionToken"].as_str().unwrap().to_string();

    let (status, body) = send(
        app,
        Request::get("/auth/me")
            .header(SESSION_HEADER, token)
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["publicKey"], h.identity.public_key_hex());
}

/// Test: cancel over HTTP
#[tokio::test]
async fn test_cancel_over_http() {
    let h = Harness::new();
    let app = api::router(AppState::new(h.engine.clone()));
    let session = h.engine.request_session(None).unwrap();
    let uri = format!("/auth/sessions/{}/cancel", session.session_id);

    let (status, _) = send(
        app.clone(),
        post_json(&uri, json!({ "cancelToken": "wrong" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(
        app.clone(),
        post_json(&uri, json!({ "cancelToken": session.cancel_token })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(
        app,
        post_json(&uri, json!({ "cancelToken": session.cancel_token })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

struct LiveServer {
    base_url: String,
    identity: GnsIdentity,
    task: tokio::task::JoinHandle<()>,
}

async fn live_server() -> LiveServer {
    let identity = GnsIdentity::generate();
    let store = Arc::new(MemoryStore::new());
    store.register_identity(IdentityRecord {
        public_key: identity.public_key_hex(),
        handle: Some("dave".into()),
        encryption_key: None,
    });
    let engine = PairingEngine::builder(PairingConfig::development())
        .browser_sessions(store.clone())
        .identities(store)
        .build()
        .unwrap();

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = api::router(AppState::new(engine));
    let task = tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    LiveServer {
        base_url: format!("http://{addr}"),
        identity,
        task,
    }
}

async fn pair_with_agents(requester: PairingRequester, server: &LiveServer) -> PairingOutcome {
    let client = PairingClient::new(&server.base_url).unwrap();
    let approver = PairingApprover::new(server.identity.clone(), client)
        .with_device_info(json!({ "platform": "test" }));

    let session = requester.start(Some("Integration Browser")).await.unwrap();
    let qr = session.qr_data.clone();

    let waiting = tokio::spawn(async move { requester.await_outcome(&session).await });
    tokio::time::sleep(Duration::from_millis(100)).await;

    let request = approver.scan(&qr).unwrap();
    let approved = approver.approve(&request, None).await.unwrap();
    assert_eq!(approved.approver_info.handle.as_deref(), Some("dave"));

    tokio::time::timeout(Duration::from_secs(10), waiting)
        .await
        .expect("pairing finished")
        .unwrap()
        .unwrap()
}

/// Test: full pairing against a live server with WebSocket push
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_live_pairing_with_push() {
    let server = live_server().await;
    let client = PairingClient::new(&server.base_url).unwrap();
    assert_eq!(client.health().await.unwrap().status, "ok");

    let requester =
        PairingRequester::new(client.clone()).with_poll_interval(Duration::from_millis(200));
    let outcome = pair_with_agents(requester, &server).await;

    let token = outcome.session_token().expect("token issued").to_string();
    let me = client.me(&token).await.unwrap();
    assert_eq!(me.public_key, server.identity.public_key_hex());
    assert_eq!(me.handle.as_deref(), Some("dave"));

    let sessions = client
        .list_sessions(&server.identity.public_key_hex())
        .await
        .unwrap();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].requester_info, "Integration Browser");

    client.revoke_session(&token).await.unwrap();
    assert!(matches!(client.me(&token).await, Err(Error::Unauthorized(_))));

    server.task.abort();
}

/// Test: polling-only requester, then a rejection
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_live_polling_and_reject() {
    let server = live_server().await;
    let client = PairingClient::new(&server.base_url).unwrap();

    let requester = PairingRequester::new(client.clone())
        .with_poll_interval(Duration::from_millis(100))
        .polling_only();
    let outcome = pair_with_agents(requester, &server).await;
    assert!(matches!(outcome, PairingOutcome::Approved(_)));

    let requester = PairingRequester::new(client.clone()).with_poll_interval(Duration::from_millis(100));
    let session = requester.start(None).await.unwrap();
    let approver = PairingApprover::new(server.identity.clone(), client.clone());
    let request = approver.scan(&session.deep_link).unwrap();
    approver.reject(&request).await.unwrap();

    let outcome = requester.await_outcome(&session).await.unwrap();
    assert_eq!(outcome, PairingOutcome::Rejected);

    let revoked = approver.revoke_all_sessions().await.unwrap();
    assert_eq!(revoked, 1);

    server.task.abort();
}

/// Test: an unknown session surfaces as NotFound to the client
#[tokio::test]
async fn test_client_maps_error_bodies() {
    let server = live_server().await;
    let client = PairingClient::new(&server.base_url).unwrap();

    assert!(matches!(
        client.get_session("missing").await,
        Err(Error::NotFound(_))
    ));
    assert!(matches!(
        client.cancel_session("missing", "token").await,
        Err(Error::NotFound(_))
    ));

    server.task.abort();
}
