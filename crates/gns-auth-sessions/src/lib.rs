//! # GNS Auth Sessions
//!
//! **QR browser pairing for GNS identities**
//!
//! A browser with no key material asks the server for a pairing session and
//! shows it as a QR code. The identity holder scans the code on a device that
//! holds their Ed25519 key, signs the session's challenge and approves it. The
//! browser learns the outcome by polling or over a WebSocket and receives a
//! long-lived session token bound to that identity.
//!
//! ## Flow
//!
//! ```text
//!  Browser                      Server                       Phone
//!    |  POST /auth/sessions/request |                            |
//!    |----------------------------->|                            |
//!    |  { sessionId, challenge,     |                            |
//!    |    qrData, cancelToken }     |                            |
//!    |                              |          scan qrData        |
//!    |                              |<----------------------------|
//!    |                              |  POST /auth/sessions/approve|
//!    |                              |  sign(approve, id, chal, pk)|
//!    |  GET /auth/sessions/{id}     |                            |
//!    |  or WS /auth/sessions/{id}/ws|                            |
//!    |<-----------------------------|                            |
//!    |  { status: approved,         |                            |
//!    |    sessionToken }            |                            |
//! ```
//!
//! ## Security Model
//!
//! - Approvals are signed over canonical JSON binding the action, session
//!   id, challenge and approver key, so a signature cannot be replayed on
//!   another session or turned into a reject.
//! - Pairing sessions live for five minutes and are single-use.
//! - Session tokens are 256-bit random values and are only ever returned
//!   to the requester that polls the approved session.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use gns_auth_sessions::{api, PairingConfig, PairingEngine, ReaperHandle};
//!
//! # async fn run() -> gns_auth_sessions::Result<()> {
//! let engine = PairingEngine::builder(PairingConfig::production()).build()?;
//! let reaper = ReaperHandle::spawn(engine.clone());
//!
//! let app = api::router(api::AppState::new(engine));
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
//! axum::serve(listener, app).await?;
//!
//! reaper.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod client;
pub mod config;
pub mod core;
pub mod error;
pub mod models;

pub use config::{PairingConfig, ServerConfig};
pub use error::{Error, Result};
pub use models::*;

pub use crate::core::{
    BrowserSessionStore, IdentityDirectory, MemoryStore, PairingEngine, PairingEngineBuilder,
    ReaperHandle, SessionEvent, SqliteStore,
};
pub use client::{PairingApprover, PairingClient, PairingOutcome, PairingRequester};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
