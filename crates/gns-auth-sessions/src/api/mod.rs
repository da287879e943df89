//! HTTP/WebSocket surface of the pairing service.
//!
//! | Method | Path                           | Auth                  |
//! |--------|--------------------------------|-----------------------|
//! | GET    | `/health`                      | none                  |
//! | POST   | `/auth/sessions/request`       | none                  |
//! | GET    | `/auth/sessions/{id}`          | none                  |
//! | GET    | `/auth/sessions/{id}/ws`       | none                  |
//! | POST   | `/auth/sessions/{id}/cancel`   | cancel token          |
//! | POST   | `/auth/sessions/approve`       | signature             |
//! | POST   | `/auth/sessions/reject`        | signature             |
//! | DELETE | `/auth/sessions/{token}`       | session token         |
//! | GET    | `/auth/sessions`               | `X-Identity-PublicKey`|
//! | POST   | `/auth/sessions/revoke-all`    | `X-Identity-PublicKey`|
//! | GET    | `/auth/me`                     | `X-Identity-Session`  |

pub mod error;
pub mod handlers;
pub mod middleware;
pub mod state;
pub mod ws;

use axum::routing::{get, post};
use axum::Router;

pub use error::ApiJson;
pub use middleware::{BrowserSession, IdentityPublicKey, PUBLIC_KEY_HEADER, SESSION_HEADER};
pub use state::AppState;

/// Build the router with all pairing routes bound to `state`.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/auth/me", get(handlers::me))
        .route("/auth/sessions", get(handlers::list_sessions))
        .route("/auth/sessions/request", post(handlers::request_session))
        .route("/auth/sessions/approve", post(handlers::approve_session))
        .route("/auth/sessions/reject", post(handlers::reject_session))
        .route("/auth/sessions/revoke-all", post(handlers::revoke_all_sessions))
        .route(
            "/auth/sessions/{id}",
            get(handlers::get_session).delete(handlers::revoke_session),
        )
        .route("/auth/sessions/{id}/cancel", post(handlers::cancel_session))
        .route("/auth/sessions/{id}/ws", get(ws::ws_handler))
        .with_state(state)
}
