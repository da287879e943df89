//! Identity extractors for authenticated calls.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use super::state::AppState;
use crate::error::Error;
use crate::models::PersistedBrowserSession;

/// Header carrying an issued browser session token.
pub const SESSION_HEADER: &str = "x-identity-session";

/// Header naming the identity whose sessions are managed.
pub const PUBLIC_KEY_HEADER: &str = "x-identity-publickey";

/// Browser session resolved from `X-Identity-Session`.
///
/// ```ignore
/// async fn handler(BrowserSession(session): BrowserSession) -> Json<String> {
///     Json(session.approver_public_key)
/// }
/// ```
#[derive(Debug, Clone)]
pub struct BrowserSession(pub PersistedBrowserSession);

impl FromRequestParts<AppState> for BrowserSession {
    type Rejection = Error;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = header(parts, SESSION_HEADER)
            .ok_or_else(|| Error::unauthorized("Missing X-Identity-Session header"))?;
        let session = state.engine.authenticate(&token).await?;
        Ok(BrowserSession(session))
    }
}

/// Identity public key from `X-Identity-PublicKey`.
#[derive(Debug, Clone)]
pub struct IdentityPublicKey(pub String);

impl FromRequestParts<AppState> for IdentityPublicKey {
    type Rejection = Error;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        header(parts, PUBLIC_KEY_HEADER)
            .map(IdentityPublicKey)
            .ok_or_else(|| Error::unauthorized("Missing X-Identity-PublicKey header"))
    }
}

fn header(parts: &Parts, name: &str) -> Option<String> {
    parts
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
