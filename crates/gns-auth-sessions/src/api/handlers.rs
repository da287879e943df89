//! Route handlers for the pairing API.

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::Json;
use serde_json::{json, Value};

use super::error::ApiJson;
use super::middleware::{BrowserSession, IdentityPublicKey};
use super::state::AppState;
use crate::error::{Error, Result};
use crate::models::*;

/// GET /health
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".into(),
        active_sessions: state.engine.active_sessions(),
    })
}

/// POST /auth/sessions/request
///
/// The body is optional; `requesterInfo` falls back to the `User-Agent`.
pub async fn request_session(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<RequestSessionResponse>)> {
    let params: RequestSessionParams = if body.iter().all(u8::is_ascii_whitespace) {
        RequestSessionParams::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| Error::invalid_input(format!("Invalid request body: {e}")))?
    };

    let requester_info = params.requester_info.or_else(|| {
        headers
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    });

    let response = state.engine.request_session(requester_info.as_deref())?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// GET /auth/sessions/{id}
pub async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<SessionView>> {
    Ok(Json(state.engine.get_session_status(&session_id).await?))
}

/// POST /auth/sessions/approve
pub async fn approve_session(
    State(state): State<AppState>,
    ApiJson(params): ApiJson<ApproveSessionParams>,
) -> Result<Json<ApproveSessionResponse>> {
    let view = state.engine.approve_session(params).await?;

    let approver_info = view
        .approver_info()
        .ok_or_else(|| Error::Internal("approved session without approver".into()))?;
    let approved_at = view
        .approved_at
        .ok_or_else(|| Error::Internal("approved session without timestamp".into()))?;

    Ok(Json(ApproveSessionResponse {
        messages_synced: view.messages_synced(),
        session_id: view.session_id,
        approver_info,
        approved_at,
    }))
}

/// POST /auth/sessions/reject
pub async fn reject_session(
    State(state): State<AppState>,
    ApiJson(params): ApiJson<RejectSessionParams>,
) -> Result<Json<Value>> {
    state.engine.reject_session(params).await?;
    Ok(Json(json!({})))
}

/// POST /auth/sessions/{id}/cancel
pub async fn cancel_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    ApiJson(params): ApiJson<CancelSessionParams>,
) -> Result<Json<Value>> {
    state.engine.cancel_session(&session_id, params).await?;
    Ok(Json(json!({})))
}

/// DELETE /auth/sessions/{token}
///
/// Possession of the token is the authorization.
pub async fn revoke_session(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Json<Value>> {
    state.engine.revoke_browser_session(&token).await?;
    Ok(Json(json!({})))
}

/// GET /auth/sessions
pub async fn list_sessions(
    State(state): State<AppState>,
    IdentityPublicKey(public_key): IdentityPublicKey,
) -> Result<Json<Vec<BrowserSessionSummary>>> {
    Ok(Json(state.engine.list_browser_sessions(&public_key).await?))
}

/// POST /auth/sessions/revoke-all
pub async fn revoke_all_sessions(
    State(state): State<AppState>,
    IdentityPublicKey(public_key): IdentityPublicKey,
) -> Result<Json<RevokeAllResponse>> {
    let revoked_count = state.engine.revoke_all_browser_sessions(&public_key).await?;
    Ok(Json(RevokeAllResponse { revoked_count }))
}

/// GET /auth/me
pub async fn me(BrowserSession(session): BrowserSession) -> Json<AuthenticatedIdentity> {
    Json(AuthenticatedIdentity::from(&session))
}
