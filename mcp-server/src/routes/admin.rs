//! `/auth/revoke`, `/auth/revoke_all`. Both routes sit behind
//! `auth_and_rbac`, so by the time a handler runs the caller has already
//! been verified and confirmed to hold `system:admin`.

use axum::extract::State;
use axum::Json;
use serde_json::Value;

use mcp_core::error::AppError;

use crate::state::AppState;

#[derive(Debug, serde::Deserialize)]
pub struct RevokeRequest {
    pub token: String,
}

/// Blacklists `token` for the configured token TTL. The exact remaining
/// lifetime of an arbitrary caller-supplied token isn't known without
/// re-deriving its claims, so the blacklist entry uses the platform's
/// configured max TTL as a safe upper bound — at least as long as any token
/// could possibly still be valid for.
pub async fn revoke(State(state): State<AppState>, Json(req): Json<RevokeRequest>) -> Result<Json<Value>, AppError> {
    state.tokens.revoke(&req.token, state.config.auth_token_ttl);
    Ok(Json(serde_json::json!({ "revoked": true })))
}

#[derive(Debug, serde::Deserialize)]
pub struct RevokeAllRequest {
    pub user_id: String,
}

pub async fn revoke_all(
    State(state): State<AppState>,
    Json(req): Json<RevokeAllRequest>,
) -> Result<Json<Value>, AppError> {
    state.tokens.revoke_all_for_user(&req.user_id);
    Ok(Json(serde_json::json!({ "revoked_all_for": req.user_id })))
}
