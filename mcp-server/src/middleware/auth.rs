//! Authentication + authorization. A single pair of functions backs both
//! transports: the axum middleware below calls them for every protected
//! HTTP route, and `mcp_transport` calls the same two functions for the
//! tool calls that need a bearer token over MCP.
//!
//! Verification failure never falls back to an implicit role. A caller that
//! treats failure as viewer is a bug; missing or invalid credentials always
//! return `Unauthenticated`, never a default permission set.

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use mcp_auth::role::Permission;
use mcp_auth::{allow, Role};
use mcp_core::correlation::RequestId;
use mcp_core::error::AppError;
use mcp_audit::{AuditEvent, AuditLog, EventType};
use http::header::AUTHORIZATION;

use crate::permissions::permission_for_path;
use crate::state::AppState;

#[derive(Debug, Clone)]
pub struct AuthContext {
    pub subject: String,
    pub roles: Vec<Role>,
}

fn extract_bearer(headers: &http::HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Verifies a raw bearer token string. Shared by the HTTP middleware (token
/// comes from the `Authorization` header) and the MCP handler (token comes
/// from the tool call's `bearer_token` argument).
pub async fn authenticate(state: &AppState, request_id: &str, token: &str) -> Result<AuthContext, AppError> {
    match state.tokens.verify(token) {
        Ok(verified) => Ok(AuthContext {
            subject: verified.subject,
            roles: verified.roles,
        }),
        Err(err) => {
            record(
                state,
                AuditEvent::new(EventType::AuthFailure, request_id.to_string())
                    .with_attribute("reason", err.to_string()),
            )
            .await;
            Err(AppError::Unauthenticated(err.to_string()))
        }
    }
}

/// Checks `ctx` against `permission`, auditing a denial.
pub async fn authorize(
    state: &AppState,
    request_id: &str,
    ctx: &AuthContext,
    permission: Permission,
) -> Result<(), AppError> {
    if allow(&ctx.roles, permission) {
        Ok(())
    } else {
        record(
            state,
            AuditEvent::new(EventType::AuthzDenied, request_id.to_string())
                .with_user(ctx.subject.clone())
                .with_attribute("permission", format!("{permission:?}")),
        )
        .await;
        Err(AppError::PermissionDenied(
            "caller does not hold the required permission".to_string(),
        ))
    }
}

async fn record(state: &AppState, event: AuditEvent) {
    let _ = AuditLog::new(&state.graph).record(event).await;
}

/// The pipeline's authentication + authorization stage, applied only to
/// routes that require a permission. The required permission for each such
/// route comes from [`permission_for_path`].
pub async fn auth_and_rbac(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let request_id = req
        .extensions()
        .get::<RequestId>()
        .map(|r| r.as_str().to_string())
        .unwrap_or_default();
    let path = req.uri().path().to_string();

    let token = match extract_bearer(req.headers()) {
        Some(t) => t.to_string(),
        None => {
            record(
                &state,
                AuditEvent::new(EventType::AuthFailure, request_id.clone())
                    .with_attribute("reason", "missing bearer token"),
            )
            .await;
            return AppError::Unauthenticated("missing bearer token".to_string()).into_response();
        }
    };

    let ctx = match authenticate(&state, &request_id, &token).await {
        Ok(ctx) => ctx,
        Err(err) => return err.into_response(),
    };

    if let Some(permission) = permission_for_path(&path) {
        if let Err(err) = authorize(&state, &request_id, &ctx, permission).await {
            return err.into_response();
        }
    }

    req.extensions_mut().insert(ctx);
    next.run(req).await
}
