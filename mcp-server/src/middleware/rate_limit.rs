//! Rate limiting. Applies to every route, authenticated or not: a caller
//! with a verified identity is charged by user id, everyone else by client
//! address, via [`mcp_ratelimit::limiter_key`].

use axum::extract::{ConnectInfo, Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use std::net::SocketAddr;

use mcp_audit::{AuditEvent, AuditLog, EventType};
use mcp_core::correlation::RequestId;
use mcp_core::error::AppError;

use crate::middleware::auth::AuthContext;
use crate::state::AppState;

pub async fn rate_limit_layer(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let request_id = req
        .extensions()
        .get::<RequestId>()
        .map(|r| r.as_str().to_string())
        .unwrap_or_default();

    let ctx = req.extensions().get::<AuthContext>().cloned();
    let client_addr = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|c| c.0.to_string())
        .unwrap_or_else(|| "unknown".to_string());

    let key = mcp_ratelimit::limiter_key(ctx.as_ref().map(|c| c.subject.as_str()), &client_addr);
    let roles: Vec<String> = ctx
        .as_ref()
        .map(|c| c.roles.iter().map(|r| r.to_string()).collect())
        .unwrap_or_default();

    match state.rate_limiter.charge(&key, &roles) {
        Ok(()) => next.run(req).await,
        Err(limited) => {
            let _ = AuditLog::new(&state.graph)
                .record(
                    AuditEvent::new(EventType::RateLimited, request_id)
                        .with_attribute("key", key)
                        .with_attribute("retry_after_secs", limited.retry_after_secs),
                )
                .await;
            AppError::RateLimited {
                retry_after_secs: limited.retry_after_secs,
            }
            .into_response()
        }
    }
}
