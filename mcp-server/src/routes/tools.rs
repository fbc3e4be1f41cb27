use axum::extract::{Extension, State};
use axum::Json;
use serde_json::Value;

use mcp_core::correlation::RequestId;
use mcp_core::error::AppError;

use crate::middleware::AuthContext;
use crate::ops;
use crate::state::AppState;

pub async fn lint_code(
    State(state): State<AppState>,
    Json(req): Json<ops::LintRequest>,
) -> Result<Json<Value>, AppError> {
    Ok(Json(ops::lint_code(&state, req).await?))
}

pub async fn execute_code(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Extension(ctx): Extension<AuthContext>,
    Json(req): Json<ops::ExecuteRequest>,
) -> Result<Json<Value>, AppError> {
    Ok(Json(
        ops::execute_code(&state, request_id.as_str(), req, Some(&ctx.subject)).await?,
    ))
}

pub async fn run_tests(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Extension(ctx): Extension<AuthContext>,
    Json(req): Json<ops::RunTestsRequest>,
) -> Result<Json<Value>, AppError> {
    Ok(Json(
        ops::run_tests(&state, request_id.as_str(), req, Some(&ctx.subject)).await?,
    ))
}

pub async fn generate_code(
    State(state): State<AppState>,
    Json(req): Json<ops::GenerateRequest>,
) -> Result<Json<Value>, AppError> {
    Ok(Json(ops::generate_code(&state, req).await?))
}
