use axum::extract::{Extension, State};
use axum::Json;
use serde_json::Value;

use mcp_core::correlation::RequestId;
use mcp_core::error::AppError;

use crate::middleware::AuthContext;
use crate::ops;
use crate::state::AppState;

pub async fn graph_upsert(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Extension(ctx): Extension<AuthContext>,
    Json(req): Json<ops::GraphUpsertRequest>,
) -> Result<Json<Value>, AppError> {
    Ok(Json(
        ops::graph_upsert(&state, request_id.as_str(), req, Some(&ctx.subject)).await?,
    ))
}

pub async fn graph_query(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Json(req): Json<ops::GraphQueryRequest>,
) -> Result<Json<Value>, AppError> {
    Ok(Json(ops::graph_query(&state, request_id.as_str(), req).await?))
}
