use axum::extract::{Path, State};
use axum::Json;
use serde_json::Value;

use mcp_core::error::AppError;

use crate::ops;
use crate::state::AppState;

pub async fn list_prompts(State(state): State<AppState>) -> Json<Value> {
    Json(ops::list_prompts(&state))
}

pub async fn get_prompt(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let prompt = ops::get_prompt(&state, &id)?;
    Ok(Json(serde_json::to_value(prompt).expect("Prompt always serializes")))
}
