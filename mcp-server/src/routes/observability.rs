use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::Json;
use http::header::CONTENT_TYPE;
use http::HeaderValue;

use crate::state::AppState;

pub async fn health(State(state): State<AppState>) -> Response {
    let aggregate = state.health.check().await;
    let status = match aggregate.status {
        mcp_core::health::HealthStatus::Up => http::StatusCode::OK,
        mcp_core::health::HealthStatus::Degraded => http::StatusCode::OK,
        mcp_core::health::HealthStatus::Down => http::StatusCode::SERVICE_UNAVAILABLE,
    };
    (status, Json(aggregate)).into_response()
}

pub async fn metrics(State(_state): State<AppState>) -> Response {
    let body = mcp_core::metrics::render();
    let mut response = body.into_response();
    response.headers_mut().insert(
        CONTENT_TYPE,
        HeaderValue::from_static("text/plain; version=0.0.4"),
    );
    response
}
