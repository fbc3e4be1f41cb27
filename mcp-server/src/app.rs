//! Assembles the full axum app: the route table from [`crate::routes`], the
//! MCP streaming-HTTP mount from [`crate::mcp_transport`], and the ordered
//! global middleware stack:
//!
//! 1. correlation id
//! 2. metrics (ambient, carried regardless of any Non-goal)
//! 3. body size limit
//! 4. CORS
//! 5. secure headers
//!
//! Authentication, authorization, and rate limiting are route-local layers
//! applied inside [`crate::routes`], since they differ per route rather
//! than applying uniformly.

use axum::http::HeaderValue;
use axum::middleware::from_fn;
use axum::Router;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;

use mcp_core::correlation::correlation_id_layer;
use mcp_core::secure_headers::secure_headers_layer;

use crate::state::AppState;

const BODY_LIMIT_BYTES: usize = 1024 * 1024;

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods([http::Method::GET, http::Method::POST])
        .allow_headers([http::header::AUTHORIZATION, http::header::CONTENT_TYPE])
}

pub fn build(state: AppState) -> Router {
    let cors = cors_layer(&state.config.allowed_origins);

    crate::routes::build(state.clone())
        .merge(crate::mcp_transport::router(state))
        .layer(from_fn(secure_headers_layer))
        .layer(cors)
        .layer(RequestBodyLimitLayer::new(BODY_LIMIT_BYTES))
        .layer(from_fn(mcp_core::metrics::metrics_layer))
        .layer(from_fn(correlation_id_layer))
}
