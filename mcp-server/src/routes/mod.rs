pub mod admin;
pub mod graph;
pub mod observability;
pub mod prompts;
pub mod tools;

use axum::routing::{get, post};
use axum::Router;

use crate::middleware::{auth_and_rbac, rate_limit_layer};
use crate::state::AppState;

/// Builds the full HTTP surface. Protected routes get `auth_and_rbac` as a
/// route-local layer; public routes (including `/lint_code` and
/// `/graph_query`, which are public despite naming a `Permission` — see
/// `permissions.rs`) skip it entirely. Rate limiting applies to both, with
/// authenticated callers falling through to the per-route auth context and
/// anonymous callers falling back to their client address.
pub fn build(state: AppState) -> Router {
    let protected = Router::new()
        .route("/execute_code", post(tools::execute_code))
        .route("/run_tests", post(tools::run_tests))
        .route("/generate_code", post(tools::generate_code))
        .route("/graph_upsert", post(graph::graph_upsert))
        .route("/auth/revoke", post(admin::revoke))
        .route("/auth/revoke_all", post(admin::revoke_all))
        .route_layer(axum::middleware::from_fn_with_state(state.clone(), rate_limit_layer))
        .route_layer(axum::middleware::from_fn_with_state(state.clone(), auth_and_rbac));

    let public = Router::new()
        .route("/health", get(observability::health))
        .route("/metrics", get(observability::metrics))
        .route("/prompts", get(prompts::list_prompts))
        .route("/prompts/{id}", get(prompts::get_prompt))
        .route("/lint_code", post(tools::lint_code))
        .route("/graph_query", post(graph::graph_query))
        .route_layer(axum::middleware::from_fn_with_state(state.clone(), rate_limit_layer));

    Router::new().merge(protected).merge(public).with_state(state)
}
