//! Shared process state. One instance is built in `main` and cloned (behind
//! `Arc`) into every handler.

use std::sync::Arc;

use mcp_auth::{RevocationStore, TokenService};
use mcp_core::config::AppConfig;
use mcp_core::health::HealthRegistry;
use mcp_exec::ExecutionEngine;
use mcp_graph::GraphClient;
use mcp_ratelimit::RateLimiter;

use crate::prompts::PromptRegistry;

pub struct Inner {
    pub config: AppConfig,
    pub graph: Arc<GraphClient>,
    pub exec: ExecutionEngine,
    pub tokens: TokenService,
    pub revocation: Arc<RevocationStore>,
    pub rate_limiter: RateLimiter,
    pub health: HealthRegistry,
    pub prompts: PromptRegistry,
}

#[derive(Clone)]
pub struct AppState(pub Arc<Inner>);

impl std::ops::Deref for AppState {
    type Target = Inner;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AppState {
    pub fn new(inner: Inner) -> Self {
        Self(Arc::new(inner))
    }
}

/// Reports graph-driver liveness to [`HealthRegistry`]. Built from the same
/// `Arc<GraphClient>` that ends up in `Inner`, so it exists independently of
/// `AppState` and sidesteps the chicken-and-egg of a registry that would
/// otherwise need to live inside the state it reports on.
pub struct GraphHealthIndicator(pub Arc<GraphClient>);

#[async_trait::async_trait]
impl mcp_core::health::HealthIndicator for GraphHealthIndicator {
    fn name(&self) -> &str {
        "graph"
    }

    async fn check(&self) -> mcp_core::health::HealthStatus {
        if self.0.health().await {
            mcp_core::health::HealthStatus::Up
        } else {
            mcp_core::health::HealthStatus::Down
        }
    }
}
