//! Process entry point. Loads configuration, wires every component crate
//! into one [`state::AppState`], applies the graph schema, and serves the
//! combined HTTP + MCP router until a shutdown signal arrives.

mod app;
mod mcp_transport;
mod middleware;
mod ops;
mod permissions;
mod persist;
mod prompts;
mod routes;
mod schema;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;

use mcp_auth::{RevocationStore, TokenService};
use mcp_core::config::{AppConfig, ConfigError};
use mcp_core::health::HealthRegistry;
use mcp_exec::{ExecutionEngine, ExecutorConfig, ResourceLimits};
use mcp_graph::{GraphClient, GraphClientConfig};
use mcp_ratelimit::{Limits, RateLimiter};
use tokio_util::sync::CancellationToken;

use crate::state::{AppState, GraphHealthIndicator, Inner};

/// Process exit codes: 0 success (never reached, the server runs until
/// signalled), 2 invalid arguments, 3 dependency unavailable, 4 configuration
/// rejected, 1 unspecified failure.
const EXIT_INVALID_ARGS: i32 = 2;
const EXIT_DEPENDENCY_UNAVAILABLE: i32 = 3;
const EXIT_CONFIG_REJECTED: i32 = 4;
const EXIT_UNSPECIFIED: i32 = 1;

fn fail(code: i32, message: impl std::fmt::Display) -> ! {
    eprintln!("mcp-server: {message}");
    std::process::exit(code);
}

#[tokio::main]
async fn main() {
    let config = match AppConfig::load() {
        Ok(c) => c,
        Err(ConfigError::Missing(_)) | Err(ConfigError::Invalid { .. }) => {
            fail(EXIT_INVALID_ARGS, "configuration rejected (see stderr above)")
        }
        Err(err @ ConfigError::WeakSigningKey(_)) => fail(EXIT_CONFIG_REJECTED, err),
    };

    mcp_core::logging::init(&config.log_level, config.log_format);

    let graph_config = GraphClientConfig {
        uri: config.graph_uri.clone(),
        user: config.graph_user.clone(),
        password: config.graph_password.clone(),
        database: config.graph_database.clone(),
        pool_max: config.pool_max,
        acquire_timeout: config.pool_acquire_timeout,
        query_timeout: config.exec_timeout_max,
        cache_capacity: config.cache_capacity,
        cache_ttl: config.cache_ttl,
        read_breaker: mcp_breaker::BreakerConfig {
            failure_threshold: config.breaker_read_failures,
            success_threshold: config.breaker_read_successes,
            open_timeout: config.breaker_read_timeout,
            half_open_max: config.breaker_read_successes as usize,
        },
        write_breaker: mcp_breaker::BreakerConfig {
            failure_threshold: config.breaker_write_failures,
            success_threshold: config.breaker_write_successes,
            open_timeout: config.breaker_write_timeout,
            half_open_max: config.breaker_write_successes as usize,
        },
    };

    let graph = match GraphClient::connect(&graph_config).await {
        Ok(g) => Arc::new(g),
        Err(err) => fail(EXIT_DEPENDENCY_UNAVAILABLE, err),
    };

    if let Err(err) = schema::apply(&graph).await {
        fail(EXIT_DEPENDENCY_UNAVAILABLE, err);
    }

    let exec = ExecutionEngine::new(ExecutorConfig {
        workers: config.exec_workers,
        default_timeout: config.exec_timeout_max,
        max_timeout: config.exec_timeout_max,
        output_cap: config.exec_output_bytes,
        limits: ResourceLimits {
            address_space_bytes: config.exec_mem_bytes,
            ..ResourceLimits::default()
        },
    })
    .with_cache(config.cache_capacity, config.cache_ttl);

    let revocation = Arc::new(RevocationStore::new());
    let tokens = TokenService::new(&config.auth_signing_key, revocation.clone());
    let revocation_for_sweep = revocation.clone();

    let rate_limiter = RateLimiter::new(Limits {
        per_minute: config.rate_limit_per_minute,
        per_hour: config.rate_limit_per_hour,
        per_day: config.rate_limit_per_day,
        burst: config.rate_limit_burst,
    });

    let mut health = HealthRegistry::new();
    health.register(Arc::new(GraphHealthIndicator(graph.clone())));

    let state = AppState::new(Inner {
        config: config.clone(),
        graph,
        exec,
        tokens,
        revocation,
        rate_limiter,
        health,
        prompts: prompts::PromptRegistry::seeded(),
    });

    let app = app::build(state);

    let addr: SocketAddr = match format!("{}:{}", config.bind_addr, config.port).parse() {
        Ok(a) => a,
        Err(err) => fail(EXIT_INVALID_ARGS, format!("invalid BIND_ADDR/PORT: {err}")),
    };

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(err) => fail(EXIT_DEPENDENCY_UNAVAILABLE, format!("could not bind {addr}: {err}")),
    };

    tracing::info!(%addr, "mcp-server listening");

    let shutdown_token = CancellationToken::new();
    mcp_core::shutdown::spawn_shutdown_watcher(shutdown_token.clone());
    spawn_revocation_sweeper(revocation_for_sweep, shutdown_token.clone());

    let result = axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(async move { shutdown_token.cancelled().await })
        .await;

    if let Err(err) = result {
        fail(EXIT_UNSPECIFIED, err);
    }
}

/// Mirrors [`mcp_cache::spawn_sweeper`] for the token blacklist: periodically
/// drops blacklist rows whose expiry has passed.
fn spawn_revocation_sweeper(revocation: Arc<RevocationStore>, token: CancellationToken) {
    const SWEEP_INTERVAL: std::time::Duration = std::time::Duration::from_secs(60);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
        loop {
            tokio::select! {
                _ = ticker.tick() => revocation.sweep_expired(),
                _ = token.cancelled() => break,
            }
        }
    });
}
