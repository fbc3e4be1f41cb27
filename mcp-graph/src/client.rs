use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use mcp_breaker::{BreakerCallError, BreakerConfig, BreakerPair, CircuitBreaker};
use mcp_cache::Cache;
use mcp_core::error::AppError;
use neo4rs::{ConfigBuilder, Graph, Query};
use serde_json::{Map, Value};

use crate::retry::with_retry;
use crate::row::row_to_json;

#[derive(Debug, Clone)]
pub struct GraphClientConfig {
    pub uri: String,
    pub user: String,
    pub password: String,
    pub database: String,
    pub pool_max: usize,
    pub acquire_timeout: Duration,
    pub query_timeout: Duration,
    pub cache_capacity: usize,
    pub cache_ttl: Duration,

    pub read_breaker: BreakerConfig,
    pub write_breaker: BreakerConfig,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct GraphMetrics {
    pub reads: u64,
    pub writes: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
}

/// Pooled async driver wrapper with retry, a circuit breaker per direction,
/// and a cache on the read path.
pub struct GraphClient {
    graph: Graph,
    breakers: BreakerPair,
    cache: Cache<Vec<Map<String, Value>>>,
    label_version: AtomicU64,
    query_timeout: Duration,
    reads: AtomicU64,
    writes: AtomicU64,
}

impl GraphClient {
    pub async fn connect(config: &GraphClientConfig) -> Result<Self, AppError> {
        let neo_config = ConfigBuilder::default()
            .uri(&config.uri)
            .user(&config.user)
            .password(&config.password)
            .db(config.database.clone())
            .max_connections(config.pool_max)
            .build()
            .map_err(|e| AppError::Internal(format!("invalid graph driver config: {e}")))?;

        let graph = tokio::time::timeout(config.acquire_timeout, Graph::connect(neo_config))
            .await
            .map_err(|_| AppError::DependencyUnavailable("graph connection pool".to_string()))?
            .map_err(|e| AppError::DependencyUnavailable(format!("graph connect failed: {e}")))?;

        Ok(Self {
            graph,
            breakers: BreakerPair::new("graph", config.read_breaker, config.write_breaker),
            cache: Cache::new(config.cache_capacity, config.cache_ttl),
            label_version: AtomicU64::new(0),
            query_timeout: config.query_timeout,
            reads: AtomicU64::new(0),
            writes: AtomicU64::new(0),
        })
    }

    pub fn read_breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breakers.read
    }

    pub fn write_breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breakers.write
    }

    fn cache_key(&self, query: &str, params: &HashMap<String, Value>) -> String {
        let version = self.label_version.load(Ordering::Acquire);
        let normalized = query.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase();
        format!("v{version}:{}", mcp_cache::derive_key(&normalized, &serde_json::json!(params)))
    }

    /// Runs a read query and returns its rows. `cacheable` marks queries with
    /// no time/random functions and no `CALL`, the only ones the read path
    /// may serve from cache.
    pub async fn execute_read(
        &self,
        query: &str,
        params: HashMap<String, Value>,
        cacheable: bool,
    ) -> Result<Vec<Map<String, Value>>, AppError> {
        let key = self.cache_key(query, &params);
        if cacheable {
            if let Some(rows) = self.cache.get(&key) {
                return Ok(rows);
            }
        }

        let query_text = query.to_string();
        let result = self
            .breakers
            .read
            .call(
                |err: &neo4rs::Error| is_hard_failure(err),
                || self.run_read(&query_text, params.clone()),
            )
            .await;

        self.reads.fetch_add(1, Ordering::Relaxed);

        let rows = match result {
            Ok(rows) => rows,
            Err(BreakerCallError::Unavailable(e)) => {
                return Err(AppError::DependencyUnavailable(e.to_string()))
            }
            Err(BreakerCallError::Inner(e)) => return Err(classify(e)),
        };

        if cacheable {
            self.cache.set(key, rows.clone(), None);
        }
        Ok(rows)
    }

    async fn run_read(
        &self,
        query: &str,
        params: HashMap<String, Value>,
    ) -> Result<Vec<Map<String, Value>>, neo4rs::Error> {
        let timeout = self.query_timeout;
        with_retry(|| {
            let query = build_query(query, &params);
            let timeout = timeout;
            async move {
                let fut = async {
                    let mut stream = self.graph.execute(query).await?;
                    let mut rows = Vec::new();
                    while let Some(row) = stream.next().await? {
                        rows.push(row_to_json(&row));
                    }
                    Ok(rows)
                };
                tokio::time::timeout(timeout, fut)
                    .await
                    .unwrap_or_else(|_| Err(neo4rs::Error::UnexpectedMessage("query timed out".into())))
            }
        })
        .await
    }

    /// Runs a write query. Invalidates the caller-specified label prefix so
    /// stale reads aren't served.
    pub async fn execute_write(
        &self,
        query: &str,
        params: HashMap<String, Value>,
        invalidates_label: Option<&str>,
    ) -> Result<(), AppError> {
        let query_text = query.to_string();
        let result = self
            .breakers
            .write
            .call(
                |err: &neo4rs::Error| is_hard_failure(err),
                || self.run_write(&query_text, params.clone()),
            )
            .await;

        self.writes.fetch_add(1, Ordering::Relaxed);

        match result {
            Ok(()) => {
                if invalidates_label.is_some() {
                    self.label_version.fetch_add(1, Ordering::AcqRel);
                }
                Ok(())
            }
            Err(BreakerCallError::Unavailable(e)) => Err(AppError::DependencyUnavailable(e.to_string())),
            Err(BreakerCallError::Inner(e)) => Err(classify(e)),
        }
    }

    async fn run_write(&self, query: &str, params: HashMap<String, Value>) -> Result<(), neo4rs::Error> {
        with_retry(|| {
            let query = build_query(query, &params);
            async move {
                self.graph.run(query).await
            }
        })
        .await
    }

    /// One round-trip spanning multiple statements, issued in order within a
    /// single transaction; used by the graph tool to upsert every node before
    /// any relationship.
    pub async fn execute_write_tx(
        &self,
        statements: Vec<(String, HashMap<String, Value>)>,
    ) -> Result<(), AppError> {
        let result = self
            .breakers
            .write
            .call(
                |err: &neo4rs::Error| is_hard_failure(err),
                || self.run_write_tx(statements.clone()),
            )
            .await;

        self.writes.fetch_add(1, Ordering::Relaxed);

        match result {
            Ok(()) => {
                self.label_version.fetch_add(1, Ordering::AcqRel);
                Ok(())
            }
            Err(BreakerCallError::Unavailable(e)) => Err(AppError::DependencyUnavailable(e.to_string())),
            Err(BreakerCallError::Inner(e)) => Err(classify(e)),
        }
    }

    async fn run_write_tx(&self, statements: Vec<(String, HashMap<String, Value>)>) -> Result<(), neo4rs::Error> {
        with_retry(|| {
            let statements = statements.clone();
            async move {
                let mut txn = self.graph.start_txn().await?;
                for (query, params) in &statements {
                    txn.run(build_query(query, params)).await?;
                }
                txn.commit().await
            }
        })
        .await
    }

    pub async fn health(&self) -> bool {
        self.graph
            .execute(Query::new("RETURN 1".to_string()))
            .await
            .is_ok()
    }

    pub fn metrics(&self) -> GraphMetrics {
        let (hits, misses, _, _) = self.cache.stats.snapshot();
        GraphMetrics {
            reads: self.reads.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
            cache_hits: hits,
            cache_misses: misses,
        }
    }
}

fn build_query(text: &str, params: &HashMap<String, Value>) -> Query {
    let mut query = Query::new(text.to_string());
    for (key, value) in params {
        query = query.param(key, value.clone());
    }
    query
}

/// A failure trips the breaker unless it is a validation/constraint/auth/
/// syntax error — those are the caller's fault, not the dependency's.
fn is_hard_failure(err: &neo4rs::Error) -> bool {
    !is_user_error(err)
}

fn is_user_error(err: &neo4rs::Error) -> bool {
    let lower = err.to_string().to_lowercase();
    ["constraint", "syntax", "auth", "unauthorized"]
        .iter()
        .any(|m| lower.contains(m))
}

fn classify(err: neo4rs::Error) -> AppError {
    let text = err.to_string();
    let lower = text.to_lowercase();
    if lower.contains("constraint") {
        AppError::Conflict(text)
    } else if lower.contains("syntax") {
        AppError::invalid(text)
    } else if lower.contains("auth") {
        AppError::Unauthenticated(text)
    } else {
        AppError::Internal(text)
    }
}
