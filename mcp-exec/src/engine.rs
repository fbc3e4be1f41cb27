//! Ties the pool, sandbox, and opt-in result cache together into the two
//! operations the tool layer calls: running a snippet, and running a test
//! module as a variant of the same execution path.

use std::time::Duration;

use mcp_cache::Cache;
use mcp_core::error::AppError;
use serde::Serialize;

use crate::language::{Entrypoint, Language};
use crate::limits::ResourceLimits;
use crate::pool::ExecutionPool;
use crate::sandbox::{run_sandboxed, ExecStatus, SandboxRequest};

#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    pub workers: usize,
    pub default_timeout: Duration,
    pub max_timeout: Duration,
    pub output_cap: usize,
    pub limits: ResourceLimits,
}

#[derive(Debug, Clone)]
pub struct CodeExecutionRequest {
    pub source: String,
    pub language: String,
    pub timeout: Option<Duration>,
}

#[derive(Debug, Clone)]
pub struct TestRunRequest {
    pub test_source: String,
    pub language: String,
    pub timeout: Option<Duration>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExecutionOutcome {
    pub status: ExecStatus,
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub stdout_truncated: bool,
    pub stderr_truncated: bool,
    pub duration_ms: u128,
    pub cache_hit: bool,
}

pub struct ExecutionEngine {
    pool: ExecutionPool,
    config: ExecutorConfig,
    cache: Option<Cache<ExecutionOutcome>>,
}

impl ExecutionEngine {
    pub fn new(config: ExecutorConfig) -> Self {
        Self {
            pool: ExecutionPool::new(config.workers),
            cache: None,
            config,
        }
    }

    /// Opts into result caching keyed by `code_hash + language + limits`,
    /// since most executions are one-off and not worth the memory by default.
    pub fn with_cache(mut self, capacity: usize, ttl: Duration) -> Self {
        self.cache = Some(Cache::new(capacity, ttl));
        self
    }

    pub async fn execute_code(&self, req: CodeExecutionRequest) -> Result<ExecutionOutcome, AppError> {
        let language = Language::parse(&req.language)
            .ok_or_else(|| AppError::invalid(format!("unsupported language: {}", req.language)))?;
        let timeout = self.clamp_timeout(req.timeout);

        let cache_key = self.cache_key("execute", &req.source, &req.language, timeout);
        if let Some(key) = &cache_key {
            if let Some(mut hit) = self.cache.as_ref().and_then(|c| c.get(key)) {
                hit.cache_hit = true;
                return Ok(hit);
            }
        }

        let _permit = self.pool.acquire().await?;
        let sandbox_req = SandboxRequest {
            source: req.source,
            language,
            entrypoint: Entrypoint::Interpret,
            limits: self.config.limits,
            timeout,
            output_cap: self.config.output_cap,
        };
        let outcome = run_sandboxed(&sandbox_req).await.map_err(AppError::from)?;
        let outcome = to_public_outcome(outcome, false);

        if let (Some(cache), Some(key)) = (&self.cache, cache_key) {
            if matches!(outcome.status, ExecStatus::Success | ExecStatus::NonZeroExit) {
                cache.set(key, outcome.clone(), None);
            }
        }
        Ok(outcome)
    }

    pub async fn run_tests(&self, req: TestRunRequest) -> Result<ExecutionOutcome, AppError> {
        let language = Language::parse(&req.language)
            .ok_or_else(|| AppError::invalid(format!("unsupported language: {}", req.language)))?;
        let timeout = self.clamp_timeout(req.timeout);

        let _permit = self.pool.acquire().await?;
        let sandbox_req = SandboxRequest {
            source: req.test_source,
            language,
            entrypoint: Entrypoint::TestHarness,
            limits: self.config.limits,
            timeout,
            output_cap: self.config.output_cap,
        };
        let outcome = run_sandboxed(&sandbox_req).await.map_err(AppError::from)?;
        Ok(to_public_outcome(outcome, false))
    }

    fn clamp_timeout(&self, requested: Option<Duration>) -> Duration {
        requested
            .unwrap_or(self.config.default_timeout)
            .min(self.config.max_timeout)
    }

    fn cache_key(&self, op: &str, source: &str, language: &str, timeout: Duration) -> Option<String> {
        self.cache.as_ref().map(|_| {
            let name = format!(
                "exec:{op}:{language}:{}:{}",
                timeout.as_millis(),
                self.config.limits.address_space_bytes
            );
            mcp_cache::derive_key(&name, &serde_json::json!(source))
        })
    }
}

fn to_public_outcome(outcome: crate::sandbox::SandboxOutcome, cache_hit: bool) -> ExecutionOutcome {
    ExecutionOutcome {
        status: outcome.status,
        exit_code: outcome.exit_code,
        stdout: String::from_utf8_lossy(&outcome.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&outcome.stderr).into_owned(),
        stdout_truncated: outcome.stdout_truncated,
        stderr_truncated: outcome.stderr_truncated,
        duration_ms: outcome.duration.as_millis(),
        cache_hit,
    }
}
