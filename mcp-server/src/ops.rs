//! One function per tool, called identically by the HTTP routes and by the
//! MCP `call_tool` dispatch, so there is exactly one place each tool's
//! validation and persistence lives.

use std::collections::HashMap;

use mcp_audit::{AuditEvent, AuditLog, EventType};
use mcp_core::error::AppError;
use mcp_exec::{CodeExecutionRequest, ExecutionOutcome, TestRunRequest};
use mcp_tools::{GraphNode, GraphRelationship};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use crate::persist;
use crate::prompts::Prompt;
use crate::state::AppState;

fn sha256_hex(input: &str) -> String {
    hex::encode(Sha256::digest(input.as_bytes()))
}

fn exec_response(outcome: &ExecutionOutcome) -> Value {
    serde_json::json!({
        "status": outcome.status,
        "return_code": outcome.exit_code.unwrap_or(-1),
        "stdout": outcome.stdout,
        "stderr": outcome.stderr,
        "truncated": outcome.stdout_truncated || outcome.stderr_truncated,
        "duration_ms": outcome.duration_ms,
        "cache_hit": outcome.cache_hit,
    })
}

async fn record(state: &AppState, _request_id: &str, event: AuditEvent, user_id: Option<&str>) {
    let event = match user_id {
        Some(id) => event.with_user(id),
        None => event,
    };
    let _ = AuditLog::new(&state.graph).record(event).await;
}

#[derive(Debug, serde::Deserialize)]
pub struct LintRequest {
    pub source: String,
    pub language: String,
    pub analyzer: Option<String>,
}

pub async fn lint_code(state: &AppState, req: LintRequest) -> Result<Value, AppError> {
    let mut artifact = mcp_tools::analyze_structure(&req.source, &req.language)?;
    if let Some(analyzer) = req.analyzer.as_deref() {
        let dir = tempfile::tempdir().map_err(|e| AppError::Internal(e.to_string()))?;
        let path = dir.path().join("source");
        std::fs::write(&path, &req.source).map_err(|e| AppError::Internal(e.to_string()))?;
        if let Some((code, output)) = mcp_tools::run_external_analyzer(analyzer, &path).await {
            artifact.analyzer_exit_code = code;
            artifact.analyzer_output = Some(output);
        }
    }
    persist::persist_lint(&state.graph, &artifact).await?;
    Ok(serde_json::to_value(artifact).expect("LintArtifact always serializes"))
}

#[derive(Debug, serde::Deserialize)]
pub struct ExecuteRequest {
    pub source: String,
    pub language: String,
    pub timeout_seconds: Option<u64>,
}

pub async fn execute_code(
    state: &AppState,
    request_id: &str,
    req: ExecuteRequest,
    user_id: Option<&str>,
) -> Result<Value, AppError> {
    let lang = mcp_validate::Language::parse(&req.language)
        .ok_or_else(|| AppError::invalid(format!("unsupported language: {}", req.language)))?;
    if let Err(err) = mcp_validate::validate_code(&req.source, lang, false) {
        record(
            state,
            request_id,
            AuditEvent::new(EventType::SecurityViolation, request_id.to_string())
                .with_attribute("reason", err.to_string()),
            user_id,
        )
        .await;
        return Err(err);
    }

    let code_hash = mcp_tools::code_hash(&req.source);
    let outcome = state
        .exec
        .execute_code(CodeExecutionRequest {
            source: req.source,
            language: req.language.clone(),
            timeout: req.timeout_seconds.map(std::time::Duration::from_secs),
        })
        .await?;

    persist::persist_execution(&state.graph, &code_hash, &req.language, &outcome).await?;
    record(
        state,
        request_id,
        AuditEvent::new(EventType::CodeExec, request_id.to_string())
            .with_attribute("code_hash", code_hash)
            .with_attribute("status", format!("{:?}", outcome.status))
            .with_attribute("cache_hit", outcome.cache_hit),
        user_id,
    )
    .await;

    Ok(exec_response(&outcome))
}

#[derive(Debug, serde::Deserialize)]
pub struct RunTestsRequest {
    pub test_source: String,
    pub language: String,
    pub timeout_seconds: Option<u64>,
}

pub async fn run_tests(
    state: &AppState,
    request_id: &str,
    req: RunTestsRequest,
    user_id: Option<&str>,
) -> Result<Value, AppError> {
    let lang = mcp_validate::Language::parse(&req.language)
        .ok_or_else(|| AppError::invalid(format!("unsupported language: {}", req.language)))?;
    if let Err(err) = mcp_validate::validate_code(&req.test_source, lang, false) {
        record(
            state,
            request_id,
            AuditEvent::new(EventType::SecurityViolation, request_id.to_string())
                .with_attribute("reason", err.to_string()),
            user_id,
        )
        .await;
        return Err(err);
    }

    let code_hash = mcp_tools::code_hash(&req.test_source);
    let outcome = state
        .exec
        .run_tests(TestRunRequest {
            test_source: req.test_source,
            language: req.language.clone(),
            timeout: req.timeout_seconds.map(std::time::Duration::from_secs),
        })
        .await?;

    persist::persist_test(&state.graph, &code_hash, &req.language, &outcome).await?;
    record(
        state,
        request_id,
        AuditEvent::new(EventType::CodeExec, request_id.to_string())
            .with_attribute("code_hash", code_hash)
            .with_attribute("status", format!("{:?}", outcome.status))
            .with_attribute("kind", "test"),
        user_id,
    )
    .await;

    Ok(exec_response(&outcome))
}

#[derive(Debug, serde::Deserialize)]
pub struct GenerateRequest {
    pub template: String,
    pub context: Value,
    pub language: String,
}

pub async fn generate_code(state: &AppState, req: GenerateRequest) -> Result<Value, AppError> {
    let artifact = mcp_tools::render(&req.template, &req.context, &req.language)?;
    let template_hash = sha256_hex(&req.template);
    persist::persist_generation(&state.graph, &template_hash, &artifact).await?;
    Ok(serde_json::to_value(artifact).expect("GenerationArtifact always serializes"))
}

#[derive(Debug, serde::Deserialize)]
pub struct GraphUpsertRequest {
    pub nodes: Vec<GraphNode>,
    pub relationships: Vec<GraphRelationship>,
}

pub async fn graph_upsert(
    state: &AppState,
    request_id: &str,
    req: GraphUpsertRequest,
    user_id: Option<&str>,
) -> Result<Value, AppError> {
    mcp_tools::upsert(&state.graph, &req.nodes, &req.relationships).await?;
    record(
        state,
        request_id,
        AuditEvent::new(EventType::GraphWrite, request_id.to_string())
            .with_attribute("nodes", req.nodes.len() as u64)
            .with_attribute("relationships", req.relationships.len() as u64),
        user_id,
    )
    .await;
    Ok(serde_json::json!({ "nodes": req.nodes.len(), "relationships": req.relationships.len() }))
}

#[derive(Debug, serde::Deserialize)]
pub struct GraphQueryRequest {
    pub query: String,
    #[serde(default)]
    pub params: Map<String, Value>,
    pub row_limit: Option<usize>,
}

pub async fn graph_query(state: &AppState, request_id: &str, req: GraphQueryRequest) -> Result<Value, AppError> {
    let params: HashMap<String, Value> = req.params.into_iter().collect();
    match mcp_tools::query(&state.graph, &req.query, params, req.row_limit).await {
        Ok(rows) => {
            record(
                state,
                request_id,
                AuditEvent::new(EventType::GraphRead, request_id.to_string())
                    .with_attribute("rows", rows.len() as u64),
                None,
            )
            .await;
            Ok(serde_json::json!({ "rows": rows }))
        }
        Err(err) => {
            record(
                state,
                request_id,
                AuditEvent::new(EventType::SecurityViolation, request_id.to_string())
                    .with_attribute("reason", err.to_string()),
                None,
            )
            .await;
            Err(err)
        }
    }
}

pub fn list_prompts(state: &AppState) -> Value {
    serde_json::to_value(state.prompts.list()).expect("prompts always serialize")
}

pub fn get_prompt(state: &AppState, id: &str) -> Result<Prompt, AppError> {
    state.prompts.get(id).cloned()
}
