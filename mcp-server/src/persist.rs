//! Persists tool results as graph nodes. Every write here is a `MERGE`
//! keyed by the node's natural key (`code_hash`, or a content hash for
//! generation, which has none) so repeating an identical call doesn't pile
//! up duplicate history.

use std::collections::HashMap;

use mcp_core::error::AppError;
use mcp_exec::ExecutionOutcome;
use mcp_graph::GraphClient;
use mcp_tools::{GenerationArtifact, LintArtifact};
use serde_json::Value;

pub async fn persist_lint(graph: &GraphClient, artifact: &LintArtifact) -> Result<(), AppError> {
    let query = "MERGE (r:LintResult {code_hash: $code_hash}) SET r += $props";
    let mut props = serde_json::Map::new();
    props.insert("language".to_string(), Value::String(artifact.language.clone()));
    props.insert("functions".to_string(), serde_json::to_value(&artifact.functions).unwrap());
    props.insert("classes".to_string(), serde_json::to_value(&artifact.classes).unwrap());
    props.insert("imports".to_string(), serde_json::to_value(&artifact.imports).unwrap());
    props.insert("complexity".to_string(), Value::from(artifact.complexity));

    let mut params = HashMap::new();
    params.insert("code_hash".to_string(), Value::String(artifact.code_hash.clone()));
    params.insert("props".to_string(), Value::Object(props));
    graph.execute_write(query, params, Some("LintResult")).await
}

pub async fn persist_execution(
    graph: &GraphClient,
    code_hash: &str,
    language: &str,
    outcome: &ExecutionOutcome,
) -> Result<(), AppError> {
    let query = "MERGE (r:ExecutionResult {code_hash: $code_hash, timestamp: $timestamp}) SET r += $props";
    let mut props = serde_json::Map::new();
    props.insert("language".to_string(), Value::String(language.to_string()));
    props.insert("status".to_string(), serde_json::to_value(&outcome.status).unwrap());
    props.insert("exit_code".to_string(), outcome.exit_code.map(Value::from).unwrap_or(Value::Null));
    props.insert("duration_ms".to_string(), Value::from(outcome.duration_ms as u64));
    props.insert(
        "truncated".to_string(),
        Value::Bool(outcome.stdout_truncated || outcome.stderr_truncated),
    );

    let mut params = HashMap::new();
    params.insert("code_hash".to_string(), Value::String(code_hash.to_string()));
    params.insert(
        "timestamp".to_string(),
        Value::String(chrono::Utc::now().to_rfc3339()),
    );
    params.insert("props".to_string(), Value::Object(props));
    graph.execute_write(query, params, Some("ExecutionResult")).await
}

pub async fn persist_test(
    graph: &GraphClient,
    code_hash: &str,
    language: &str,
    outcome: &ExecutionOutcome,
) -> Result<(), AppError> {
    let query = "MERGE (r:TestResult {code_hash: $code_hash, timestamp: $timestamp}) SET r += $props";
    let mut props = serde_json::Map::new();
    props.insert("language".to_string(), Value::String(language.to_string()));
    props.insert("status".to_string(), serde_json::to_value(&outcome.status).unwrap());
    props.insert("exit_code".to_string(), outcome.exit_code.map(Value::from).unwrap_or(Value::Null));
    props.insert("duration_ms".to_string(), Value::from(outcome.duration_ms as u64));

    let mut params = HashMap::new();
    params.insert("code_hash".to_string(), Value::String(code_hash.to_string()));
    params.insert(
        "timestamp".to_string(),
        Value::String(chrono::Utc::now().to_rfc3339()),
    );
    params.insert("props".to_string(), Value::Object(props));
    graph.execute_write(query, params, Some("TestResult")).await
}

pub async fn persist_generation(
    graph: &GraphClient,
    template_hash: &str,
    artifact: &GenerationArtifact,
) -> Result<(), AppError> {
    let query = "MERGE (r:GenerationResult {template_hash: $template_hash}) SET r += $props";
    let mut props = serde_json::Map::new();
    props.insert("language".to_string(), Value::String(artifact.language.clone()));
    props.insert("output_len".to_string(), Value::from(artifact.output.len() as u64));

    let mut params = HashMap::new();
    params.insert("template_hash".to_string(), Value::String(template_hash.to_string()));
    params.insert("props".to_string(), Value::Object(props));
    graph.execute_write(query, params, Some("GenerationResult")).await
}
