//! Applies the graph's constraints and indexes once at startup. Failing to
//! apply them is fatal: the process exits before it would otherwise start
//! accepting connections, rather than serve traffic against an
//! unconstrained, unindexed graph.

use std::collections::HashMap;

use mcp_core::error::AppError;
use mcp_graph::GraphClient;

const STATEMENTS: &[&str] = &[
    "CREATE CONSTRAINT audit_event_id IF NOT EXISTS FOR (a:AuditEvent) REQUIRE a.id IS UNIQUE",
    "CREATE INDEX audit_event_type_timestamp IF NOT EXISTS FOR (a:AuditEvent) ON (a.type, a.timestamp)",
    "CREATE INDEX audit_event_user_id IF NOT EXISTS FOR (a:AuditEvent) ON (a.user_id)",
    "CREATE INDEX lint_result_code_hash IF NOT EXISTS FOR (r:LintResult) ON (r.code_hash)",
    "CREATE INDEX execution_result_code_hash IF NOT EXISTS FOR (r:ExecutionResult) ON (r.code_hash)",
    "CREATE INDEX execution_result_timestamp IF NOT EXISTS FOR (r:ExecutionResult) ON (r.timestamp)",
    "CREATE INDEX test_result_code_hash IF NOT EXISTS FOR (r:TestResult) ON (r.code_hash)",
    "CREATE INDEX generation_result_template_hash IF NOT EXISTS FOR (r:GenerationResult) ON (r.template_hash)",
];

/// Neo4j rejects more than one schema-modifying statement per transaction,
/// so each constraint/index runs as its own write rather than one
/// `execute_write_tx` batch.
pub async fn apply(graph: &GraphClient) -> Result<(), AppError> {
    for statement in STATEMENTS {
        graph.execute_write(statement, HashMap::new(), None).await?;
    }
    Ok(())
}
