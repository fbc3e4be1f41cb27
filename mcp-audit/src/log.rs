//! Persists audit events through the graph client. Writes are `CREATE`,
//! never `MERGE`: an audit event is never updated once recorded.

use std::collections::HashMap;

use mcp_core::error::AppError;
use mcp_graph::GraphClient;
use serde_json::Value;

use crate::event::AuditEvent;

pub struct AuditLog<'a> {
    graph: &'a GraphClient,
}

impl<'a> AuditLog<'a> {
    pub fn new(graph: &'a GraphClient) -> Self {
        Self { graph }
    }

    pub async fn record(&self, event: AuditEvent) -> Result<(), AppError> {
        let query = "CREATE (:AuditEvent {id: $id, type: $type, timestamp: $timestamp, \
                      user_id: $user_id, correlation_id: $correlation_id, severity: $severity, \
                      attributes: $attributes})";

        let mut params = HashMap::new();
        params.insert("id".to_string(), Value::String(event.id.to_string()));
        params.insert(
            "type".to_string(),
            Value::String(event.event_type.as_str().to_string()),
        );
        params.insert(
            "timestamp".to_string(),
            Value::String(event.timestamp.to_rfc3339()),
        );
        params.insert(
            "user_id".to_string(),
            event.user_id.map(Value::String).unwrap_or(Value::Null),
        );
        params.insert(
            "correlation_id".to_string(),
            Value::String(event.correlation_id.clone()),
        );
        params.insert(
            "severity".to_string(),
            Value::String(event.severity.as_str().to_string()),
        );
        params.insert("attributes".to_string(), Value::Object(event.attributes.clone()));

        let result = self.graph.execute_write(query, params, None).await;
        if let Err(ref err) = result {
            tracing::error!(
                correlation_id = %event.correlation_id,
                event_type = event.event_type.as_str(),
                error = %err,
                "failed to persist audit event"
            );
        }
        result
    }
}
