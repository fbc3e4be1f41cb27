//! Upsert and query surface over the graph client. Upsert builds one write
//! transaction that MERGEs every node before any relationship; query
//! validates, executes through the cached read path, and caps the row count.

use std::collections::HashMap;

use mcp_core::error::AppError;
use mcp_graph::GraphClient;
use serde_json::{Map, Value};

const DEFAULT_ROW_LIMIT: usize = 10_000;

#[derive(Debug, Clone, serde::Deserialize)]
pub struct GraphNode {
    pub key: String,
    pub labels: Vec<String>,
    pub properties: Map<String, Value>,
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct GraphRelationship {
    pub start_key: String,
    pub end_key: String,
    #[serde(rename = "type")]
    pub rel_type: String,
    pub properties: Map<String, Value>,
}

fn validate_node(node: &GraphNode) -> Result<(), AppError> {
    mcp_validate::validate_identifier(&node.key)?;
    for label in &node.labels {
        mcp_validate::validate_identifier(label)?;
    }
    validate_properties(&node.properties)
}

fn validate_relationship(rel: &GraphRelationship) -> Result<(), AppError> {
    mcp_validate::validate_identifier(&rel.start_key)?;
    mcp_validate::validate_identifier(&rel.end_key)?;
    mcp_validate::validate_identifier(&rel.rel_type)?;
    validate_properties(&rel.properties)
}

fn validate_properties(props: &Map<String, Value>) -> Result<(), AppError> {
    for (key, value) in props {
        mcp_validate::validate_identifier(key)?;
        if !mcp_graph::is_flat_scalar_or_sequence(value) {
            return Err(AppError::invalid(format!(
                "property '{key}' must be a scalar or a flat sequence of scalars"
            )));
        }
    }
    Ok(())
}

/// `nodes` are MERGEd before `relationships`, within a single write
/// transaction, so a relationship never references a node that has not yet
/// been written.
pub async fn upsert(
    graph: &GraphClient,
    nodes: &[GraphNode],
    relationships: &[GraphRelationship],
) -> Result<(), AppError> {
    for node in nodes {
        validate_node(node)?;
    }
    for rel in relationships {
        validate_relationship(rel)?;
    }

    let mut statements = Vec::with_capacity(nodes.len() + relationships.len());
    for node in nodes {
        let labels_clause: String = node.labels.iter().map(|l| format!(":{l}")).collect();
        let query = format!("MERGE (n {{key: $key}}) SET n += $props SET n{labels_clause}");
        let mut params = HashMap::new();
        params.insert("key".to_string(), Value::String(node.key.clone()));
        params.insert("props".to_string(), Value::Object(node.properties.clone()));
        statements.push((query, params));
    }
    for rel in relationships {
        let query = format!(
            "MATCH (a {{key: $start}}), (b {{key: $end}}) MERGE (a)-[r:{}]->(b) SET r += $props",
            rel.rel_type
        );
        let mut params = HashMap::new();
        params.insert("start".to_string(), Value::String(rel.start_key.clone()));
        params.insert("end".to_string(), Value::String(rel.end_key.clone()));
        params.insert("props".to_string(), Value::Object(rel.properties.clone()));
        statements.push((query, params));
    }

    graph.execute_write_tx(statements).await
}

const NON_DETERMINISTIC_MARKERS: &[&str] = &["rand(", "timestamp(", "datetime(", "localdatetime(", "localtime("];

fn is_cacheable(query: &str) -> bool {
    let lower = query.to_lowercase();
    !NON_DETERMINISTIC_MARKERS.iter().any(|m| lower.contains(m))
}

pub async fn query(
    graph: &GraphClient,
    text: &str,
    params: HashMap<String, Value>,
    row_limit: Option<usize>,
) -> Result<Vec<Map<String, Value>>, AppError> {
    mcp_validate::validate_graph_query(text)?;
    let mut rows = graph.execute_read(text, params, is_cacheable(text)).await?;
    let limit = row_limit.unwrap_or(DEFAULT_ROW_LIMIT);
    rows.truncate(limit);
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn rejects_node_with_bad_key() {
        let node = GraphNode {
            key: "not valid!".to_string(),
            labels: vec!["Service".to_string()],
            properties: Map::new(),
        };
        assert!(validate_node(&node).is_err());
    }

    #[test]
    fn rejects_nested_property() {
        let mut props = Map::new();
        props.insert("meta".to_string(), json!({"nested": true}));
        let node = GraphNode {
            key: "svc-1".to_string(),
            labels: vec!["Service".to_string()],
            properties: props,
        };
        assert!(validate_node(&node).is_err());
    }

    #[test]
    fn accepts_well_formed_node_and_relationship() {
        let node = GraphNode {
            key: "svc-1".to_string(),
            labels: vec!["Service".to_string()],
            properties: Map::new(),
        };
        assert!(validate_node(&node).is_ok());

        let rel = GraphRelationship {
            start_key: "svc-1".to_string(),
            end_key: "svc-2".to_string(),
            rel_type: "DEPENDS_ON".to_string(),
            properties: Map::new(),
        };
        assert!(validate_relationship(&rel).is_ok());
    }

    #[test]
    fn purity_heuristic_flags_nondeterministic_functions() {
        assert!(!is_cacheable("MATCH (n) RETURN timestamp()"));
        assert!(is_cacheable("MATCH (n) RETURN n.key"));
    }
}
