//! Normalizes graph rows to JSON-safe scalars/arrays/maps before they leave
//! the driver boundary.

use neo4rs::{BoltType, Row};
use serde_json::{Map, Value};

pub fn row_to_json(row: &Row) -> Map<String, Value> {
    let mut out = Map::new();
    for key in row.keys() {
        let value = row
            .get::<BoltType>(key)
            .map(bolt_to_json)
            .unwrap_or(Value::Null);
        out.insert(key.to_string(), value);
    }
    out
}

fn bolt_to_json(value: BoltType) -> Value {
    match value {
        BoltType::String(s) => Value::String(s.value),
        BoltType::Boolean(b) => Value::Bool(b.value),
        BoltType::Integer(i) => Value::from(i.value),
        BoltType::Float(f) => serde_json::Number::from_f64(f.value)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        BoltType::Null(_) => Value::Null,
        BoltType::List(items) => Value::Array(items.value.into_iter().map(bolt_to_json).collect()),
        BoltType::Map(map) => {
            let mut obj = Map::new();
            for (k, v) in map.value.into_iter() {
                obj.insert(k.value, bolt_to_json(v));
            }
            Value::Object(obj)
        }
        BoltType::Node(node) => {
            let mut obj = Map::new();
            obj.insert(
                "labels".to_string(),
                Value::Array(node.labels().iter().map(|l| Value::String(l.clone())).collect()),
            );
            for key in node.keys() {
                if let Ok(v) = node.get::<BoltType>(key) {
                    obj.insert(key.to_string(), bolt_to_json(v));
                }
            }
            Value::Object(obj)
        }
        BoltType::Relation(rel) => {
            let mut obj = Map::new();
            obj.insert("type".to_string(), Value::String(rel.typ().to_string()));
            for key in rel.keys() {
                if let Ok(v) = rel.get::<BoltType>(key) {
                    obj.insert(key.to_string(), bolt_to_json(v));
                }
            }
            Value::Object(obj)
        }
        _ => Value::Null,
    }
}

/// Scalars or flat sequences of scalars only.
pub fn is_flat_scalar_or_sequence(value: &Value) -> bool {
    match value {
        Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_) => true,
        Value::Array(items) => items
            .iter()
            .all(|v| matches!(v, Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_))),
        Value::Object(_) => false,
    }
}
