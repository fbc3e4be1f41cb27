//! Pure template rendering with a scalar-only context. No code-evaluating
//! directives, filesystem, or network access reach this path; `upon`'s
//! template language has no such escape hatch to begin with.

use mcp_core::error::AppError;
use serde_json::Value;

#[derive(Debug, Clone, serde::Serialize)]
pub struct GenerationArtifact {
    pub language: String,
    pub output: String,
}

/// A context value is valid only if every top-level field is a scalar or a
/// flat sequence of scalars — the same shape discipline as a graph node's
/// properties, so a caller cannot smuggle a nested object through the
/// renderer.
fn context_is_scalar_shaped(context: &Value) -> bool {
    let Some(map) = context.as_object() else {
        return false;
    };
    map.values().all(|v| match v {
        Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_) => true,
        Value::Array(items) => items
            .iter()
            .all(|item| matches!(item, Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_))),
        Value::Object(_) => false,
    })
}

pub fn render(template: &str, context: &Value, language: &str) -> Result<GenerationArtifact, AppError> {
    if !context_is_scalar_shaped(context) {
        return Err(AppError::invalid(
            "template context must be an object of scalars or flat scalar arrays",
        ));
    }

    let mut engine = upon::Engine::new();
    let compiled = engine
        .compile(template)
        .map_err(|e| AppError::invalid(format!("invalid template: {e}")))?;
    let output = compiled
        .render(&engine, context)
        .to_string()
        .map_err(|e| AppError::invalid(format!("template render failed: {e}")))?;

    Ok(GenerationArtifact {
        language: language.to_string(),
        output,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn renders_scalar_context() {
        let artifact = render("def {{ name }}():\n    pass\n", &json!({"name": "hello"}), "python").unwrap();
        assert_eq!(artifact.output, "def hello():\n    pass\n");
    }

    #[test]
    fn renders_flat_array_context() {
        let artifact = render(
            "{% for a in args %}{{ a }},{% endfor %}",
            &json!({"args": ["x", "y", "z"]}),
            "python",
        )
        .unwrap();
        assert_eq!(artifact.output, "x,y,z,");
    }

    #[test]
    fn rejects_nested_object_context() {
        let err = render("{{ name }}", &json!({"name": {"nested": true}}), "python").unwrap_err();
        assert!(matches!(err, AppError::InvalidInput { .. }));
    }

    #[test]
    fn rejects_invalid_template_syntax() {
        assert!(render("{{ unclosed", &json!({}), "python").is_err());
    }
}
