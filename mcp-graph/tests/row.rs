use mcp_graph::is_flat_scalar_or_sequence;
use serde_json::json;

#[test]
fn scalars_and_flat_arrays_are_accepted() {
    assert!(is_flat_scalar_or_sequence(&json!(1)));
    assert!(is_flat_scalar_or_sequence(&json!("s")));
    assert!(is_flat_scalar_or_sequence(&json!(null)));
    assert!(is_flat_scalar_or_sequence(&json!([1, 2, 3])));
    assert!(is_flat_scalar_or_sequence(&json!(["a", "b"])));
}

#[test]
fn nested_objects_and_arrays_are_rejected() {
    assert!(!is_flat_scalar_or_sequence(&json!({"a": 1})));
    assert!(!is_flat_scalar_or_sequence(&json!([{"a": 1}])));
    assert!(!is_flat_scalar_or_sequence(&json!([[1, 2]])));
}
