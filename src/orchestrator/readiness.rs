//! Readiness predicate for fetched analysis results.
//!
//! Backend versions disagree on where scenes live, so readiness is deliberately
//! permissive. Keep every tolerance in [`is_materialized`]; tightening it causes
//! finished runs to be reported as still processing.

use serde_json::Value;

/// Top-level keys older and newer backends use for the scene list.
const LEGACY_SCENE_KEYS: [&str; 2] = ["scenes", "LAYER_1_SCENE_EXTRACTIONS"];

/// Whether a fetched body counts as a materialized result.
pub(crate) fn is_materialized(value: &Value) -> bool {
    if value.is_null() {
        return false;
    }
    // TODO: "any non-empty value" also accepts an error object that happens to
    // carry keys (e.g. `{"detail": ...}` on a 200); restrict this to the two
    // scene checks once every backend reports `total_scenes`.
    has_scene_list(value) || total_scenes(value) > 0 || is_non_empty(value)
}

/// Number of scenes in a result, looking at every known location.
pub(crate) fn scene_count(value: &Value) -> usize {
    let listed = scene_lists(value).map(Vec::len).max().unwrap_or(0);
    listed.max(total_scenes(value) as usize)
}

fn scene_lists(value: &Value) -> impl Iterator<Item = &Vec<Value>> {
    LEGACY_SCENE_KEYS
        .iter()
        .filter_map(move |k| value.get(k))
        .chain(value.get("scenes_analysis").and_then(|v| v.get("scenes")))
        .filter_map(Value::as_array)
}

/// Whether any scene list actually holds a scene. `total_scenes` alone does not count.
pub(crate) fn has_scene_list(value: &Value) -> bool {
    scene_lists(value).any(|scenes| !scenes.is_empty())
}

fn total_scenes(value: &Value) -> u64 {
    value
        .get("total_scenes")
        .and_then(|v| v.as_u64().or_else(|| v.as_f64().map(|f| f.max(0.0) as u64)))
        .unwrap_or(0)
}

fn is_non_empty(value: &Value) -> bool {
    match value {
        Value::Object(map) => !map.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::String(s) => !s.is_empty(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn null_and_empty_bodies_are_not_ready() {
        assert!(!is_materialized(&Value::Null));
        assert!(!is_materialized(&json!({})));
        assert!(!is_materialized(&json!([])));
        assert!(!is_materialized(&json!(0)));
        assert!(!is_materialized(&json!(false)));
    }

    #[test]
    fn any_legacy_scene_key_is_ready() {
        assert!(is_materialized(&json!({"scenes": [{"id": 1}]})));
        assert!(is_materialized(&json!({"LAYER_1_SCENE_EXTRACTIONS": [{"id": 1}]})));
        assert!(is_materialized(&json!({"scenes_analysis": {"scenes": [{}]}})));
        assert!(is_materialized(&json!({"total_scenes": 3})));
    }

    #[test]
    fn any_non_empty_object_is_ready() {
        // Preserved tolerance, including error-shaped bodies.
        assert!(is_materialized(&json!({"scenes": []})));
        assert!(is_materialized(&json!({"total_scenes": 0})));
        assert!(is_materialized(&json!({"detail": "something"})));
    }

    #[test]
    fn scene_count_uses_the_largest_source() {
        assert_eq!(scene_count(&json!({})), 0);
        assert_eq!(scene_count(&json!({"scenes": [1, 2]})), 2);
        assert_eq!(
            scene_count(&json!({"scenes_analysis": {"scenes": [1, 2, 3]}, "total_scenes": 1})),
            3
        );
        assert_eq!(scene_count(&json!({"total_scenes": 7})), 7);
        assert_eq!(scene_count(&json!({"scenes": "oops"})), 0);
    }
}
