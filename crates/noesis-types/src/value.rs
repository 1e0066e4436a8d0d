//! The runtime value type shared by schemas, tool arguments/outputs, and
//! session payloads, plus canonical serialization used for equality and
//! persistence.

use serde_json::{Map, Value as Json};

/// Tool arguments, tool outputs, and session payloads are all untyped JSON
/// at this layer; the [`crate::Schema`] attached to a tool is what gives a
/// particular `Value` its shape.
pub type Value = Json;

/// Sentinel key the workflow engine substitutes for `${nodes.<id>.output...}`
/// references into a node that failed under `onError = continue` (§4.E.2,
/// §9 open question: the sentinel approach over omitting the reference).
pub const UPSTREAM_FAILED_MARKER: &str = "__upstream_failed__";

/// Builds the sentinel value downstream handlers see in place of a failed
/// upstream node's output.
pub fn upstream_failed_sentinel(node_id: &str, error_kind: &str, message: &str) -> Value {
    let mut obj = Map::new();
    obj.insert(UPSTREAM_FAILED_MARKER.to_string(), Json::Bool(true));
    obj.insert("nodeId".to_string(), Json::String(node_id.to_string()));
    obj.insert("errorKind".to_string(), Json::String(error_kind.to_string()));
    obj.insert("errorMessage".to_string(), Json::String(message.to_string()));
    Json::Object(obj)
}

/// Canonical string form of a JSON value: object keys sorted recursively,
/// no insignificant whitespace. Two values are equal under this crate's
/// rules iff their canonical strings are equal (§3 "Schemas are data; two
/// schemas are equal iff their structural serializations are equal" — the
/// same rule is used for value caching/persistence keys).
pub fn canonical_string(value: &Value) -> String {
    serde_json::to_string(&canonicalize(value)).expect("json serialization cannot fail")
}

fn canonicalize(value: &Value) -> Value {
    match value {
        Json::Object(map) => {
            let mut sorted = Map::new();
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            for key in keys {
                sorted.insert(key.clone(), canonicalize(&map[key]));
            }
            Json::Object(sorted)
        }
        Json::Array(items) => Json::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn canonical_string_ignores_key_order() {
        let a = json!({"b": 1, "a": 2});
        let b = json!({"a": 2, "b": 1});
        assert_eq!(canonical_string(&a), canonical_string(&b));
    }

    #[test]
    fn canonical_string_is_order_sensitive_within_arrays() {
        let a = json!([1, 2, 3]);
        let b = json!([3, 2, 1]);
        assert_ne!(canonical_string(&a), canonical_string(&b));
    }

    #[test]
    fn sentinel_carries_node_and_error_kind() {
        let v = upstream_failed_sentinel("A", "handlerError", "boom");
        assert_eq!(v["nodeId"], json!("A"));
        assert_eq!(v["errorKind"], json!("handlerError"));
        assert_eq!(v[UPSTREAM_FAILED_MARKER], json!(true));
    }
}
