// crates/noesis-engine/src/workflow/reference.rs
// Reference syntax and resolution (§3, §4.E.1, §4.E.3). A reference is an
// exact string of the form `${nodes.<id>.output.<path>}`, `${input.<path>}`
// or `${session.<path>}`; dotted paths use `.` for object fields and `[n]`
// for array indices.

use std::collections::BTreeMap;

use noesis_types::Value;
use once_cell::sync::Lazy;
use regex::Regex;

/// A single parsed reference target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefTarget {
    NodeOutput { node_id: String, path: String },
    Input { path: String },
    Session { path: String },
}

static REFERENCE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\{([a-zA-Z_][a-zA-Z0-9_]*(?:\.[^}]*)?)\}").expect("valid regex"));

/// Parses the inner content of a `${...}` reference (without the braces).
fn parse_inner(inner: &str) -> Option<RefTarget> {
    if let Some(rest) = inner.strip_prefix("nodes.") {
        let (node_id, rest) = rest.split_once('.')?;
        let path = rest.strip_prefix("output.").unwrap_or(rest);
        return Some(RefTarget::NodeOutput {
            node_id: node_id.to_string(),
            path: path.to_string(),
        });
    }
    if let Some(path) = inner.strip_prefix("input.") {
        return Some(RefTarget::Input { path: path.to_string() });
    }
    if inner == "input" {
        return Some(RefTarget::Input { path: String::new() });
    }
    if let Some(path) = inner.strip_prefix("session.") {
        return Some(RefTarget::Session { path: path.to_string() });
    }
    if inner == "session" {
        return Some(RefTarget::Session { path: String::new() });
    }
    None
}

/// True iff `s` is *entirely* one reference (no surrounding text). Such a
/// leaf is replaced by the typed value itself, preserving numeric/boolean/
/// object types (§4.E.3 "a leaf whose entire value is a single reference is
/// replaced with the typed value").
pub fn whole_string_reference(s: &str) -> Option<RefTarget> {
    let caps = REFERENCE_RE.captures(s)?;
    let whole = caps.get(0)?;
    if whole.start() == 0 && whole.end() == s.len() {
        parse_inner(caps.get(1)?.as_str())
    } else {
        None
    }
}

/// Every reference appearing anywhere inside `s`, for string-interpolation
/// leaves and for dependency-edge scanning.
fn all_references_in_str(s: &str) -> Vec<RefTarget> {
    REFERENCE_RE
        .captures_iter(s)
        .filter_map(|c| c.get(1).and_then(|m| parse_inner(m.as_str())))
        .collect()
}

/// Walks an entire `arguments` template, collecting every reference it
/// contains (§4.E.1 "Walk every `argumentsTemplate` and collect
/// references").
pub fn scan_references(value: &Value) -> Vec<RefTarget> {
    let mut out = Vec::new();
    scan_into(value, &mut out);
    out
}

fn scan_into(value: &Value, out: &mut Vec<RefTarget>) {
    match value {
        Value::String(s) => out.extend(all_references_in_str(s)),
        Value::Array(items) => {
            for item in items {
                scan_into(item, out);
            }
        }
        Value::Object(map) => {
            for v in map.values() {
                scan_into(v, out);
            }
        }
        _ => {}
    }
}

/// Traverses `value` by a dotted path (`.` for fields, `[n]` for array
/// indices). An empty path returns `value` itself. Returns `None` if the
/// path does not exist — the caller turns that into a `referenceError`
/// (§4.E.3).
pub fn get_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    if path.is_empty() {
        return Some(value);
    }
    let mut current = value;
    for segment in split_path(path) {
        match segment {
            PathSegment::Field(name) => {
                current = current.as_object()?.get(&name)?;
            }
            PathSegment::Index(i) => {
                current = current.as_array()?.get(i)?;
            }
        }
    }
    Some(current)
}

enum PathSegment {
    Field(String),
    Index(usize),
}

fn split_path(path: &str) -> Vec<PathSegment> {
    let mut segments = Vec::new();
    for dotted in path.split('.') {
        let mut rest = dotted;
        // A field name may be followed by one or more `[n]` index suffixes,
        // e.g. `tags[0]` or `matrix[0][1]`.
        if let Some(bracket) = rest.find('[') {
            let field = &rest[..bracket];
            if !field.is_empty() {
                segments.push(PathSegment::Field(field.to_string()));
            }
            rest = &rest[bracket..];
            while let Some(stripped) = rest.strip_prefix('[') {
                if let Some(end) = stripped.find(']') {
                    if let Ok(idx) = stripped[..end].parse::<usize>() {
                        segments.push(PathSegment::Index(idx));
                    }
                    rest = &stripped[end + 1..];
                } else {
                    break;
                }
            }
        } else if !rest.is_empty() {
            segments.push(PathSegment::Field(rest.to_string()));
        }
    }
    segments
}

/// Error resolving a reference: either the referenced node/path does not
/// exist. Distinct from a schema-validation failure on the resolved value
/// (§4.E.3 "A reference that resolves to the wrong type is a validation
/// error, not a reference error").
#[derive(Debug, Clone)]
pub struct ReferenceError(pub String);

impl std::fmt::Display for ReferenceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// What the resolver needs to look values up: completed node outputs, the
/// workflow's own input, and the optional session context object the
/// engine maintains per run (§4.E.3).
pub struct ResolutionContext<'a> {
    pub node_outputs: &'a BTreeMap<String, Value>,
    pub workflow_input: &'a Value,
    pub session_context: &'a Value,
}

impl ResolutionContext<'_> {
    fn resolve_target(&self, target: &RefTarget) -> Result<Value, ReferenceError> {
        match target {
            RefTarget::NodeOutput { node_id, path } => {
                let output = self.node_outputs.get(node_id).ok_or_else(|| {
                    ReferenceError(format!("reference to unknown node '{node_id}'"))
                })?;
                get_path(output, path).cloned().ok_or_else(|| {
                    ReferenceError(format!(
                        "path '{path}' does not exist in node '{node_id}' output"
                    ))
                })
            }
            RefTarget::Input { path } => get_path(self.workflow_input, path).cloned().ok_or_else(|| {
                ReferenceError(format!("path '{path}' does not exist in workflow input"))
            }),
            RefTarget::Session { path } => get_path(self.session_context, path).cloned().ok_or_else(|| {
                ReferenceError(format!("path '{path}' does not exist in session context"))
            }),
        }
    }

    /// Materializes a whole `arguments` template (§4.E.3): literals pass
    /// through, a whole-string reference becomes the typed value, and a
    /// string containing embedded references is interpolated.
    pub fn resolve(&self, template: &Value) -> Result<Value, ReferenceError> {
        match template {
            Value::String(s) => {
                if let Some(target) = whole_string_reference(s) {
                    self.resolve_target(&target)
                } else {
                    self.interpolate(s)
                }
            }
            Value::Array(items) => {
                let resolved: Result<Vec<Value>, ReferenceError> =
                    items.iter().map(|v| self.resolve(v)).collect();
                Ok(Value::Array(resolved?))
            }
            Value::Object(map) => {
                let mut out = serde_json::Map::new();
                for (k, v) in map {
                    out.insert(k.clone(), self.resolve(v)?);
                }
                Ok(Value::Object(out))
            }
            other => Ok(other.clone()),
        }
    }

    fn interpolate(&self, s: &str) -> Result<Value, ReferenceError> {
        if !s.contains("${") {
            return Ok(Value::String(s.to_string()));
        }
        let mut result = String::new();
        let mut last_end = 0;
        for caps in REFERENCE_RE.captures_iter(s) {
            let whole = caps.get(0).expect("group 0 always matches");
            result.push_str(&s[last_end..whole.start()]);
            let inner = caps.get(1).expect("group 1 always matches").as_str();
            let target = parse_inner(inner)
                .ok_or_else(|| ReferenceError(format!("malformed reference '${{{inner}}}'")))?;
            let value = self.resolve_target(&target)?;
            result.push_str(&value_to_interpolated_string(&value));
            last_end = whole.end();
        }
        result.push_str(&s[last_end..]);
        Ok(Value::String(result))
    }
}

fn value_to_interpolated_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_node_output_reference() {
        let target = whole_string_reference("${nodes.A.output.category}").unwrap();
        assert_eq!(
            target,
            RefTarget::NodeOutput {
                node_id: "A".to_string(),
                path: "category".to_string()
            }
        );
    }

    #[test]
    fn parses_input_and_session_references() {
        assert_eq!(
            whole_string_reference("${input.text}").unwrap(),
            RefTarget::Input { path: "text".to_string() }
        );
        assert_eq!(
            whole_string_reference("${session.topic}").unwrap(),
            RefTarget::Session { path: "topic".to_string() }
        );
    }

    #[test]
    fn non_whole_string_is_not_a_whole_reference() {
        assert!(whole_string_reference("prefix ${input.text} suffix").is_none());
    }

    #[test]
    fn get_path_supports_array_indices() {
        let value = json!({"tags": ["a", "b", "c"]});
        assert_eq!(get_path(&value, "tags[1]"), Some(&json!("b")));
        assert_eq!(get_path(&value, "tags[9]"), None);
    }

    #[test]
    fn resolution_preserves_type_for_whole_reference() {
        let outputs = BTreeMap::from([("A".to_string(), json!({"count": 7}))]);
        let ctx = ResolutionContext {
            node_outputs: &outputs,
            workflow_input: &Value::Null,
            session_context: &Value::Null,
        };
        let resolved = ctx.resolve(&json!("${nodes.A.output.count}")).unwrap();
        assert_eq!(resolved, json!(7));
    }

    #[test]
    fn resolution_interpolates_embedded_references_as_strings() {
        let outputs = BTreeMap::from([("A".to_string(), json!({"name": "world"}))]);
        let ctx = ResolutionContext {
            node_outputs: &outputs,
            workflow_input: &Value::Null,
            session_context: &Value::Null,
        };
        let resolved = ctx.resolve(&json!("hello ${nodes.A.output.name}!")).unwrap();
        assert_eq!(resolved, json!("hello world!"));
    }

    #[test]
    fn missing_path_is_a_reference_error() {
        let outputs = BTreeMap::from([("A".to_string(), json!({"x": 1}))]);
        let ctx = ResolutionContext {
            node_outputs: &outputs,
            workflow_input: &Value::Null,
            session_context: &Value::Null,
        };
        assert!(ctx.resolve(&json!("${nodes.A.output.missing}")).is_err());
    }

    #[test]
    fn scan_collects_node_references_for_edge_derivation() {
        let template = json!({
            "a": "${nodes.X.output.foo}",
            "b": ["${nodes.Y.output.bar}", "literal"],
            "c": "${input.baz}"
        });
        let refs = scan_references(&template);
        assert_eq!(refs.len(), 3);
        assert!(refs.iter().any(|r| matches!(r, RefTarget::NodeOutput { node_id, .. } if node_id == "X")));
        assert!(refs.iter().any(|r| matches!(r, RefTarget::NodeOutput { node_id, .. } if node_id == "Y")));
    }
}
