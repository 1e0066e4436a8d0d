// crates/noesis-engine/src/mcp/jsonschema.rs
// Renders a registry `Schema` (§4.A) as a plain JSON Schema object, the
// shape `rmcp::model::Tool` expects on the wire. This is a one-way
// projection for clients — validation itself still runs against our own
// `Schema` via `schema::validate`, never against the rendered JSON Schema.

use noesis_types::Schema;
use serde_json::{json, Map, Value};

pub fn render(schema: &Schema) -> Value {
    match schema {
        Schema::Object { fields, closed } => {
            let mut properties = Map::new();
            let mut required = Vec::new();
            for (name, field) in fields {
                let mut prop = render(&field.schema);
                if let Some(obj) = prop.as_object_mut() {
                    if let Some(desc) = &field.description {
                        obj.insert("description".to_string(), json!(desc));
                    }
                    if let Some(default) = &field.default {
                        obj.insert("default".to_string(), default.clone());
                    }
                }
                properties.insert(name.clone(), prop);
                if field.required {
                    required.push(name.clone());
                }
            }
            let mut obj = json!({
                "type": "object",
                "properties": properties,
            });
            if !required.is_empty() {
                obj["required"] = json!(required);
            }
            if *closed {
                obj["additionalProperties"] = json!(false);
            }
            obj
        }
        Schema::Array { items, min_items, max_items } => {
            let mut obj = json!({
                "type": "array",
                "items": render(items),
            });
            if let Some(n) = min_items {
                obj["minItems"] = json!(n);
            }
            if let Some(n) = max_items {
                obj["maxItems"] = json!(n);
            }
            obj
        }
        Schema::String { min_length, max_length, pattern } => {
            let mut obj = json!({"type": "string"});
            if let Some(n) = min_length {
                obj["minLength"] = json!(n);
            }
            if let Some(n) = max_length {
                obj["maxLength"] = json!(n);
            }
            if let Some(p) = pattern {
                obj["pattern"] = json!(p);
            }
            obj
        }
        Schema::Number { minimum, maximum } => {
            let mut obj = json!({"type": "number"});
            if let Some(n) = minimum {
                obj["minimum"] = json!(n);
            }
            if let Some(n) = maximum {
                obj["maximum"] = json!(n);
            }
            obj
        }
        Schema::Integer { minimum, maximum } => {
            let mut obj = json!({"type": "integer"});
            if let Some(n) = minimum {
                obj["minimum"] = json!(n);
            }
            if let Some(n) = maximum {
                obj["maximum"] = json!(n);
            }
            obj
        }
        Schema::Boolean => json!({"type": "boolean"}),
        Schema::Enum { values } => json!({"type": "string", "enum": values}),
        Schema::OneOf { branches, .. } => json!({"oneOf": branches.iter().map(render).collect::<Vec<_>>()}),
        Schema::Ref { target } => json!({"$ref": format!("#/definitions/{target}")}),
    }
}

/// `render`'s output as the object map `rmcp::model::Tool::input_schema`
/// wants, rather than a bare `Value`. Non-object schemas (rare for a tool's
/// top-level input) are wrapped so every tool still advertises an object.
pub fn render_as_object(schema: &Schema) -> Map<String, Value> {
    match render(schema) {
        Value::Object(map) => map,
        other => {
            let mut wrapper = Map::new();
            wrapper.insert("type".to_string(), json!("object"));
            wrapper.insert("properties".to_string(), json!({ "value": other }));
            wrapper
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use noesis_types::Field;
    use std::collections::BTreeMap;

    #[test]
    fn renders_required_and_optional_fields() {
        let schema = Schema::object(BTreeMap::from([
            ("name".to_string(), Field::required(Schema::string())),
            ("limit".to_string(), Field::optional(Schema::Integer { minimum: Some(1), maximum: None })),
        ]));
        let rendered = render(&schema);
        assert_eq!(rendered["type"], json!("object"));
        assert_eq!(rendered["required"], json!(["name"]));
        assert_eq!(rendered["properties"]["limit"]["minimum"], json!(1));
    }

    #[test]
    fn open_objects_omit_additional_properties_lock() {
        let schema = Schema::Object { fields: BTreeMap::new(), closed: false };
        let rendered = render(&schema);
        assert!(rendered.get("additionalProperties").is_none());
    }
}
