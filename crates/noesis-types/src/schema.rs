//! Schema & Value data model (§4.A). Schemas are pure data: no closures, no
//! behavior. Validation and coercion live in `noesis::schema` — this module
//! only describes shapes and carries validation errors.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::value::Value;

/// A structural description of a tool's input or output. Tagged union over
/// the kinds named in §3.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Schema {
    Object {
        fields: BTreeMap<String, Field>,
        /// Closed objects reject unknown fields during validation.
        #[serde(default = "default_true")]
        closed: bool,
    },
    Array {
        items: Box<Schema>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min_items: Option<usize>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max_items: Option<usize>,
    },
    String {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min_length: Option<usize>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max_length: Option<usize>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pattern: Option<String>,
    },
    Number {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        minimum: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        maximum: Option<f64>,
    },
    Integer {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        minimum: Option<i64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        maximum: Option<i64>,
    },
    Boolean,
    Enum {
        values: Vec<String>,
    },
    /// `oneOf` must discriminate deterministically (§4.A edge cases): if
    /// more than one branch matches a value and no `discriminator` field
    /// picks a single one, validation fails with an ambiguity error.
    OneOf {
        branches: Vec<Schema>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        discriminator: Option<String>,
    },
    /// Named reference to another schema, resolved by the caller (the
    /// registry does not maintain a schema namespace of its own).
    Ref {
        target: String,
    },
}

fn default_true() -> bool {
    true
}

impl Schema {
    pub fn object(fields: BTreeMap<String, Field>) -> Self {
        Schema::Object {
            fields,
            closed: true,
        }
    }

    pub fn string() -> Self {
        Schema::String {
            min_length: None,
            max_length: None,
            pattern: None,
        }
    }

    /// Canonical string form, used for schema equality and cache keys
    /// (§4.A "Equality and canonical serialization").
    pub fn canonical_string(&self) -> String {
        let value = serde_json::to_value(self).expect("schema serialization cannot fail");
        crate::value::canonical_string(&value)
    }
}

/// One named field of an `Object` schema (§3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub schema: Schema,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

impl Field {
    pub fn required(schema: Schema) -> Self {
        Field {
            schema,
            required: true,
            description: None,
            default: None,
        }
    }

    pub fn optional(schema: Schema) -> Self {
        Field {
            schema,
            required: false,
            description: None,
            default: None,
        }
    }

    pub fn describe(mut self, text: impl Into<String>) -> Self {
        self.description = Some(text.into());
        self
    }
}

/// A single validation failure, carrying the full dotted path to the
/// offending value (§4.A, §7 "validation errors list all bad field paths
/// at once").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationError {
    pub path: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        ValidationError {
            path: path.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_string_is_stable_across_field_insertion_order() {
        let mut fields_a = BTreeMap::new();
        fields_a.insert("b".to_string(), Field::required(Schema::string()));
        fields_a.insert("a".to_string(), Field::required(Schema::string()));

        let mut fields_b = BTreeMap::new();
        fields_b.insert("a".to_string(), Field::required(Schema::string()));
        fields_b.insert("b".to_string(), Field::required(Schema::string()));

        assert_eq!(
            Schema::object(fields_a).canonical_string(),
            Schema::object(fields_b).canonical_string()
        );
    }

    #[test]
    fn round_trips_through_json() {
        let schema = Schema::object(BTreeMap::from([(
            "name".to_string(),
            Field::required(Schema::string()).describe("the thing's name"),
        )]));
        let json = serde_json::to_string(&schema).unwrap();
        let back: Schema = serde_json::from_str(&json).unwrap();
        assert_eq!(schema, back);
    }
}
