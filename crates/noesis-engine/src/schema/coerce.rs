// crates/noesis-engine/src/schema/coerce.rs
// Best-effort, lossless coercion of raw caller input into a tool's expected
// shape (§4.A `Coerce(schema, raw)`), applied by the dispatcher before
// `validate` so callers aren't rejected for sending `"42"` where `42` was
// meant, or vice versa. Coercion never loses precision — it only rewrites a
// leaf when the rewritten form round-trips exactly back to the original.

use noesis_types::Schema;
use serde_json::{Map, Number, Value};

/// Walks `raw` alongside `schema`, rewriting leaves that are a compatible
/// primitive in the wrong JSON kind. Fields and branches the schema doesn't
/// recognize are passed through unchanged — `coerce` never rejects a value;
/// that's `validate`'s job.
pub fn coerce(schema: &Schema, raw: &Value) -> Value {
    match schema {
        Schema::Object { fields, .. } => {
            let Some(obj) = raw.as_object() else {
                return raw.clone();
            };
            let mut out = Map::new();
            for (key, value) in obj {
                let coerced = match fields.get(key) {
                    Some(field) => coerce(&field.schema, value),
                    None => value.clone(),
                };
                out.insert(key.clone(), coerced);
            }
            Value::Object(out)
        }
        Schema::Array { items, .. } => match raw.as_array() {
            Some(arr) => Value::Array(arr.iter().map(|v| coerce(items, v)).collect()),
            None => raw.clone(),
        },
        Schema::OneOf { branches, .. } => {
            // No discriminator is known at coercion time in general; try each
            // branch and keep the first whose coercion doesn't change the
            // value's fundamental kind more than the identity would.
            for branch in branches {
                let candidate = coerce(branch, raw);
                if candidate != *raw {
                    return candidate;
                }
            }
            raw.clone()
        }
        Schema::Integer { .. } => coerce_integer(raw),
        Schema::Number { .. } => coerce_number(raw),
        Schema::Boolean => coerce_boolean(raw),
        Schema::String { .. } | Schema::Enum { .. } | Schema::Ref { .. } => raw.clone(),
    }
}

fn coerce_integer(raw: &Value) -> Value {
    match raw {
        Value::String(s) => match s.parse::<i64>() {
            Ok(n) if n.to_string() == *s => Value::Number(Number::from(n)),
            _ => raw.clone(),
        },
        Value::Number(n) => {
            // A JSON number that is integral (e.g. `42.0`) coerces to an
            // integer without loss; a fractional number is left alone so
            // `validate` reports the type mismatch instead of silently
            // truncating it.
            if let Some(f) = n.as_f64() {
                if f.fract() == 0.0 && f.is_finite() && n.as_i64().is_none() {
                    return Value::Number(Number::from(f as i64));
                }
            }
            raw.clone()
        }
        _ => raw.clone(),
    }
}

fn coerce_number(raw: &Value) -> Value {
    match raw {
        Value::String(s) => match s.parse::<f64>() {
            Ok(f) if f.is_finite() => Number::from_f64(f).map(Value::Number).unwrap_or_else(|| raw.clone()),
            _ => raw.clone(),
        },
        _ => raw.clone(),
    }
}

fn coerce_boolean(raw: &Value) -> Value {
    match raw {
        Value::String(s) if s == "true" => Value::Bool(true),
        Value::String(s) if s == "false" => Value::Bool(false),
        _ => raw.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use noesis_types::Field;
    use serde_json::json;
    use std::collections::BTreeMap;

    #[test]
    fn coerces_integral_json_number_from_string() {
        let schema = Schema::Integer {
            minimum: None,
            maximum: None,
        };
        assert_eq!(coerce(&schema, &json!("42")), json!(42));
    }

    #[test]
    fn leaves_non_integral_string_alone() {
        let schema = Schema::Integer {
            minimum: None,
            maximum: None,
        };
        assert_eq!(coerce(&schema, &json!("4.2")), json!("4.2"));
    }

    #[test]
    fn coerces_exact_boolean_strings_only() {
        let schema = Schema::Boolean;
        assert_eq!(coerce(&schema, &json!("true")), json!(true));
        assert_eq!(coerce(&schema, &json!("false")), json!(false));
        assert_eq!(coerce(&schema, &json!("TRUE")), json!("TRUE"));
    }

    #[test]
    fn recurses_into_object_fields() {
        let schema = Schema::object(BTreeMap::from([(
            "count".to_string(),
            Field::required(Schema::Integer {
                minimum: None,
                maximum: None,
            }),
        )]));
        let raw = json!({"count": "7"});
        assert_eq!(coerce(&schema, &raw), json!({"count": 7}));
    }
}
