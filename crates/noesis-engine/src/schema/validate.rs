// crates/noesis-engine/src/schema/validate.rs
// Schema & Value validation (§4.A `Validate(schema, value)`).

use std::collections::HashMap;

use noesis_types::{Schema, ValidationError, Value};
use serde_json::{Map, Number};

/// Traverses `schema` and `value` in lockstep, producing a normalized value
/// and the full list of validation errors (never both empty-output AND
/// errors — §8 invariant 4: "returns in bounded time with either a
/// normalized value or a non-empty error list — never both").
pub fn validate(schema: &Schema, value: &Value) -> (Value, Vec<ValidationError>) {
    let mut errors = Vec::new();
    let refs = HashMap::new();
    let normalized = validate_at("$", schema, value, &refs, &mut errors);
    if errors.is_empty() {
        (normalized, errors)
    } else {
        (Value::Null, errors)
    }
}

/// As [`validate`], but resolves `Schema::Ref` against a table of named
/// schemas. Most tools never need `$ref`; this entry point exists so the
/// `Ref` variant named in §3/§4.A is not dead weight.
pub fn validate_with_refs(
    schema: &Schema,
    value: &Value,
    refs: &HashMap<String, Schema>,
) -> (Value, Vec<ValidationError>) {
    let mut errors = Vec::new();
    let normalized = validate_at("$", schema, value, refs, &mut errors);
    if errors.is_empty() {
        (normalized, errors)
    } else {
        (Value::Null, errors)
    }
}

fn validate_at(
    path: &str,
    schema: &Schema,
    value: &Value,
    refs: &HashMap<String, Schema>,
    errors: &mut Vec<ValidationError>,
) -> Value {
    match schema {
        Schema::Object { fields, closed } => validate_object(path, fields, *closed, value, refs, errors),
        Schema::Array {
            items,
            min_items,
            max_items,
        } => validate_array(path, items, *min_items, *max_items, value, refs, errors),
        Schema::String {
            min_length,
            max_length,
            pattern,
        } => validate_string(path, *min_length, *max_length, pattern.as_deref(), value, errors),
        Schema::Number { minimum, maximum } => validate_number(path, *minimum, *maximum, value, errors),
        Schema::Integer { minimum, maximum } => validate_integer(path, *minimum, *maximum, value, errors),
        Schema::Boolean => validate_boolean(path, value, errors),
        Schema::Enum { values } => validate_enum(path, values, value, errors),
        Schema::OneOf {
            branches,
            discriminator,
        } => validate_one_of(path, branches, discriminator.as_deref(), value, refs, errors),
        Schema::Ref { target } => match refs.get(target) {
            Some(resolved) => validate_at(path, resolved, value, refs, errors),
            None => {
                errors.push(ValidationError::new(
                    path,
                    format!("unresolved schema reference '{target}'"),
                ));
                Value::Null
            }
        },
    }
}

fn validate_object(
    path: &str,
    fields: &std::collections::BTreeMap<String, noesis_types::Field>,
    closed: bool,
    value: &Value,
    refs: &HashMap<String, Schema>,
    errors: &mut Vec<ValidationError>,
) -> Value {
    let Some(obj) = value.as_object() else {
        errors.push(ValidationError::new(path, "expected object"));
        return Value::Null;
    };

    let mut normalized = Map::new();

    for (name, field) in fields {
        let field_path = format!("{path}.{name}");
        match obj.get(name) {
            Some(v) => {
                let value = validate_at(&field_path, &field.schema, v, refs, errors);
                normalized.insert(name.clone(), value);
            }
            None => {
                if field.required {
                    errors.push(ValidationError::new(&field_path, "missing required field"));
                } else if let Some(default) = &field.default {
                    normalized.insert(name.clone(), default.clone());
                }
            }
        }
    }

    if closed {
        for key in obj.keys() {
            if !fields.contains_key(key) {
                errors.push(ValidationError::new(
                    format!("{path}.{key}"),
                    "unknown field on closed object",
                ));
            }
        }
    }

    Value::Object(normalized)
}

fn validate_array(
    path: &str,
    items: &Schema,
    min_items: Option<usize>,
    max_items: Option<usize>,
    value: &Value,
    refs: &HashMap<String, Schema>,
    errors: &mut Vec<ValidationError>,
) -> Value {
    let Some(arr) = value.as_array() else {
        errors.push(ValidationError::new(path, "expected array"));
        return Value::Null;
    };

    if let Some(min) = min_items {
        if arr.len() < min {
            errors.push(ValidationError::new(
                path,
                format!("array has {} items, expected at least {min}", arr.len()),
            ));
        }
    }
    if let Some(max) = max_items {
        if arr.len() > max {
            errors.push(ValidationError::new(
                path,
                format!("array has {} items, expected at most {max}", arr.len()),
            ));
        }
    }

    let normalized = arr
        .iter()
        .enumerate()
        .map(|(i, v)| validate_at(&format!("{path}[{i}]"), items, v, refs, errors))
        .collect();
    Value::Array(normalized)
}

fn validate_string(
    path: &str,
    min_length: Option<usize>,
    max_length: Option<usize>,
    pattern: Option<&str>,
    value: &Value,
    errors: &mut Vec<ValidationError>,
) -> Value {
    let Some(s) = value.as_str() else {
        errors.push(ValidationError::new(path, "expected string"));
        return Value::Null;
    };

    if let Some(min) = min_length {
        if s.chars().count() < min {
            errors.push(ValidationError::new(path, format!("string shorter than {min}")));
        }
    }
    if let Some(max) = max_length {
        if s.chars().count() > max {
            errors.push(ValidationError::new(path, format!("string longer than {max}")));
        }
    }
    if let Some(pattern) = pattern {
        match regex::Regex::new(pattern) {
            Ok(re) if !re.is_match(s) => {
                errors.push(ValidationError::new(path, format!("does not match pattern '{pattern}'")));
            }
            Err(err) => {
                errors.push(ValidationError::new(path, format!("invalid pattern '{pattern}': {err}")));
            }
            _ => {}
        }
    }

    Value::String(s.to_string())
}

fn validate_number(
    path: &str,
    minimum: Option<f64>,
    maximum: Option<f64>,
    value: &Value,
    errors: &mut Vec<ValidationError>,
) -> Value {
    let Some(n) = value.as_f64() else {
        errors.push(ValidationError::new(path, "expected number"));
        return Value::Null;
    };
    check_bounds(path, n, minimum, maximum, errors);
    Value::Number(Number::from_f64(n).unwrap_or_else(|| Number::from(0)))
}

fn validate_integer(
    path: &str,
    minimum: Option<i64>,
    maximum: Option<i64>,
    value: &Value,
    errors: &mut Vec<ValidationError>,
) -> Value {
    let Some(n) = value.as_i64() else {
        errors.push(ValidationError::new(path, "expected integer"));
        return Value::Null;
    };
    if let Some(min) = minimum {
        if n < min {
            errors.push(ValidationError::new(path, format!("{n} is below minimum {min}")));
        }
    }
    if let Some(max) = maximum {
        if n > max {
            errors.push(ValidationError::new(path, format!("{n} is above maximum {max}")));
        }
    }
    Value::Number(Number::from(n))
}

fn check_bounds(path: &str, n: f64, minimum: Option<f64>, maximum: Option<f64>, errors: &mut Vec<ValidationError>) {
    if let Some(min) = minimum {
        if n < min {
            errors.push(ValidationError::new(path, format!("{n} is below minimum {min}")));
        }
    }
    if let Some(max) = maximum {
        if n > max {
            errors.push(ValidationError::new(path, format!("{n} is above maximum {max}")));
        }
    }
}

fn validate_boolean(path: &str, value: &Value, errors: &mut Vec<ValidationError>) -> Value {
    match value.as_bool() {
        Some(b) => Value::Bool(b),
        None => {
            errors.push(ValidationError::new(path, "expected boolean"));
            Value::Null
        }
    }
}

fn validate_enum(path: &str, values: &[String], value: &Value, errors: &mut Vec<ValidationError>) -> Value {
    match value.as_str() {
        Some(s) if values.iter().any(|v| v == s) => Value::String(s.to_string()),
        Some(s) => {
            errors.push(ValidationError::new(
                path,
                format!("'{s}' is not one of {values:?}"),
            ));
            Value::Null
        }
        None => {
            errors.push(ValidationError::new(path, "expected string enum member"));
            Value::Null
        }
    }
}

/// `oneOf` must discriminate deterministically (§4.A edge cases): if more
/// than one branch validates cleanly, it is ambiguous unless a
/// `discriminator` field name picks exactly one.
fn validate_one_of(
    path: &str,
    branches: &[Schema],
    discriminator: Option<&str>,
    value: &Value,
    refs: &HashMap<String, Schema>,
    errors: &mut Vec<ValidationError>,
) -> Value {
    if let Some(field) = discriminator {
        if let Some(tag) = value.get(field).and_then(Value::as_str) {
            let matching: Vec<&Schema> = branches
                .iter()
                .filter(|b| branch_discriminator_matches(b, field, tag))
                .collect();
            if matching.len() == 1 {
                let mut sub_errors = Vec::new();
                let normalized = validate_at(path, matching[0], value, refs, &mut sub_errors);
                errors.extend(sub_errors);
                return normalized;
            }
        }
    }

    let mut matches = Vec::new();
    for branch in branches {
        let mut sub_errors = Vec::new();
        let normalized = validate_at(path, branch, value, refs, &mut sub_errors);
        if sub_errors.is_empty() {
            matches.push(normalized);
        }
    }

    match matches.len() {
        1 => matches.into_iter().next().unwrap(),
        0 => {
            errors.push(ValidationError::new(path, "value matches no branch of oneOf"));
            Value::Null
        }
        _ => {
            errors.push(ValidationError::new(
                path,
                "value matches more than one branch of oneOf and no discriminator resolves it",
            ));
            Value::Null
        }
    }
}

fn branch_discriminator_matches(branch: &Schema, field: &str, tag: &str) -> bool {
    let Schema::Object { fields, .. } = branch else {
        return false;
    };
    match fields.get(field).map(|f| &f.schema) {
        Some(Schema::Enum { values }) => values.iter().any(|v| v == tag),
        _ => false,
    }
}
