//! A JSON Schema subset.
//!
//! Supported keywords: `type`, `enum`, `const`, `required`, `properties`,
//! `additionalProperties` (boolean or schema), `items`, `minItems`,
//! `maxItems`, `minimum`, `maximum`, `minLength`, `maxLength` and `pattern`.
//! Annotations (`$schema`, `title`, `description` and the like) are allowed
//! anywhere, and reserved `_` fields at the root of a stored schema document.
//! Any other keyword makes the schema unusable: [`unsupported_keywords`]
//! reports it and [`validate`] rejects every instance.

use docgate_persistence::query::values_equal;
use regex::Regex;
use serde_json::Value;

const SUPPORTED: &[&str] = &[
    "type",
    "enum",
    "const",
    "required",
    "properties",
    "additionalProperties",
    "items",
    "minItems",
    "maxItems",
    "minimum",
    "maximum",
    "minLength",
    "maxLength",
    "pattern",
];

const ANNOTATIONS: &[&str] = &[
    "$schema",
    "$id",
    "id",
    "$comment",
    "title",
    "description",
    "default",
    "examples",
];

/// Validates `instance` against `schema`, returning every violation.
///
/// A schema using unsupported keywords rejects every instance.
pub fn validate(schema: &Value, instance: &Value) -> Vec<String> {
    let unsupported = unsupported_keywords(schema);
    if !unsupported.is_empty() {
        return unsupported;
    }
    let mut errors = Vec::new();
    validate_at(schema, instance, "$", &mut errors);
    errors
}

/// Lists the keywords of `schema` this validator cannot evaluate.
pub fn unsupported_keywords(schema: &Value) -> Vec<String> {
    let mut found = Vec::new();
    collect_unsupported(schema, "$", true, &mut found);
    found
}

fn collect_unsupported(schema: &Value, path: &str, root: bool, found: &mut Vec<String>) {
    let Some(schema) = schema.as_object() else {
        if !schema.is_boolean() {
            found.push(format!("{}: a schema must be an object or a boolean", path));
        }
        return;
    };
    for (keyword, value) in schema {
        if ANNOTATIONS.contains(&keyword.as_str()) || (root && keyword.starts_with('_')) {
            continue;
        }
        if !SUPPORTED.contains(&keyword.as_str()) {
            found.push(format!("{}: unsupported keyword {}", path, keyword));
            continue;
        }
        match (keyword.as_str(), value) {
            ("properties", Value::Object(properties)) => {
                for (name, sub) in properties {
                    collect_unsupported(sub, &format!("{}.properties.{}", path, name), false, found);
                }
            }
            ("properties", _) => found.push(format!("{}: properties must be an object", path)),
            ("items" | "additionalProperties", sub) => {
                collect_unsupported(sub, &format!("{}.{}", path, keyword), false, found);
            }
            _ => {}
        }
    }
}

fn validate_at(schema: &Value, instance: &Value, path: &str, errors: &mut Vec<String>) {
    let Some(schema) = schema.as_object() else {
        if schema == &Value::Bool(false) {
            errors.push(format!("{}: no value is allowed", path));
        }
        return;
    };

    if let Some(expected) = schema.get("type") {
        let allowed: Vec<&str> = match expected {
            Value::String(t) => vec![t.as_str()],
            Value::Array(ts) => ts.iter().filter_map(Value::as_str).collect(),
            _ => Vec::new(),
        };
        if !allowed.is_empty() && !allowed.iter().any(|t| has_type(instance, t)) {
            errors.push(format!(
                "{}: expected {}, found {}",
                path,
                allowed.join(" or "),
                type_name(instance)
            ));
            return;
        }
    }

    if let Some(Value::Array(options)) = schema.get("enum") {
        if !options.iter().any(|o| values_equal(o, instance)) {
            errors.push(format!("{}: value is not one of the allowed values", path));
        }
    }
    if let Some(constant) = schema.get("const") {
        if !values_equal(constant, instance) {
            errors.push(format!("{}: value must be {}", path, constant));
        }
    }

    match instance {
        Value::Object(fields) => {
            if let Some(Value::Array(required)) = schema.get("required") {
                for name in required.iter().filter_map(Value::as_str) {
                    if !fields.contains_key(name) {
                        errors.push(format!("{}: missing required property {}", path, name));
                    }
                }
            }
            let properties = schema.get("properties").and_then(Value::as_object);
            for (name, value) in fields {
                let child = format!("{}.{}", path, name);
                match properties.and_then(|p| p.get(name)) {
                    Some(sub) => validate_at(sub, value, &child, errors),
                    None => match schema.get("additionalProperties") {
                        Some(Value::Bool(false)) => {
                            errors.push(format!("{}: additional property {} is not allowed", path, name));
                        }
                        Some(sub @ Value::Object(_)) => validate_at(sub, value, &child, errors),
                        _ => {}
                    },
                }
            }
        }
        Value::Array(items) => {
            if let Some(min) = schema.get("minItems").and_then(Value::as_u64) {
                if (items.len() as u64) < min {
                    errors.push(format!("{}: expected at least {} items", path, min));
                }
            }
            if let Some(max) = schema.get("maxItems").and_then(Value::as_u64) {
                if (items.len() as u64) > max {
                    errors.push(format!("{}: expected at most {} items", path, max));
                }
            }
            if let Some(item_schema) = schema.get("items") {
                for (i, item) in items.iter().enumerate() {
                    validate_at(item_schema, item, &format!("{}[{}]", path, i), errors);
                }
            }
        }
        Value::Number(n) => {
            let n = n.as_f64().unwrap_or(f64::NAN);
            if let Some(min) = schema.get("minimum").and_then(Value::as_f64) {
                if n < min {
                    errors.push(format!("{}: {} is less than {}", path, n, min));
                }
            }
            if let Some(max) = schema.get("maximum").and_then(Value::as_f64) {
                if n > max {
                    errors.push(format!("{}: {} is greater than {}", path, n, max));
                }
            }
        }
        Value::String(s) => {
            let len = s.chars().count() as u64;
            if let Some(min) = schema.get("minLength").and_then(Value::as_u64) {
                if len < min {
                    errors.push(format!("{}: shorter than {} characters", path, min));
                }
            }
            if let Some(max) = schema.get("maxLength").and_then(Value::as_u64) {
                if len > max {
                    errors.push(format!("{}: longer than {} characters", path, max));
                }
            }
            if let Some(pattern) = schema.get("pattern").and_then(Value::as_str) {
                match Regex::new(pattern) {
                    Ok(re) if !re.is_match(s) => {
                        errors.push(format!("{}: does not match {}", path, pattern));
                    }
                    Ok(_) => {}
                    Err(e) => errors.push(format!("{}: invalid pattern {}: {}", path, pattern, e)),
                }
            }
        }
        _ => {}
    }
}

fn has_type(instance: &Value, expected: &str) -> bool {
    match expected {
        "object" => instance.is_object(),
        "array" => instance.is_array(),
        "string" => instance.is_string(),
        "boolean" => instance.is_boolean(),
        "null" => instance.is_null(),
        "number" => instance.is_number(),
        "integer" => match instance {
            Value::Number(n) => n.is_i64() || n.is_u64() || n.as_f64().is_some_and(|f| f.fract() == 0.0),
            _ => false,
        },
        _ => false,
    }
}

fn type_name(instance: &Value) -> &'static str {
    match instance {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
