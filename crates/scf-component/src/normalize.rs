//! Key normalization from the declarative (`PascalCase`) schema to the
//! provider (`lowerCamel`) schema.
//!
//! Everything here is pure: inputs are borrowed and new nodes are built.

use serde_json::{Map, Value};

/// Lower-cases the first character of `key`, leaving the rest untouched.
pub fn lower_first(key: &str) -> String {
    let mut chars = key.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Rewrites every mapping key with [`lower_first`], recursing through
/// mappings and sequences. Scalars and nulls pass through unchanged, unknown
/// keys are kept, and ordering is preserved.
pub fn normalize_keys(node: &Value) -> Value {
    match node {
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(key, value)| (lower_first(key), normalize_keys(value)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(normalize_keys).collect()),
        Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_) => node.clone(),
    }
}

/// Normalizes a mapping node, yielding an empty map for anything else.
pub fn normalize_map(node: &Value) -> Map<String, Value> {
    match normalize_keys(node) {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

/// Prepares one API Gateway endpoint for the provider.
///
/// The provider spells two endpoint fields differently from the generic rule:
/// parameter `Description` becomes `desc`, and the endpoint is wrapped under
/// `param` in place of its `Parameters` list. Both renames happen before the
/// generic pass.
pub fn transform_endpoint(endpoint: &Value) -> Value {
    let Value::Object(fields) = endpoint else {
        return normalize_keys(endpoint);
    };
    let Some(parameters) = fields.get("Parameters").filter(|p| !p.is_null()) else {
        return normalize_keys(endpoint);
    };

    let rewritten_parameters = match parameters {
        Value::Array(items) => Value::Array(items.iter().map(rename_description).collect()),
        other => other.clone(),
    };

    let wrapped: Map<String, Value> = fields
        .iter()
        .map(|(key, value)| {
            if key == "Parameters" {
                (key.clone(), rewritten_parameters.clone())
            } else {
                (key.clone(), value.clone())
            }
        })
        .collect();

    let mut rewritten: Map<String, Value> = fields
        .iter()
        .filter(|(key, _)| key.as_str() != "Parameters")
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();
    rewritten.insert("param".to_string(), Value::Object(wrapped));

    normalize_keys(&Value::Object(rewritten))
}

fn rename_description(parameter: &Value) -> Value {
    let Value::Object(fields) = parameter else {
        return parameter.clone();
    };
    let Some(description) = fields.get("Description") else {
        return parameter.clone();
    };

    let mut renamed: Map<String, Value> = fields
        .iter()
        .filter(|(key, _)| key.as_str() != "Description")
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();
    renamed.insert("desc".to_string(), description.clone());
    Value::Object(renamed)
}
