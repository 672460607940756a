// Structural parameter validation
//
// Checks raw call parameters against a tool's declared input schema before
// anything else runs. Collects every violation rather than stopping at the
// first, so the caller can fix all of them in one round trip.

use serde_json::Value;

use crate::tools::types::{ToolInputSchema, ValidationResult};

/// Validate raw parameters against a tool's input schema.
pub fn validate_params(schema: &ToolInputSchema, params: &Value) -> ValidationResult {
    let mut errors = Vec::new();

    let obj = match params {
        Value::Object(map) => map,
        Value::Null => {
            // Treat null as an empty object; only required fields can fail.
            for name in &schema.required {
                errors.push(format!("missing required parameter '{}'", name));
            }
            return finish(errors);
        }
        other => {
            errors.push(format!(
                "parameters must be an object, got {}",
                type_name(other)
            ));
            return finish(errors);
        }
    };

    for name in &schema.required {
        if !obj.contains_key(name) {
            errors.push(format!("missing required parameter '{}'", name));
        }
    }

    if let Value::Object(props) = &schema.properties {
        for (name, value) in obj {
            let Some(decl) = props.get(name) else {
                continue; // Unknown parameters are passed through untouched.
            };
            if let Some(expected) = decl.get("type").and_then(|t| t.as_str()) {
                if !type_matches(expected, value) {
                    errors.push(format!(
                        "parameter '{}' must be of type {}, got {}",
                        name,
                        expected,
                        type_name(value)
                    ));
                }
            }
        }
    }

    finish(errors)
}

fn finish(errors: Vec<String>) -> ValidationResult {
    if errors.is_empty() {
        ValidationResult::ok()
    } else {
        ValidationResult::invalid(errors)
    }
}

fn type_matches(expected: &str, value: &Value) -> bool {
    match expected {
        "string" => value.is_string(),
        "number" => value.is_number(),
        "integer" => value.is_i64() || value.is_u64(),
        "boolean" => value.is_boolean(),
        "array" => value.is_array(),
        "object" => value.is_object(),
        "null" => value.is_null(),
        // Unknown declared types are not enforced.
        _ => true,
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
