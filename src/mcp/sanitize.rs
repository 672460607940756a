// Tool name and schema normalization for externally-discovered tools
//
// External servers declare whatever names and schemas they like; the LLM
// function-calling interface does not. Names are clamped to a safe charset
// and length, and schemas are cleaned of a common external bug (conflicting
// defaults across union branches) before registration.

use serde_json::{Map, Value};

/// Longest tool name the LLM interface accepts.
const MAX_NAME_LEN: usize = 63;

/// Replace every character outside `[A-Za-z0-9_.-]` with `_`, then clamp the
/// length. Total: any input, including empty, maps to a valid identifier.
pub fn normalize_tool_name(raw: &str) -> String {
    fit_name_length(clamp_charset(raw))
}

/// Charset clamp alone, without the length fit. Collision prefixes go
/// between the two steps so the server prefix stays visible after an
/// over-long name is collapsed.
pub fn clamp_charset(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '.' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();

    if cleaned.is_empty() {
        "_".to_string()
    } else {
        cleaned
    }
}

/// Collapse the middle of an over-long name, keeping a recognizable prefix
/// and suffix. Input must already be ASCII-only (post charset clamp).
pub fn fit_name_length(name: String) -> String {
    if name.len() <= MAX_NAME_LEN {
        return name;
    }
    format!("{}___{}", &name[..28], &name[name.len() - 32..])
}

/// Pure recursive schema cleanup, returning a new tree.
///
/// Wherever a node carries `anyOf` union alternatives, `default` is dropped
/// from the node itself and from every alternative; conflicting defaults
/// across branches are a common external-schema bug. Recurses through
/// `properties`, `items` and each union branch. The input is never mutated:
/// the same sub-schema object may be shared across several tool definitions.
pub fn sanitize_schema(schema: &Value) -> Value {
    match schema {
        Value::Object(map) => Value::Object(sanitize_object(map)),
        Value::Array(items) => Value::Array(items.iter().map(sanitize_schema).collect()),
        other => other.clone(),
    }
}

fn sanitize_object(map: &Map<String, Value>) -> Map<String, Value> {
    let has_union = map.contains_key("anyOf");
    let mut out = Map::with_capacity(map.len());

    for (key, value) in map {
        if has_union && key == "default" {
            continue;
        }
        let sanitized = match key.as_str() {
            "anyOf" => sanitize_union(value),
            "items" => sanitize_schema(value),
            "properties" => match value {
                Value::Object(props) => Value::Object(
                    props
                        .iter()
                        .map(|(name, prop)| (name.clone(), sanitize_schema(prop)))
                        .collect(),
                ),
                other => other.clone(),
            },
            _ => value.clone(),
        };
        out.insert(key.clone(), sanitized);
    }

    out
}

fn sanitize_union(branches: &Value) -> Value {
    match branches {
        Value::Array(alts) => Value::Array(
            alts.iter()
                .map(|branch| {
                    let mut sanitized = sanitize_schema(branch);
                    if let Some(obj) = sanitized.as_object_mut() {
                        obj.remove("default");
                    }
                    sanitized
                })
                .collect(),
        ),
        other => other.clone(),
    }
}
