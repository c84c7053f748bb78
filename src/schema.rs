//! Response-body schema inference, HATEOAS link discovery, and error-body
//! parameter extraction.
//!
//! `serde_json::Value` already is the tagged sum over
//! `{Null, Bool, Number, String, Array, Object}` this module needs, so no
//! separate data-shape enum is introduced.

use regex::Regex;
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::sync::LazyLock;

/// Derives a compact JSON-Schema-like description of `data`. Arrays report
/// their length and the schema of their first element only, as a
/// representative sample rather than a union over all elements.
#[must_use]
pub fn extract_schema(data: &Value) -> Value {
    match data {
        Value::Null => serde_json::json!({"type": "null"}),
        Value::Bool(_) => serde_json::json!({"type": "boolean"}),
        Value::Number(n) => {
            if n.is_i64() || n.is_u64() {
                serde_json::json!({"type": "integer"})
            } else {
                serde_json::json!({"type": "number"})
            }
        }
        Value::String(s) => {
            let mut schema = Map::new();
            schema.insert("type".to_string(), Value::String("string".to_string()));
            if !s.is_empty() {
                schema.insert("example_length".to_string(), Value::from(s.chars().count()));
            }
            Value::Object(schema)
        }
        Value::Array(items) => {
            let mut schema = Map::new();
            schema.insert("type".to_string(), Value::String("array".to_string()));
            schema.insert("length".to_string(), Value::from(items.len()));
            if let Some(first) = items.first() {
                schema.insert("items".to_string(), extract_schema(first));
            }
            Value::Object(schema)
        }
        Value::Object(props) => {
            let mut properties = Map::new();
            for (key, value) in props {
                properties.insert(key.clone(), extract_schema(value));
            }
            serde_json::json!({
                "type": "object",
                "properties": Value::Object(properties),
                "field_count": props.len(),
            })
        }
    }
}

/// Parses `body` as JSON and derives a schema from it; returns an empty
/// object for blank or non-JSON bodies rather than erroring, since a failed
/// parse here just means "nothing learned from this response."
#[must_use]
pub fn extract_schema_from_body(body: &str) -> Value {
    if body.trim().is_empty() {
        return serde_json::json!({});
    }
    serde_json::from_str::<Value>(body)
        .map_or_else(|_| serde_json::json!({}), |data| extract_schema(&data))
}

const HATEOAS_KEYS: [&str; 10] = [
    "href", "url", "link", "self", "next", "prev", "first", "last", "related", "_links",
];

/// Walks `data` looking for HATEOAS-style links: absolute URLs under
/// `base_url`, or root-relative API paths. Array traversal is capped at the
/// first 50 elements to bound the walk on large result sets.
#[must_use]
pub fn extract_links(data: &Value, base_url: &str) -> BTreeSet<String> {
    let mut links = BTreeSet::new();
    walk_for_links(data, &mut links, base_url);
    links
}

fn walk_for_links(data: &Value, links: &mut BTreeSet<String>, base_url: &str) {
    match data {
        Value::String(s) => {
            if (s.starts_with("http://") || s.starts_with("https://"))
                && !base_url.is_empty()
                && s.starts_with(base_url)
            {
                links.insert(s.clone());
            } else if s.starts_with('/') && !s.starts_with("//") {
                links.insert(s.clone());
            }
        }
        Value::Object(map) => {
            for key in HATEOAS_KEYS {
                if let Some(value) = map.get(key) {
                    walk_for_links(value, links, base_url);
                }
            }
            for value in map.values() {
                walk_for_links(value, links, base_url);
            }
        }
        Value::Array(items) => {
            for item in items.iter().take(50) {
                walk_for_links(item, links, base_url);
            }
        }
        _ => {}
    }
}

static PARAM_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"(?i)(?:missing|required)\s+(?:field|param(?:eter)?)[:\s]+['\x22]?(\w+)['\x22]?").unwrap(),
        Regex::new(r"(?i)['\x22](\w+)['\x22]\s+(?:is|are)\s+required").unwrap(),
        Regex::new(r"(?i)(?:field|param(?:eter)?)\s+['\x22](\w+)['\x22]\s+(?:is\s+)?(?:missing|required)").unwrap(),
        Regex::new(r"(?i)expected\s+['\x22](\w+)['\x22]").unwrap(),
    ]
});

/// Scans an error-response body for parameter-name hints ("missing required
/// field: email", "'name' is required", ...). Returns `(name, required)`
/// pairs deduplicated by name, first match wins, in the order the patterns
/// and matches were found.
#[must_use]
pub fn extract_params_from_error(body: &str) -> Vec<(String, bool)> {
    let mut seen = BTreeSet::new();
    let mut params = Vec::new();
    if body.is_empty() {
        return params;
    }
    for pattern in PARAM_PATTERNS.iter() {
        for capture in pattern.captures_iter(body) {
            let Some(name) = capture.get(1) else { continue };
            let name = name.as_str();
            if name.chars().count() > 1 && seen.insert(name.to_string()) {
                params.push((name.to_string(), true));
            }
        }
    }
    params
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_schemas() {
        assert_eq!(extract_schema(&Value::Null), serde_json::json!({"type": "null"}));
        assert_eq!(extract_schema(&Value::Bool(true)), serde_json::json!({"type": "boolean"}));
        assert_eq!(extract_schema(&serde_json::json!(5)), serde_json::json!({"type": "integer"}));
        assert_eq!(extract_schema(&serde_json::json!(5.5)), serde_json::json!({"type": "number"}));
    }

    #[test]
    fn array_schema_uses_first_element_as_representative() {
        let schema = extract_schema(&serde_json::json!([{"id": 1}, {"id": 2}]));
        assert_eq!(schema["type"], "array");
        assert_eq!(schema["length"], 2);
        assert_eq!(schema["items"]["type"], "object");
    }

    #[test]
    fn object_schema_lists_field_count() {
        let schema = extract_schema(&serde_json::json!({"a": 1, "b": "x"}));
        assert_eq!(schema["field_count"], 2);
    }

    #[test]
    fn invalid_body_yields_empty_schema() {
        assert_eq!(extract_schema_from_body("not json"), serde_json::json!({}));
        assert_eq!(extract_schema_from_body("  "), serde_json::json!({}));
    }

    #[test]
    fn links_are_found_in_hal_style_and_relative_paths() {
        let data = serde_json::json!({
            "_links": {"self": {"href": "/api/users/1"}},
            "next": "/api/users?page=2",
            "name": "not a link",
        });
        let links = extract_links(&data, "");
        assert!(links.contains("/api/users/1"));
        assert!(links.contains("/api/users?page=2"));
        assert!(!links.contains("not a link"));
    }

    #[test]
    fn error_body_params_are_deduped_first_match_wins() {
        let body = "missing required field: email. Also, 'email' is required.";
        let params = extract_params_from_error(body);
        assert_eq!(params, vec![("email".to_string(), true)]);
    }
}
