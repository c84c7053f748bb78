//! Specification scanner (E): locates and parses a published API description
//! document, then extracts endpoints and parameters from it.

use crate::http::HttpWorker;
use crate::store::models::ParamLocation;
use indexmap::IndexSet;
use serde_json::{Map, Value};

/// Well-known specification paths, probed in this order until one yields a
/// JSON document carrying `paths`, `swagger`, or `openapi`.
pub const SPEC_PATHS: &[&str] = &[
    "/swagger.json",
    "/openapi.json",
    "/api-docs",
    "/api-docs.json",
    "/swagger.yaml",
    "/openapi.yaml",
    "/docs",
    "/swagger",
    "/swagger-ui",
    "/api/swagger.json",
    "/api/openapi.json",
    "/v1/swagger.json",
    "/v2/swagger.json",
    "/.well-known/openapi",
];

const KNOWN_METHODS: &[&str] = &[
    "get", "head", "post", "put", "patch", "delete", "options",
];

/// A discovered specification document: the URL it was fetched from and the
/// parsed document.
pub struct SpecDocument {
    pub url: String,
    pub document: Value,
}

/// One endpoint extracted from a specification document.
#[derive(Debug, Clone)]
pub struct SpecEndpoint {
    pub path: String,
    pub methods: Vec<String>,
    pub description: String,
    pub parameters: Vec<SpecParameter>,
}

#[derive(Debug, Clone)]
pub struct SpecParameter {
    pub name: String,
    pub location: ParamLocation,
    pub required: bool,
    pub param_type: String,
}

/// Requests [`SPEC_PATHS`] in order against `base_url` and returns the first
/// one whose body parses as JSON and looks like an API description document.
///
/// # Errors
/// Returns an error only if the underlying HTTP worker itself errors.
pub async fn scan(
    base_url: &str,
    http: &HttpWorker,
    should_stop: &(dyn Fn() -> bool + Sync),
) -> crate::error::Result<Option<SpecDocument>> {
    for suffix in SPEC_PATHS {
        if should_stop() {
            break;
        }
        let url = format!("{base_url}{suffix}");
        let response = http.get(&url).await?;
        if !response.ok() || response.body.trim().is_empty() {
            continue;
        }
        let Ok(document) = serde_json::from_str::<Value>(&response.body) else {
            continue;
        };
        if looks_like_spec(&document) {
            return Ok(Some(SpecDocument { url, document }));
        }
    }
    Ok(None)
}

fn looks_like_spec(document: &Value) -> bool {
    let Some(map) = document.as_object() else {
        return false;
    };
    map.contains_key("paths") || map.contains_key("swagger") || map.contains_key("openapi")
}

/// Service-level metadata worth stamping from a spec document: title,
/// version, description, and the spec URL itself.
#[must_use]
pub fn extract_metadata(spec: &SpecDocument) -> Map<String, Value> {
    let mut metadata = Map::new();
    metadata.insert("openapi_spec_url".to_string(), Value::String(spec.url.clone()));
    if let Some(info) = spec.document.get("info").and_then(Value::as_object) {
        for (key, out_key) in [
            ("title", "api_title"),
            ("version", "api_version"),
            ("description", "api_description"),
        ] {
            if let Some(Value::String(s)) = info.get(key) {
                if !s.is_empty() {
                    metadata.insert(out_key.to_string(), Value::String(s.clone()));
                }
            }
        }
    }
    metadata
}

/// Extracts every endpoint described under the document's `paths` object,
/// concatenating each relative path with `basePath` when present.
#[must_use]
pub fn extract_endpoints(spec: &SpecDocument) -> Vec<SpecEndpoint> {
    let Some(paths) = spec.document.get("paths").and_then(Value::as_object) else {
        return Vec::new();
    };
    let base_path = spec
        .document
        .get("basePath")
        .and_then(Value::as_str)
        .unwrap_or("");

    paths
        .iter()
        .map(|(relative_path, methods_object)| {
            extract_one_endpoint(base_path, relative_path, methods_object)
        })
        .collect()
}

fn extract_one_endpoint(base_path: &str, relative_path: &str, methods_object: &Value) -> SpecEndpoint {
    let full_path = format!("{}{}", base_path.trim_end_matches('/'), relative_path);
    let Some(methods_map) = methods_object.as_object() else {
        return SpecEndpoint {
            path: full_path,
            methods: Vec::new(),
            description: String::new(),
            parameters: Vec::new(),
        };
    };

    let methods: Vec<String> = KNOWN_METHODS
        .iter()
        .filter(|m| methods_map.contains_key(**m))
        .map(|m| m.to_uppercase())
        .collect();

    let description = methods_map
        .values()
        .find_map(|op| {
            op.get("summary")
                .or_else(|| op.get("description"))
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
        })
        .unwrap_or_default()
        .to_string();

    let mut seen: IndexSet<(String, String)> = IndexSet::new();
    let mut parameters = Vec::new();
    let mut collect_params = |params: &Value| {
        let Some(array) = params.as_array() else { return };
        for param in array {
            let Some(param) = parse_parameter(param) else {
                continue;
            };
            let key = (param.name.clone(), param.location.as_str().to_string());
            if seen.insert(key) {
                parameters.push(param);
            }
        }
    };
    if let Some(top_level) = methods_object.get("parameters") {
        collect_params(top_level);
    }
    for op in methods_map.values() {
        if let Some(params) = op.get("parameters") {
            collect_params(params);
        }
    }

    SpecEndpoint {
        path: full_path,
        methods,
        description,
        parameters,
    }
}

fn parse_parameter(param: &Value) -> Option<SpecParameter> {
    let name = param.get("name").and_then(Value::as_str)?.to_string();
    let location = param
        .get("in")
        .and_then(Value::as_str)
        .map_or(ParamLocation::Query, ParamLocation::parse);
    let required = param.get("required").and_then(Value::as_bool).unwrap_or(false);
    let param_type = param
        .get("type")
        .and_then(Value::as_str)
        .or_else(|| param.get("schema").and_then(|s| s.get("type")).and_then(Value::as_str))
        .unwrap_or("string")
        .to_string();
    Some(SpecParameter {
        name,
        location,
        required,
        param_type,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(json: Value) -> SpecDocument {
        SpecDocument {
            url: "https://example.com/openapi.json".to_string(),
            document: json,
        }
    }

    #[test]
    fn looks_like_spec_requires_a_known_key() {
        assert!(looks_like_spec(&serde_json::json!({"paths": {}})));
        assert!(looks_like_spec(&serde_json::json!({"swagger": "2.0"})));
        assert!(!looks_like_spec(&serde_json::json!({"hello": "world"})));
        assert!(!looks_like_spec(&serde_json::json!([1, 2, 3])));
    }

    #[test]
    fn extracts_methods_and_parameters() {
        let spec = doc(serde_json::json!({
            "swagger": "2.0",
            "paths": {
                "/items": {
                    "get": {
                        "summary": "List items",
                        "parameters": [
                            {"name": "limit", "in": "query", "required": false, "type": "integer"}
                        ]
                    }
                }
            }
        }));
        let endpoints = extract_endpoints(&spec);
        assert_eq!(endpoints.len(), 1);
        assert_eq!(endpoints[0].path, "/items");
        assert_eq!(endpoints[0].methods, vec!["GET".to_string()]);
        assert_eq!(endpoints[0].description, "List items");
        assert_eq!(endpoints[0].parameters.len(), 1);
        assert_eq!(endpoints[0].parameters[0].name, "limit");
        assert_eq!(endpoints[0].parameters[0].location, ParamLocation::Query);
        assert!(!endpoints[0].parameters[0].required);
    }

    #[test]
    fn base_path_is_prefixed() {
        let spec = doc(serde_json::json!({
            "swagger": "2.0",
            "basePath": "/api/v1",
            "paths": {"/items": {"get": {}}}
        }));
        let endpoints = extract_endpoints(&spec);
        assert_eq!(endpoints[0].path, "/api/v1/items");
    }

    #[test]
    fn parameters_dedupe_by_name_and_location_first_occurrence_wins() {
        let spec = doc(serde_json::json!({
            "swagger": "2.0",
            "paths": {
                "/items": {
                    "parameters": [{"name": "id", "in": "query", "type": "string"}],
                    "get": {
                        "parameters": [{"name": "id", "in": "query", "type": "integer", "required": true}]
                    }
                }
            }
        }));
        let endpoints = extract_endpoints(&spec);
        assert_eq!(endpoints[0].parameters.len(), 1);
        assert_eq!(endpoints[0].parameters[0].param_type, "string");
    }

    #[test]
    fn metadata_pulls_info_fields() {
        let spec = doc(serde_json::json!({
            "openapi": "3.0.0",
            "info": {"title": "Demo API", "version": "1.0"},
            "paths": {}
        }));
        let metadata = extract_metadata(&spec);
        assert_eq!(metadata["api_title"], "Demo API");
        assert_eq!(metadata["api_version"], "1.0");
        assert_eq!(metadata["openapi_spec_url"], "https://example.com/openapi.json");
    }
}
