//! Export (M): Markdown and JSON rendering of a service's discovered surface.

use crate::error::{Error, Result};
use crate::store::Store;
use serde_json::{json, Value};
use std::fmt::Write as _;

/// Renders the OpenAPI-ish JSON export described in §4.13: service metadata,
/// aggregate stats, and a `paths` map keyed by endpoint path.
///
/// # Errors
/// Returns an error if the service doesn't exist or a database read fails.
pub async fn json(store: &Store, service_name: &str) -> Result<Value> {
    let service = store
        .get_service(service_name)
        .await?
        .ok_or_else(|| Error::service_not_found(service_name))?;
    let stats = store.get_service_stats(service.id).await?;
    let endpoints = store.get_endpoints(service.id).await?;

    let mut paths = serde_json::Map::new();
    for endpoint in &endpoints {
        let parameters = store.get_parameters(endpoint.id).await?;
        let responses = store.get_responses(endpoint.id).await?;
        paths.insert(
            endpoint.path.clone(),
            json!({
                "methods": endpoint.methods,
                "status_codes": endpoint.status_codes,
                "content_types": endpoint.content_types,
                "auth_required": endpoint.auth_required,
                "auth_type_hint": endpoint.auth_type_hint,
                "discovered_by": endpoint.discovered_by,
                "parameters": parameters.iter().map(|p| json!({
                    "name": p.name,
                    "location": p.location.as_str(),
                    "type": p.param_type,
                    "required": p.required,
                    "example_value": p.example_value,
                })).collect::<Vec<_>>(),
                "responses": responses.iter().map(|r| json!({
                    "method": r.method,
                    "status_code": r.status_code,
                    "content_type": r.content_type,
                    "schema": r.body_schema,
                    "elapsed_ms": r.elapsed_ms,
                })).collect::<Vec<_>>(),
            }),
        );
    }

    Ok(json!({
        "service": service.name,
        "base_url": service.base_url,
        "server_header": service.server_header,
        "discovered_at": service.discovered_at,
        "last_probed": service.last_probed,
        "metadata": service.metadata,
        "stats": {
            "endpoints": stats.endpoints,
            "responses": stats.responses,
            "parameters": stats.parameters,
        },
        "paths": paths,
    }))
}

/// Renders a human-readable Markdown report: a service header, a summary
/// table, and one section per endpoint.
///
/// # Errors
/// Returns an error if the service doesn't exist or a database read fails.
pub async fn markdown(store: &Store, service_name: &str) -> Result<String> {
    let service = store
        .get_service(service_name)
        .await?
        .ok_or_else(|| Error::service_not_found(service_name))?;
    let stats = store.get_service_stats(service.id).await?;
    let endpoints = store.get_endpoints(service.id).await?;

    let mut out = String::new();
    let _ = writeln!(out, "# API Discovery Report: {}", service.name);
    let _ = writeln!(out);
    let _ = writeln!(out, "- Base URL: {}", service.base_url);
    if !service.server_header.is_empty() {
        let _ = writeln!(out, "- Server: {}", service.server_header);
    }
    let _ = writeln!(out, "- Discovered at: {}", service.discovered_at);
    if let Some(last_probed) = service.last_probed {
        let _ = writeln!(out, "- Last probed: {last_probed}");
    }
    let _ = writeln!(
        out,
        "- Endpoints: {} · Responses: {} · Parameters: {}",
        stats.endpoints, stats.responses, stats.parameters
    );
    let _ = writeln!(out);

    let _ = writeln!(out, "## Endpoints");
    let _ = writeln!(out);
    let _ = writeln!(out, "| Path | Methods | Status codes | Auth |");
    let _ = writeln!(out, "|---|---|---|---|");
    for endpoint in &endpoints {
        let methods = endpoint.methods.iter().cloned().collect::<Vec<_>>().join(", ");
        let codes = endpoint
            .status_codes
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        let auth = if endpoint.auth_required {
            if endpoint.auth_type_hint.is_empty() {
                "required".to_string()
            } else {
                format!("required ({})", endpoint.auth_type_hint)
            }
        } else {
            "-".to_string()
        };
        let _ = writeln!(out, "| `{}` | {methods} | {codes} | {auth} |", endpoint.path);
    }

    for endpoint in &endpoints {
        let parameters = store.get_parameters(endpoint.id).await?;
        let responses = store.get_responses(endpoint.id).await?;
        if parameters.is_empty() && responses.is_empty() {
            continue;
        }
        let _ = writeln!(out);
        let _ = writeln!(out, "### `{}`", endpoint.path);
        if !parameters.is_empty() {
            let _ = writeln!(out);
            let _ = writeln!(out, "Parameters:");
            for param in &parameters {
                let _ = writeln!(
                    out,
                    "- `{}` ({}, {}{})",
                    param.name,
                    param.location.as_str(),
                    param.param_type,
                    if param.required { ", required" } else { "" }
                );
            }
        }
        if let Some(example) = responses.first() {
            let _ = writeln!(out);
            let _ = writeln!(out, "Example response shape ({}):", example.status_code);
            let _ = writeln!(
                out,
                "```json\n{}\n```",
                serde_json::to_string_pretty(&example.body_schema).unwrap_or_default()
            );
        }
    }

    Ok(out)
}

/// `--format pdf` degrades to the Markdown report, matching the original's
/// treatment of PDF rendering as an external, non-vendored tool.
///
/// # Errors
/// Returns an error if the service doesn't exist or a database read fails.
pub async fn pdf_fallback(store: &Store, service_name: &str) -> Result<String> {
    markdown(store, service_name).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::models::ParamLocation;
    use std::collections::BTreeSet;

    async fn seeded_store() -> (Store, i64) {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("db.sqlite");
        std::mem::forget(dir); // keep the directory alive for the test's lifetime
        let store = Store::connect(&db_path).await.unwrap();
        let svc = store
            .upsert_service("example", "https://example.com", "nginx", "", None)
            .await
            .unwrap();
        let methods: BTreeSet<String> = std::iter::once("GET".to_string()).collect();
        let codes: BTreeSet<i64> = std::iter::once(200).collect();
        let ep = store
            .upsert_endpoint(svc, "/users", &methods, &codes, false, "", &BTreeSet::new(), "wordlist")
            .await
            .unwrap();
        store
            .upsert_parameter(ep, "limit", "integer", ParamLocation::Query, false, "10")
            .await
            .unwrap();
        store
            .add_response(
                ep,
                "GET",
                200,
                &json!({}),
                &json!({"type": "array", "length": 2}),
                "[]",
                "application/json",
                12,
            )
            .await
            .unwrap();
        (store, svc)
    }

    #[tokio::test]
    async fn json_export_includes_paths_and_stats() {
        let (store, _) = seeded_store().await;
        let doc = json(&store, "example").await.unwrap();
        assert_eq!(doc["service"], "example");
        assert_eq!(doc["stats"]["endpoints"], 1);
        assert!(doc["paths"]["/users"]["methods"].as_array().unwrap().contains(&json!("GET")));
    }

    #[tokio::test]
    async fn json_export_errors_on_unknown_service() {
        let (store, _) = seeded_store().await;
        let err = json(&store, "missing").await.unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[tokio::test]
    async fn markdown_export_mentions_endpoint_and_parameter() {
        let (store, _) = seeded_store().await;
        let report = markdown(&store, "example").await.unwrap();
        assert!(report.contains("/users"));
        assert!(report.contains("limit"));
        assert!(report.contains("nginx"));
    }
}
