//! Method prober (H): determines allowed methods and auth profile for one
//! endpoint.

use crate::http::HttpWorker;
use std::collections::BTreeSet;

const SAFE_METHODS: &[&str] = &["GET", "HEAD", "OPTIONS"];
const ALL_METHODS: &[&str] = &["GET", "HEAD", "OPTIONS", "POST", "PUT", "PATCH", "DELETE"];

/// Everything the prober learned about one endpoint across the methods it tried.
#[derive(Debug, Default)]
pub struct MethodProbeResult {
    pub methods: BTreeSet<String>,
    pub status_codes: BTreeSet<i64>,
    pub content_types: BTreeSet<String>,
    pub auth_required: bool,
    pub auth_type_hint: String,
    /// One response per attempted method, for schema/response ingestion upstream.
    pub responses: Vec<(String, crate::http::HttpResponse)>,
}

/// Probes `path` with either the safe method set or the full method set,
/// folding every non-transport-failure response into a [`MethodProbeResult`].
///
/// # Errors
/// Returns an error only if the underlying HTTP worker itself errors.
pub async fn probe(
    base_url: &str,
    path: &str,
    skip_destructive: bool,
    http: &HttpWorker,
) -> crate::error::Result<MethodProbeResult> {
    let methods = if skip_destructive { SAFE_METHODS } else { ALL_METHODS };
    let url = format!("{base_url}{path}");
    let mut result = MethodProbeResult::default();

    for method in methods {
        let response = http.request(&url, method, None, &[]).await?;
        if response.status_code == 0 {
            continue;
        }
        result.status_codes.insert(i64::from(response.status_code));

        if *method == "OPTIONS" {
            if let Some(allow) = response.headers.get("allow") {
                for token in allow.split(',') {
                    let token = token.trim().to_uppercase();
                    if !token.is_empty() {
                        result.methods.insert(token);
                    }
                }
            }
        }
        if !matches!(response.status_code, 404 | 405 | 501) {
            result.methods.insert((*method).to_string());
        }
        if matches!(response.status_code, 401 | 403) {
            result.auth_required = true;
            if let Some(hint) = response.headers.get("www-authenticate") {
                result.auth_type_hint = crate::orchestrator::infer_auth_type_hint(hint);
            }
        }
        if !response.content_type.is_empty() {
            let base_type = response
                .content_type
                .split(';')
                .next()
                .unwrap_or(&response.content_type)
                .trim()
                .to_string();
            if !base_type.is_empty() {
                result.content_types.insert(base_type);
            }
        }
        result.responses.push(((*method).to_string(), response));
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn worker() -> HttpWorker {
        HttpWorker::new(
            "test-agent".to_string(),
            crate::config::AuthConfig::default(),
            5,
            0,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn options_allow_header_unions_into_methods() {
        let server = MockServer::start().await;
        Mock::given(method("OPTIONS"))
            .and(path("/items"))
            .respond_with(ResponseTemplate::new(204).insert_header("allow", "GET, POST, OPTIONS"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/items"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        Mock::given(method("HEAD"))
            .and(path("/items"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let http = worker();
        let result = probe(&server.uri(), "/items", true, &http).await.unwrap();
        assert!(result.methods.contains("POST"));
        assert!(result.methods.contains("GET"));
    }

    #[tokio::test]
    async fn auth_error_status_sets_auth_required_and_hint() {
        let server = MockServer::start().await;
        for m in ["GET", "HEAD", "OPTIONS"] {
            Mock::given(method(m))
                .and(path("/private"))
                .respond_with(
                    ResponseTemplate::new(401).insert_header("www-authenticate", "Bearer realm=x"),
                )
                .mount(&server)
                .await;
        }

        let http = worker();
        let result = probe(&server.uri(), "/private", true, &http).await.unwrap();
        assert!(result.auth_required);
        assert_eq!(result.auth_type_hint, "bearer");
        assert!(result.methods.contains("GET"));
    }

    #[tokio::test]
    async fn not_found_and_method_not_allowed_are_excluded_from_methods() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/x"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("HEAD"))
            .and(path("/x"))
            .respond_with(ResponseTemplate::new(405))
            .mount(&server)
            .await;
        Mock::given(method("OPTIONS"))
            .and(path("/x"))
            .respond_with(ResponseTemplate::new(501))
            .mount(&server)
            .await;

        let http = worker();
        let result = probe(&server.uri(), "/x", true, &http).await.unwrap();
        assert!(result.methods.is_empty());
        assert_eq!(result.status_codes, [404, 405, 501].into_iter().collect());
    }
}
