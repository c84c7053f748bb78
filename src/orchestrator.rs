//! Discovery orchestrator (J): phase sequencing, budget enforcement, resume,
//! progress reporting.
//!
//! Every endpoint observation produced by a phase funnels through
//! [`Orchestrator::merge_endpoint_observation`], the single centralized
//! upsert-with-union used across the whole run.

use crate::budget::StopSignal;
use crate::config::manager::deep_merge;
use crate::config::models::{ProbeConfig, Strategy};
use crate::http::HttpWorker;
use crate::robots::RobotsPolicy;
use crate::store::models::{ParamLocation, RunStatus};
use crate::store::Store;
use crate::{link_follower, method_prober, pattern_prober, schema, service_name, spec_scanner, wordlist_prober};
use serde_json::json;
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

/// Outcome of one `probe`/`resume` invocation.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ProbeSummary {
    pub service: String,
    pub base_url: String,
    pub endpoints_found: i64,
    pub total_requests: u64,
    pub status: String,
    pub error: Option<String>,
}

pub struct Orchestrator {
    store: Arc<Store>,
    wordlists_dir: PathBuf,
    stop: StopSignal,
}

impl Orchestrator {
    #[must_use]
    pub fn new(store: Arc<Store>, wordlists_dir: PathBuf, stop: StopSignal) -> Self {
        Self {
            store,
            wordlists_dir,
            stop,
        }
    }

    /// Performs one full discovery pass against `base_url`, using `base_config`
    /// deep-merged with `overrides` as the effective configuration for this run.
    ///
    /// # Errors
    /// Returns an error if the store can't be written to. A phase-0 transport
    /// failure is reported in the returned [`ProbeSummary`], not as an `Err`.
    pub async fn probe(
        &self,
        base_url: &str,
        base_config: &ProbeConfig,
        overrides: &serde_json::Value,
    ) -> crate::error::Result<ProbeSummary> {
        let config = merge_overrides(base_config, overrides)?;
        let base_url = service_name::normalize_base_url(base_url);
        let name = service_name::derive_service_name(&base_url);

        let service_id = self
            .store
            .upsert_service(&name, &base_url, "", "", None)
            .await?;
        let config_snapshot = serde_json::to_value(&config)?;
        let run_id = self.store.create_probe_run(service_id, &config_snapshot).await?;

        let http = HttpWorker::new(
            config.user_agent.clone(),
            config.auth.clone(),
            config.timeout_seconds,
            config.delay_ms,
        )?;

        info!(service = %name, base_url = %base_url, "phase 0: base probe");
        let base_response = http.get(&base_url).await?;
        if base_response.status_code == 0 {
            self.store
                .update_probe_run(run_id, Some(RunStatus::Error), Some(http.request_count() as i64), None, None)
                .await?;
            return Ok(ProbeSummary {
                service: name,
                base_url,
                endpoints_found: 0,
                total_requests: http.request_count(),
                status: RunStatus::Error.as_str().to_string(),
                error: Some(base_response.error),
            });
        }
        let server_header = base_response
            .headers
            .get("server")
            .cloned()
            .unwrap_or_default();
        self.store
            .upsert_service(&name, &base_url, &server_header, "", None)
            .await?;

        let mut robots = RobotsPolicy::new(&base_url, &config.user_agent);
        if config.respect_robots_txt {
            let (fetched, raw) = robots.load(&http).await?;
            if fetched {
                self.store
                    .upsert_service(&name, &base_url, "", &raw, None)
                    .await?;
            }
            let widened = config
                .delay_ms
                .max(robots.crawl_delay().map_or(0, |d| (d * 1000.0) as u64));
            http.set_delay_ms(widened).await;
        }

        let should_stop = || self.budget_exhausted_or_stopped(&http, &config);

        if !should_stop() && config.strategy_enabled(Strategy::Openapi) {
            self.run_spec_scan(&base_url, &name, service_id, &http, &should_stop).await?;
        }

        if !should_stop() && config.strategy_enabled(Strategy::Wordlist) {
            self.run_wordlist_phase(&base_url, service_id, &config, &robots, &http, &should_stop)
                .await?;
        }

        if !should_stop() && config.strategy_enabled(Strategy::Pattern) {
            self.run_pattern_phase(&base_url, service_id, &config, &robots, &http, &should_stop)
                .await?;
        }

        if !should_stop() {
            self.run_method_probing(&base_url, service_id, &config, &http, &should_stop)
                .await?;
        }

        if !should_stop() {
            self.run_schema_extraction(&base_url, service_id, &http, &should_stop).await?;
        }

        if !should_stop() && config.strategy_enabled(Strategy::ResponseDriven) {
            self.run_link_following(&base_url, service_id, &config, &robots, &http, &should_stop)
                .await?;
        }

        let stats = self.store.get_service_stats(service_id).await?;
        self.store.update_service_last_probed(service_id).await?;
        let status = if should_stop() {
            RunStatus::Stopped
        } else {
            RunStatus::Completed
        };
        self.store
            .update_probe_run(
                run_id,
                Some(status),
                Some(http.request_count() as i64),
                Some(stats.endpoints),
                None,
            )
            .await?;

        Ok(ProbeSummary {
            service: name,
            base_url,
            endpoints_found: stats.endpoints,
            total_requests: http.request_count(),
            status: status.as_str().to_string(),
            error: None,
        })
    }

    /// Re-reads the last run's config snapshot for `service_name`, merges it
    /// into the supplied base config, and invokes [`Self::probe`] against the
    /// stored base URL.
    ///
    /// # Errors
    /// Returns an error if the service is unknown or it has no prior run.
    pub async fn resume(
        &self,
        service_name: &str,
        base_config: &ProbeConfig,
    ) -> crate::error::Result<ProbeSummary> {
        let service = self
            .store
            .get_service(service_name)
            .await?
            .ok_or_else(|| crate::error::Error::service_not_found(service_name))?;
        let last_run = self.store.get_last_probe_run(service.id).await?;
        let overrides = last_run.map_or_else(|| json!({}), |run| run.config);
        self.probe(&service.base_url, base_config, &overrides).await
    }

    fn budget_exhausted_or_stopped(&self, http: &HttpWorker, config: &ProbeConfig) -> bool {
        http.request_count() >= u64::from(config.max_requests) || self.stop.requested()
    }

    async fn run_spec_scan(
        &self,
        base_url: &str,
        name: &str,
        service_id: i64,
        http: &HttpWorker,
        should_stop: &(dyn Fn() -> bool + Sync),
    ) -> crate::error::Result<()> {
        info!("phase 1: specification scan");
        let Some(spec) = spec_scanner::scan(base_url, http, should_stop).await? else {
            return Ok(());
        };
        let metadata = spec_scanner::extract_metadata(&spec);
        self.store
            .upsert_service(name, base_url, "", "", Some(&serde_json::Value::Object(metadata)))
            .await?;
        let endpoints = spec_scanner::extract_endpoints(&spec);
        for endpoint in endpoints {
            let methods: BTreeSet<String> = endpoint.methods.into_iter().collect();
            let endpoint_id = self
                .merge_endpoint_observation(service_id, &endpoint.path, &methods, &BTreeSet::new(), false, "", &BTreeSet::new(), "openapi")
                .await?;
            for param in endpoint.parameters {
                self.store
                    .upsert_parameter(
                        endpoint_id,
                        &param.name,
                        &param.param_type,
                        param.location,
                        param.required,
                        "",
                    )
                    .await?;
            }
        }
        Ok(())
    }

    async fn run_wordlist_phase(
        &self,
        base_url: &str,
        service_id: i64,
        config: &ProbeConfig,
        robots: &RobotsPolicy,
        http: &HttpWorker,
        should_stop: &(dyn Fn() -> bool + Sync),
    ) -> crate::error::Result<()> {
        info!("phase 2: wordlist probing");
        let candidates = wordlist_prober::load_wordlists(&self.wordlists_dir, &config.wordlists);
        let known = self.store.get_endpoint_paths(service_id).await?;
        let finds = wordlist_prober::probe(base_url, &candidates, &known, robots, http, should_stop).await?;
        for find in finds {
            self.ingest_find(service_id, &find.path, &find.response, "wordlist").await?;
        }
        Ok(())
    }

    async fn run_pattern_phase(
        &self,
        base_url: &str,
        service_id: i64,
        config: &ProbeConfig,
        robots: &RobotsPolicy,
        http: &HttpWorker,
        should_stop: &(dyn Fn() -> bool + Sync),
    ) -> crate::error::Result<()> {
        info!("phase 3: pattern probing");
        let candidates = pattern_prober::generate_candidates(&config.pattern_versions, &config.pattern_resources);
        let known = self.store.get_endpoint_paths(service_id).await?;
        let finds = wordlist_prober::probe(base_url, &candidates, &known, robots, http, should_stop).await?;
        for find in finds {
            self.ingest_find(service_id, &find.path, &find.response, "pattern").await?;
        }
        Ok(())
    }

    async fn run_method_probing(
        &self,
        base_url: &str,
        service_id: i64,
        config: &ProbeConfig,
        http: &HttpWorker,
        should_stop: &(dyn Fn() -> bool + Sync),
    ) -> crate::error::Result<()> {
        info!("phase 4: method probing");
        let endpoints = self.store.get_endpoints(service_id).await?;
        for endpoint in endpoints {
            if should_stop() {
                break;
            }
            let result = method_prober::probe(base_url, &endpoint.path, config.skip_destructive, http).await?;
            self.merge_endpoint_observation(
                service_id,
                &endpoint.path,
                &result.methods,
                &result.status_codes,
                result.auth_required,
                &result.auth_type_hint,
                &result.content_types,
                "method",
            )
            .await?;
            for (method, response) in result.responses {
                if response.ok() && !response.body.trim().is_empty() {
                    self.record_response(service_id, &endpoint.path, &method, &response).await?;
                } else if !response.ok() && !response.body.is_empty() {
                    self.ingest_error_parameters(service_id, &endpoint.path, &response.body).await?;
                }
            }
        }
        Ok(())
    }

    async fn run_schema_extraction(
        &self,
        base_url: &str,
        service_id: i64,
        http: &HttpWorker,
        should_stop: &(dyn Fn() -> bool + Sync),
    ) -> crate::error::Result<()> {
        info!("phase 5: schema extraction");
        let endpoints = self.store.get_endpoints(service_id).await?;
        for endpoint in endpoints {
            if should_stop() {
                break;
            }
            if !endpoint.methods.contains("GET") {
                continue;
            }
            let url = format!("{base_url}{}", endpoint.path);
            let response = http.get(&url).await?;
            if response.ok() && !response.body.trim().is_empty() {
                self.record_response(service_id, &endpoint.path, "GET", &response).await?;
            }
        }
        Ok(())
    }

    async fn run_link_following(
        &self,
        base_url: &str,
        service_id: i64,
        config: &ProbeConfig,
        robots: &RobotsPolicy,
        http: &HttpWorker,
        should_stop: &(dyn Fn() -> bool + Sync),
    ) -> crate::error::Result<()> {
        info!("phase 6: link following");
        for round in 0..config.max_depth {
            if should_stop() {
                break;
            }
            let endpoints = self.store.get_endpoints(service_id).await?;
            let mut bodies = Vec::new();
            for endpoint in &endpoints {
                for response in self.store.get_responses(endpoint.id).await? {
                    bodies.push(response.body_sample);
                }
            }
            let known = self.store.get_endpoint_paths(service_id).await?;
            let candidates = link_follower::collect_candidates(&bodies, base_url, &known);
            if candidates.is_empty() {
                break;
            }
            let finds = link_follower::probe(base_url, &candidates, &known, robots, http, should_stop).await?;
            if finds.is_empty() {
                break;
            }
            for find in &finds {
                self.ingest_find(service_id, &find.path, &find.response, "response_driven")
                    .await?;
            }
            warn!(round, found = finds.len(), "link-follow round complete");
        }
        Ok(())
    }

    /// Funnels one observed `(method, status, content_type)` triple for
    /// `path` through the monotonic endpoint merge, inferring `auth_required`
    /// and `auth_type_hint` from the status code and `WWW-Authenticate`
    /// header the way §4.1 describes.
    async fn ingest_find(
        &self,
        service_id: i64,
        path: &str,
        response: &crate::http::HttpResponse,
        discovered_by: &str,
    ) -> crate::error::Result<()> {
        let mut methods = BTreeSet::new();
        if response.status_code != 404 && response.status_code != 405 {
            methods.insert(response.method.clone());
        }
        let mut status_codes = BTreeSet::new();
        status_codes.insert(i64::from(response.status_code));
        let mut content_types = BTreeSet::new();
        if !response.content_type.is_empty() {
            content_types.insert(
                response
                    .content_type
                    .split(';')
                    .next()
                    .unwrap_or(&response.content_type)
                    .trim()
                    .to_string(),
            );
        }
        let (auth_required, auth_hint) = auth_from_status(response);

        self.merge_endpoint_observation(
            service_id,
            path,
            &methods,
            &status_codes,
            auth_required,
            &auth_hint,
            &content_types,
            discovered_by,
        )
        .await?;

        if response.ok() && !response.body.trim().is_empty() {
            self.record_response(service_id, path, &response.method, response).await?;
        }
        Ok(())
    }

    async fn record_response(
        &self,
        service_id: i64,
        path: &str,
        method: &str,
        response: &crate::http::HttpResponse,
    ) -> crate::error::Result<()> {
        let endpoint_id = self
            .merge_endpoint_observation(
                service_id,
                path,
                &BTreeSet::new(),
                &BTreeSet::new(),
                false,
                "",
                &BTreeSet::new(),
                "",
            )
            .await?;
        let schema = schema::extract_schema_from_body(&response.body);
        let headers = serde_json::to_value(&response.headers)?;
        self.store
            .add_response(
                endpoint_id,
                method,
                i64::from(response.status_code),
                &headers,
                &schema,
                &response.body,
                &response.content_type,
                response.elapsed_ms,
            )
            .await?;
        Ok(())
    }

    async fn ingest_error_parameters(&self, service_id: i64, path: &str, body: &str) -> crate::error::Result<()> {
        let params = schema::extract_params_from_error(body);
        if params.is_empty() {
            return Ok(());
        }
        let endpoint_id = self
            .merge_endpoint_observation(
                service_id,
                path,
                &BTreeSet::new(),
                &BTreeSet::new(),
                false,
                "",
                &BTreeSet::new(),
                "",
            )
            .await?;
        for (name, required) in params {
            self.store
                .upsert_parameter(endpoint_id, &name, "string", ParamLocation::Body, required, "")
                .await?;
        }
        Ok(())
    }

    /// The single centralized endpoint merge used by every phase: upserts
    /// `path` with the observed methods/status-codes/content-types, latching
    /// `auth_required` and overwriting `auth_type_hint` only when non-empty.
    async fn merge_endpoint_observation(
        &self,
        service_id: i64,
        path: &str,
        methods: &BTreeSet<String>,
        status_codes: &BTreeSet<i64>,
        auth_required: bool,
        auth_type_hint: &str,
        content_types: &BTreeSet<String>,
        discovered_by: &str,
    ) -> crate::error::Result<i64> {
        self.store
            .upsert_endpoint(
                service_id,
                path,
                methods,
                status_codes,
                auth_required,
                auth_type_hint,
                content_types,
                discovered_by,
            )
            .await
    }
}

fn merge_overrides(base: &ProbeConfig, overrides: &serde_json::Value) -> crate::error::Result<ProbeConfig> {
    let mut doc = serde_json::to_value(base)?;
    deep_merge(&mut doc, overrides);
    Ok(serde_json::from_value(doc)?)
}

fn auth_from_status(response: &crate::http::HttpResponse) -> (bool, String) {
    if !matches!(response.status_code, 401 | 403) {
        return (false, String::new());
    }
    let hint = response
        .headers
        .get("www-authenticate")
        .map(|h| infer_auth_type_hint(h))
        .unwrap_or_default();
    (true, hint)
}

/// Infers a short auth-type token from a `WWW-Authenticate` header: `bearer`,
/// `basic`, and `api_key` are matched case-insensitively; otherwise the
/// header's first whitespace-delimited token is used verbatim.
#[must_use]
pub fn infer_auth_type_hint(header: &str) -> String {
    let lower = header.to_lowercase();
    if lower.contains("bearer") {
        "bearer".to_string()
    } else if lower.contains("basic") {
        "basic".to_string()
    } else if lower.contains("api_key") || lower.contains("api key") {
        "api_key".to_string()
    } else {
        header.split_whitespace().next().unwrap_or("").to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::models::ProbeConfig;
    use std::sync::atomic::AtomicBool;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn orchestrator_over(dir: &std::path::Path) -> Orchestrator {
        let store = Arc::new(Store::connect(&dir.join("db.sqlite")).await.unwrap());
        let stop = StopSignal::new(dir.join("STOP"), Arc::new(AtomicBool::new(false)));
        Orchestrator::new(store, dir.join("wordlists"), stop)
    }

    #[test]
    fn auth_type_hint_matches_known_schemes_case_insensitively() {
        assert_eq!(infer_auth_type_hint("Bearer realm=x"), "bearer");
        assert_eq!(infer_auth_type_hint("Basic realm=x"), "basic");
        assert_eq!(infer_auth_type_hint("API_KEY realm=x"), "api_key");
    }

    #[test]
    fn unknown_scheme_uses_first_token() {
        assert_eq!(infer_auth_type_hint("Digest realm=x"), "Digest");
    }

    #[tokio::test]
    async fn scenario_wordlist_find_creates_service_and_endpoint() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).insert_header("server", "nginx"))
            .mount(&server)
            .await;
        Mock::given(method("HEAD"))
            .and(path("/users"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/users"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"[{"id":1}]"#).insert_header("content-type", "application/json"))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("wordlists")).unwrap();
        std::fs::write(dir.path().join("wordlists/words.txt"), "/users\n").unwrap();
        let orchestrator = orchestrator_over(dir.path()).await;

        let config = ProbeConfig {
            delay_ms: 0,
            respect_robots_txt: false,
            strategies: vec![Strategy::Wordlist],
            wordlists: vec!["words.txt".to_string()],
            ..ProbeConfig::default()
        };

        let summary = orchestrator.probe(&server.uri(), &config, &json!({})).await.unwrap();
        assert_eq!(summary.status, "completed");
        assert!(summary.endpoints_found >= 1);

        let service = orchestrator.store.get_service(&summary.service).await.unwrap().unwrap();
        let endpoints = orchestrator.store.get_endpoints(service.id).await.unwrap();
        let users = endpoints.iter().find(|e| e.path == "/users").unwrap();
        assert!(users.status_codes.contains(&200));
    }

    #[tokio::test]
    async fn scenario_transport_failure_on_base_probe_yields_error_status() {
        let dir = tempfile::tempdir().unwrap();
        let orchestrator = orchestrator_over(dir.path()).await;
        let config = ProbeConfig {
            delay_ms: 0,
            respect_robots_txt: false,
            ..ProbeConfig::default()
        };
        let summary = orchestrator
            .probe("http://127.0.0.1:1", &config, &json!({}))
            .await
            .unwrap();
        assert_eq!(summary.status, "error");
        assert!(summary.error.is_some());
    }
}
