//! Rate-limited HTTP worker.
//!
//! Every probe request flows through [`HttpWorker::request`], which never
//! surfaces transport failures as `Err` — a non-2xx status, a connection
//! refusal, or a timeout all come back as an [`HttpResponse`] with the
//! failure recorded on it, mirroring a passive scanner that must keep going
//! no matter what a target does.

use crate::config::models::{AuthConfig, AuthType};
use crate::error::Result;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use serde_json::Value;
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Body payload accepted by [`HttpWorker::request`], mirroring the three
/// shapes the original prober could send: structured JSON, a raw string, or
/// raw bytes.
#[derive(Debug, Clone)]
pub enum Body {
    Json(Value),
    Text(String),
    Bytes(Vec<u8>),
}

/// Outcome of a single probe request. `status_code == 0` marks a transport
/// failure (DNS, connect, timeout) rather than an HTTP response; `error`
/// carries a human-readable description in that case.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub url: String,
    pub method: String,
    pub status_code: u16,
    pub headers: std::collections::BTreeMap<String, String>,
    pub body: String,
    pub content_type: String,
    pub elapsed_ms: i64,
    pub error: String,
    pub is_json: bool,
}

impl HttpResponse {
    #[must_use]
    pub fn ok(&self) -> bool {
        (200..400).contains(&self.status_code)
    }
}

/// Rate-limited HTTP client with auth injection baked in.
///
/// The rate limiter is rebuilt whenever `delay_ms` changes (e.g. when the
/// orchestrator widens the delay to respect a `Crawl-delay` directive), since
/// `governor`'s quota is fixed at construction.
pub struct HttpWorker {
    client: reqwest::Client,
    user_agent: String,
    auth: AuthConfig,
    delay_ms: AtomicU64,
    limiter: Mutex<Arc<DefaultDirectRateLimiter>>,
    request_count: AtomicU64,
}

/// `reqwest`'s `rustls-no-provider` feature leaves the crypto backend
/// unselected so callers can pick one; this installs it once per process.
fn ensure_crypto_provider() {
    static INIT: std::sync::Once = std::sync::Once::new();
    INIT.call_once(|| {
        #[cfg(not(windows))]
        let provider = rustls::crypto::ring::default_provider();
        #[cfg(windows)]
        let provider = rustls::crypto::aws_lc_rs::default_provider();
        let _ = provider.install_default();
    });
}

impl HttpWorker {
    /// # Errors
    /// Returns an error if the underlying `reqwest::Client` can't be built.
    pub fn new(user_agent: String, auth: AuthConfig, timeout_seconds: u64, delay_ms: u64) -> Result<Self> {
        ensure_crypto_provider();
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .build()?;
        Ok(Self {
            client,
            user_agent,
            auth,
            delay_ms: AtomicU64::new(delay_ms),
            limiter: Mutex::new(Arc::new(build_limiter(delay_ms))),
            request_count: AtomicU64::new(0),
        })
    }

    #[must_use]
    pub fn request_count(&self) -> u64 {
        self.request_count.load(Ordering::Relaxed)
    }

    /// Widens (or narrows) the inter-request delay, e.g. to honor a
    /// `Crawl-delay` directive from `robots.txt`.
    pub async fn set_delay_ms(&self, delay_ms: u64) {
        self.delay_ms.store(delay_ms, Ordering::Relaxed);
        *self.limiter.lock().await = Arc::new(build_limiter(delay_ms));
    }

    /// Sends a single request, blocking on the rate limiter first.
    ///
    /// # Errors
    /// This never returns `Err` for transport-level failures — those are
    /// folded into the returned [`HttpResponse`]. It can still fail if the
    /// request can't even be constructed (an invalid URL).
    pub async fn request(
        &self,
        url: &str,
        method: &str,
        body: Option<Body>,
        extra_headers: &[(String, String)],
    ) -> Result<HttpResponse> {
        let limiter = self.limiter.lock().await.clone();
        limiter.until_ready().await;

        let reqwest_method = reqwest::Method::from_bytes(method.as_bytes())
            .unwrap_or(reqwest::Method::GET);
        let mut builder = self
            .client
            .request(reqwest_method, url)
            .header(reqwest::header::USER_AGENT, &self.user_agent)
            .header(reqwest::header::ACCEPT, "application/json, text/html, */*");

        builder = apply_auth(builder, &self.auth);

        for (name, value) in extra_headers {
            builder = builder.header(name, value);
        }

        builder = match body {
            Some(Body::Json(value)) => builder.json(&value),
            Some(Body::Text(text)) => builder.body(text),
            Some(Body::Bytes(bytes)) => builder.body(bytes),
            None => builder,
        };

        self.request_count.fetch_add(1, Ordering::Relaxed);
        let start = Instant::now();

        match builder.send().await {
            Ok(resp) => {
                let status_code = resp.status().as_u16();
                let headers: std::collections::BTreeMap<String, String> = resp
                    .headers()
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_str().unwrap_or_default().to_string()))
                    .collect();
                let content_type = headers.get("content-type").cloned().unwrap_or_default();
                let is_json = content_type.to_lowercase().contains("json");
                let bytes = resp.bytes().await.unwrap_or_default();
                let body_str = String::from_utf8(bytes.to_vec())
                    .unwrap_or_else(|e| e.as_bytes().iter().map(|&b| b as char).collect());
                Ok(HttpResponse {
                    url: url.to_string(),
                    method: method.to_string(),
                    status_code,
                    headers,
                    body: body_str,
                    content_type,
                    elapsed_ms: start.elapsed().as_millis() as i64,
                    error: String::new(),
                    is_json,
                })
            }
            Err(err) => Ok(HttpResponse {
                url: url.to_string(),
                method: method.to_string(),
                status_code: 0,
                headers: std::collections::BTreeMap::new(),
                body: String::new(),
                content_type: String::new(),
                elapsed_ms: start.elapsed().as_millis() as i64,
                error: err.to_string(),
                is_json: false,
            }),
        }
    }

    pub async fn get(&self, url: &str) -> Result<HttpResponse> {
        self.request(url, "GET", None, &[]).await
    }

    pub async fn head(&self, url: &str) -> Result<HttpResponse> {
        self.request(url, "HEAD", None, &[]).await
    }

    pub async fn options(&self, url: &str) -> Result<HttpResponse> {
        self.request(url, "OPTIONS", None, &[]).await
    }
}

fn apply_auth(builder: reqwest::RequestBuilder, auth: &AuthConfig) -> reqwest::RequestBuilder {
    if auth.value.is_empty() {
        return builder;
    }
    match auth.auth_type {
        AuthType::Bearer => builder.bearer_auth(&auth.value),
        AuthType::ApiKey => builder.header("X-API-Key", &auth.value),
        AuthType::Basic => {
            use base64::Engine;
            let encoded = base64::engine::general_purpose::STANDARD.encode(auth.value.as_bytes());
            builder.header(reqwest::header::AUTHORIZATION, format!("Basic {encoded}"))
        }
        AuthType::None => builder,
    }
}

/// One request cell per `delay_ms`. A delay of zero means effectively
/// unthrottled, modeled as the tightest quota `governor` allows.
fn build_limiter(delay_ms: u64) -> DefaultDirectRateLimiter {
    let period = Duration::from_millis(delay_ms.max(1));
    RateLimiter::direct(Quota::with_period(period).unwrap_or_else(|| {
        Quota::per_second(NonZeroU32::new(1_000).expect("1000 is non-zero"))
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn request_against_unreachable_host_yields_zero_status() {
        let worker = HttpWorker::new("test-agent".to_string(), AuthConfig::default(), 1, 0).unwrap();
        let response = worker.get("http://127.0.0.1:1").await.unwrap();
        assert_eq!(response.status_code, 0);
        assert!(!response.error.is_empty());
        assert!(!response.ok());
    }

    #[tokio::test]
    async fn non_utf8_body_falls_back_to_latin1() {
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        // 0xFF is not valid UTF-8 on its own but is ÿ (U+00FF) under latin-1.
        Mock::given(method("GET"))
            .and(path("/bin"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0xFF, b'a']))
            .mount(&server)
            .await;

        let worker = HttpWorker::new("test-agent".to_string(), AuthConfig::default(), 5, 0).unwrap();
        let response = worker.get(&format!("{}/bin", server.uri())).await.unwrap();
        assert_eq!(response.body, "\u{FF}a");
    }

    #[tokio::test]
    async fn bearer_auth_header_is_attached() {
        use wiremock::matchers::{header, method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/secure"))
            .and(header("authorization", "Bearer tok123"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .mount(&server)
            .await;

        let auth = AuthConfig {
            auth_type: AuthType::Bearer,
            value: "tok123".to_string(),
        };
        let worker = HttpWorker::new("test-agent".to_string(), auth, 5, 0).unwrap();
        let response = worker.get(&format!("{}/secure", server.uri())).await.unwrap();
        assert_eq!(response.status_code, 200);
        assert_eq!(response.body, "ok");
    }
}
