//! Link follower (I): iterative HATEOAS-style discovery from captured bodies.

use crate::http::HttpWorker;
use crate::robots::RobotsPolicy;
use std::collections::BTreeSet;

/// One successful link-follow: the path and the response that confirmed it.
pub struct Find {
    pub path: String,
    pub response: crate::http::HttpResponse,
}

/// `GET`s every path in `candidates` not already in `known_paths` and allowed
/// by `robots`, capturing the body so a later round can mine it for further
/// links. Unlike the wordlist prober, this never substitutes `HEAD` — a
/// followed link's whole point is the body it carries.
///
/// # Errors
/// Returns an error only if the underlying HTTP worker itself errors.
pub async fn probe(
    base_url: &str,
    candidates: &[String],
    known_paths: &BTreeSet<String>,
    robots: &RobotsPolicy,
    http: &HttpWorker,
    should_stop: &(dyn Fn() -> bool + Sync),
) -> crate::error::Result<Vec<Find>> {
    let mut finds = Vec::new();
    for path in candidates {
        if should_stop() {
            break;
        }
        if known_paths.contains(path) || !robots.is_allowed(path) {
            continue;
        }
        let url = format!("{base_url}{path}");
        let response = http.get(&url).await?;
        if response.status_code > 0 && response.status_code != 404 {
            finds.push(Find {
                path: path.clone(),
                response,
            });
        }
    }
    Ok(finds)
}

/// Extracts and normalizes every link candidate found in `bodies` (raw JSON
/// response bodies already captured for a service), dropping anything
/// already in `known_paths`.
#[must_use]
pub fn collect_candidates(
    bodies: &[String],
    base_url: &str,
    known_paths: &BTreeSet<String>,
) -> Vec<String> {
    let mut candidates = BTreeSet::new();
    for body in bodies {
        if body.trim().is_empty() {
            continue;
        }
        let Ok(value) = serde_json::from_str::<serde_json::Value>(body) else {
            continue;
        };
        for raw in crate::schema::extract_links(&value, base_url) {
            if let Some(path) = normalize(&raw, base_url) {
                if !known_paths.contains(&path) {
                    candidates.insert(path);
                }
            }
        }
    }
    candidates.into_iter().collect()
}

/// Normalizes a raw link candidate: strips a matching base-URL prefix,
/// ensures a leading slash, drops query/fragment, and strips a trailing
/// slash except for the root itself. Idempotent by construction — every step
/// is already a no-op on its own output.
#[must_use]
pub fn normalize(raw: &str, base_url: &str) -> Option<String> {
    if raw.is_empty() {
        return None;
    }
    let without_base = if !base_url.is_empty() && raw.starts_with(base_url) {
        &raw[base_url.len()..]
    } else {
        raw
    };
    let leading = if without_base.starts_with('/') {
        without_base.to_string()
    } else {
        format!("/{without_base}")
    };
    let without_fragment = leading.split('#').next().unwrap_or("");
    let without_query = without_fragment.split('?').next().unwrap_or("");
    let trimmed = if without_query.len() > 1 {
        without_query.trim_end_matches('/')
    } else {
        without_query
    };
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_base_url_prefix() {
        assert_eq!(
            normalize("https://api.example.com/users/1", "https://api.example.com"),
            Some("/users/1".to_string())
        );
    }

    #[test]
    fn drops_query_and_fragment() {
        assert_eq!(normalize("/users?page=2", ""), Some("/users".to_string()));
        assert_eq!(normalize("/users#frag", ""), Some("/users".to_string()));
    }

    #[test]
    fn strips_trailing_slash_except_root() {
        assert_eq!(normalize("/users/", ""), Some("/users".to_string()));
        assert_eq!(normalize("/", ""), Some("/".to_string()));
    }

    #[test]
    fn empty_yields_none() {
        assert_eq!(normalize("", ""), None);
    }

    #[test]
    fn collect_candidates_pulls_hal_links_and_skips_known_paths() {
        let bodies = vec![
            r#"{"_links":{"next":{"href":"/page/2"}},"self":"/page/1"}"#.to_string(),
        ];
        let known: BTreeSet<String> = std::iter::once("/page/1".to_string()).collect();
        let candidates = collect_candidates(&bodies, "", &known);
        assert_eq!(candidates, vec!["/page/2".to_string()]);
    }

    #[test]
    fn is_idempotent() {
        let once = normalize("https://x.com/a/b/?q=1#f", "https://x.com").unwrap();
        let twice = normalize(&once, "https://x.com").unwrap();
        assert_eq!(once, twice);
    }

    #[tokio::test]
    async fn probe_issues_get_and_captures_the_body() {
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/page/2"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"self":"/page/2"}"#))
            .mount(&server)
            .await;

        let http = HttpWorker::new(
            "test-agent".to_string(),
            crate::config::AuthConfig::default(),
            5,
            0,
        )
        .unwrap();
        let robots = RobotsPolicy::new(&server.uri(), "test-agent");
        let candidates = vec!["/page/2".to_string()];
        let finds = probe(
            &server.uri(),
            &candidates,
            &BTreeSet::new(),
            &robots,
            &http,
            &|| false,
        )
        .await
        .unwrap();
        assert_eq!(finds.len(), 1);
        assert_eq!(finds[0].response.method, "GET");
        assert_eq!(finds[0].response.body, r#"{"self":"/page/2"}"#);
    }
}
