//! Wordlist prober (F): tries a curated list of common paths.

use crate::http::HttpWorker;
use crate::robots::RobotsPolicy;
use indexmap::IndexSet;
use std::path::Path;

/// Built-in fallback content for the four bundled wordlists, compiled into
/// the binary so a probe works with no files on disk.
const BUILTIN: &[(&str, &str)] = &[
    ("common_rest.txt", include_str!("../wordlists/common_rest.txt")),
    ("swagger_paths.txt", include_str!("../wordlists/swagger_paths.txt")),
    ("auth_endpoints.txt", include_str!("../wordlists/auth_endpoints.txt")),
    ("admin_paths.txt", include_str!("../wordlists/admin_paths.txt")),
];

/// Loads `names` from `dir`, falling back to the compiled-in default content.
///
/// For any of the four bundled files that aren't present on disk. Comments
/// (`#`) and blank lines are stripped; order is first-seen, deduplicated
/// across every listed file.
#[must_use]
pub fn load_wordlists(dir: &Path, names: &[String]) -> Vec<String> {
    let mut seen = IndexSet::new();
    for name in names {
        let text = std::fs::read_to_string(dir.join(name)).ok().or_else(|| {
            BUILTIN
                .iter()
                .find(|(builtin_name, _)| *builtin_name == name.as_str())
                .map(|(_, content)| (*content).to_string())
        });
        let Some(text) = text else { continue };
        for line in text.lines() {
            let stripped = line.split('#').next().unwrap_or("").trim();
            if !stripped.is_empty() {
                seen.insert(stripped.to_string());
            }
        }
    }
    seen.into_iter().collect()
}

/// One successful wordlist find: the path and the response that confirmed it.
pub struct Find {
    pub path: String,
    pub response: crate::http::HttpResponse,
}

/// Probes every path in `candidates` not already in `known_paths` and allowed by `robots`.
///
/// Issues `HEAD` first, retrying with `GET` on a `405`. A path counts as
/// found when its status is nonzero and not `404`.
///
/// # Errors
/// Returns an error only if the underlying HTTP worker itself errors.
pub async fn probe(
    base_url: &str,
    candidates: &[String],
    known_paths: &std::collections::BTreeSet<String>,
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
        let mut response = http.head(&url).await?;
        if response.status_code == 405 {
            response = http.get(&url).await?;
        }
        if response.status_code > 0 && response.status_code != 404 {
            finds.push(Find {
                path: path.clone(),
                response,
            });
        }
    }
    Ok(finds)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_wordlists_load_without_a_directory() {
        let dir = std::env::temp_dir().join("api_prober_missing_wordlists_dir");
        let names = vec!["common_rest.txt".to_string()];
        let words = load_wordlists(&dir, &names);
        assert!(words.contains(&"/health".to_string()));
        assert!(!words.iter().any(String::is_empty));
    }

    #[test]
    fn comments_and_blanks_are_stripped_and_order_preserved_with_dedup() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("custom.txt"), "# comment\n/one\n\n/two\n/one\n").unwrap();
        let words = load_wordlists(dir.path(), &["custom.txt".to_string()]);
        assert_eq!(words, vec!["/one".to_string(), "/two".to_string()]);
    }

    #[tokio::test]
    async fn found_paths_exclude_404_and_known() {
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path("/users"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        Mock::given(method("HEAD"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(404))
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
        let candidates = vec!["/users".to_string(), "/missing".to_string()];
        let finds = probe(&server.uri(), &candidates, &std::collections::BTreeSet::new(), &robots, &http, &|| false)
            .await
            .unwrap();
        assert_eq!(finds.len(), 1);
        assert_eq!(finds[0].path, "/users");
    }

    #[tokio::test]
    async fn head_405_falls_back_to_get() {
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path("/only-get"))
            .respond_with(ResponseTemplate::new(405))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/only-get"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
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
        let candidates = vec!["/only-get".to_string()];
        let finds = probe(&server.uri(), &candidates, &std::collections::BTreeSet::new(), &robots, &http, &|| false)
            .await
            .unwrap();
        assert_eq!(finds.len(), 1);
        assert_eq!(finds[0].response.body, "ok");
    }
}
