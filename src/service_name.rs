//! Derives a service's store key from its base URL.

/// Picks the leftmost of the last two dotted labels of the host
/// (`api.example.com` -> `example`), per the data model's definition of a
/// service name. Hosts with only one label (`localhost`) use that label
/// whole. True public-suffix handling (`api.example.co.uk` -> `co`, not
/// `example`) is intentionally not implemented — see the open question in
/// DESIGN.md.
#[must_use]
pub fn derive_service_name(base_url: &str) -> String {
    let host = url_host(base_url);
    let labels: Vec<&str> = host.split('.').filter(|l| !l.is_empty()).collect();
    match labels.len() {
        0 => host,
        1 => labels[0].to_string(),
        n => labels[n - 2].to_string(),
    }
}

/// Trims scheme, userinfo, port, path, query, and fragment from a base URL,
/// leaving just the host. Falls back to the raw input if it doesn't look
/// like `scheme://host...`.
fn url_host(base_url: &str) -> String {
    let without_scheme = base_url
        .split_once("://")
        .map_or(base_url, |(_, rest)| rest);
    let without_userinfo = without_scheme
        .rsplit_once('@')
        .map_or(without_scheme, |(_, rest)| rest);
    let host_and_port = without_userinfo
        .split(['/', '?', '#'])
        .next()
        .unwrap_or(without_userinfo);
    host_and_port
        .rsplit_once(':')
        .map_or(host_and_port, |(host, _)| host)
        .to_lowercase()
}

/// Trims a trailing slash from a base URL, per the Service data model.
#[must_use]
pub fn normalize_base_url(base_url: &str) -> String {
    base_url.trim_end_matches('/').to_string()
}
