//! Typed configuration mirroring the discovery engine's default config.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    Openapi,
    Wordlist,
    Pattern,
    ResponseDriven,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthType {
    None,
    Bearer,
    ApiKey,
    Basic,
}

impl Default for AuthType {
    fn default() -> Self {
        Self::None
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(rename = "type", default)]
    pub auth_type: AuthType,
    #[serde(default)]
    pub value: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    pub delay_ms: u64,
    pub max_requests: u32,
    pub max_depth: u32,
    pub timeout_seconds: u64,
    pub user_agent: String,
    pub respect_robots_txt: bool,
    pub skip_destructive: bool,
    pub strategies: Vec<Strategy>,
    pub auth: AuthConfig,
    pub wordlists: Vec<String>,
    pub pattern_versions: Vec<u32>,
    pub pattern_resources: Vec<String>,
    pub export_dir: String,
    pub db_path: String,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            delay_ms: 500,
            max_requests: 500,
            max_depth: 3,
            timeout_seconds: 15,
            user_agent: "ApiProber/0.1 (passive-discovery)".to_string(),
            respect_robots_txt: true,
            skip_destructive: true,
            strategies: vec![
                Strategy::Openapi,
                Strategy::Wordlist,
                Strategy::Pattern,
                Strategy::ResponseDriven,
            ],
            auth: AuthConfig::default(),
            wordlists: vec![
                "common_rest.txt".to_string(),
                "swagger_paths.txt".to_string(),
                "auth_endpoints.txt".to_string(),
                "admin_paths.txt".to_string(),
            ],
            pattern_versions: vec![1, 2, 3],
            pattern_resources: [
                "users", "posts", "comments", "items", "products", "orders", "categories",
                "tags", "articles", "pages", "search", "settings", "config", "health",
                "status", "albums", "photos", "videos", "contacts", "customers", "tickets",
                "reviews", "collections", "templates",
            ]
            .into_iter()
            .map(str::to_string)
            .collect(),
            export_dir: "exports".to_string(),
            db_path: "data/api_prober.db".to_string(),
        }
    }
}

impl ProbeConfig {
    #[must_use]
    pub fn strategy_enabled(&self, strategy: Strategy) -> bool {
        self.strategies.contains(&strategy)
    }
}
