//! Row types returned from the [`super::Store`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Service {
    pub id: i64,
    pub name: String,
    pub base_url: String,
    pub description: String,
    pub discovered_at: DateTime<Utc>,
    pub last_probed: Option<DateTime<Utc>>,
    pub server_header: String,
    pub robots_txt: String,
    pub metadata: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Endpoint {
    pub id: i64,
    pub service_id: i64,
    pub path: String,
    pub methods: BTreeSet<String>,
    pub status_codes: BTreeSet<i64>,
    pub content_types: BTreeSet<String>,
    pub auth_required: bool,
    pub auth_type_hint: String,
    pub discovered_by: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    pub id: i64,
    pub endpoint_id: i64,
    pub method: String,
    pub status_code: i64,
    pub headers: serde_json::Value,
    pub body_schema: serde_json::Value,
    pub body_sample: String,
    pub content_type: String,
    pub elapsed_ms: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamLocation {
    Query,
    Path,
    Header,
    Body,
    Form,
    Cookie,
}

impl ParamLocation {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Query => "query",
            Self::Path => "path",
            Self::Header => "header",
            Self::Body => "body",
            Self::Form => "form",
            Self::Cookie => "cookie",
        }
    }

    #[must_use]
    pub fn parse(raw: &str) -> Self {
        match raw {
            "path" => Self::Path,
            "header" => Self::Header,
            "body" => Self::Body,
            "form" | "formData" => Self::Form,
            "cookie" => Self::Cookie,
            _ => Self::Query,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Parameter {
    pub id: i64,
    pub endpoint_id: i64,
    pub name: String,
    pub param_type: String,
    pub location: ParamLocation,
    pub required: bool,
    pub example_value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Completed,
    Stopped,
    Error,
}

impl RunStatus {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Stopped => "stopped",
            Self::Error => "error",
        }
    }

    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Running)
    }

    #[must_use]
    pub fn parse(raw: &str) -> Self {
        match raw {
            "completed" => Self::Completed,
            "stopped" => Self::Stopped,
            "error" => Self::Error,
            _ => Self::Running,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeRun {
    pub id: i64,
    pub service_id: i64,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub status: RunStatus,
    pub config: serde_json::Value,
    pub total_requests: i64,
    pub endpoints_found: i64,
    pub progress: serde_json::Value,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ServiceStats {
    pub endpoints: i64,
    pub responses: i64,
    pub parameters: i64,
}
