//! Durable entity store: services, endpoints, responses, parameters, probe runs.
//!
//! Backed by a single-file SQLite database. Endpoint and parameter upserts
//! centralize the monotonic-union merge described in the data model: sets
//! only ever grow, `auth_required` only ever latches true, and overwrite-if-
//! non-empty fields never get clobbered by a blank incoming value.

pub mod models;

use crate::error::Result;
use chrono::Utc;
use models::{
    Endpoint, ParamLocation, Parameter, ProbeRun, Response, RunStatus, Service, ServiceStats,
};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use std::collections::BTreeSet;
use std::path::Path;
use std::str::FromStr;

pub struct Store {
    pool: SqlitePool,
}

impl Store {
    /// Opens (creating if absent) the SQLite database at `path` and ensures
    /// the schema exists.
    ///
    /// # Errors
    /// Returns an error if the parent directory can't be created or the
    /// database can't be opened/migrated.
    pub async fn connect(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let options = SqliteConnectOptions::from_str(&format!("sqlite://{}", path.display()))
            .map_err(sqlx::Error::from)?
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;
        sqlx::query("PRAGMA journal_mode=WAL").execute(&pool).await?;
        sqlx::query("PRAGMA foreign_keys=ON").execute(&pool).await?;
        let store = Self { pool };
        store.ensure_tables().await?;
        Ok(store)
    }

    async fn ensure_tables(&self) -> Result<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS services (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT UNIQUE NOT NULL,
                base_url TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                discovered_at TEXT NOT NULL DEFAULT (datetime('now')),
                last_probed TEXT,
                server_header TEXT NOT NULL DEFAULT '',
                robots_txt TEXT NOT NULL DEFAULT '',
                metadata_json TEXT NOT NULL DEFAULT '{}'
            );

            CREATE TABLE IF NOT EXISTS endpoints (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                service_id INTEGER NOT NULL REFERENCES services(id),
                path TEXT NOT NULL,
                methods_json TEXT NOT NULL DEFAULT '[]',
                status_codes_json TEXT NOT NULL DEFAULT '[]',
                content_types_json TEXT NOT NULL DEFAULT '[]',
                auth_required INTEGER NOT NULL DEFAULT 0,
                auth_type_hint TEXT NOT NULL DEFAULT '',
                discovered_by TEXT NOT NULL DEFAULT '',
                UNIQUE(service_id, path)
            );

            CREATE TABLE IF NOT EXISTS responses (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                endpoint_id INTEGER NOT NULL REFERENCES endpoints(id),
                method TEXT NOT NULL,
                status_code INTEGER NOT NULL,
                headers_json TEXT NOT NULL DEFAULT '{}',
                body_schema_json TEXT NOT NULL DEFAULT '{}',
                body_sample TEXT NOT NULL DEFAULT '',
                content_type TEXT NOT NULL DEFAULT '',
                elapsed_ms INTEGER NOT NULL DEFAULT 0
            );

            CREATE TABLE IF NOT EXISTS parameters (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                endpoint_id INTEGER NOT NULL REFERENCES endpoints(id),
                name TEXT NOT NULL,
                param_type TEXT NOT NULL DEFAULT 'string',
                location TEXT NOT NULL DEFAULT 'query',
                required INTEGER NOT NULL DEFAULT 0,
                example_value TEXT NOT NULL DEFAULT '',
                UNIQUE(endpoint_id, name, location)
            );

            CREATE TABLE IF NOT EXISTS probe_runs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                service_id INTEGER NOT NULL REFERENCES services(id),
                started_at TEXT NOT NULL DEFAULT (datetime('now')),
                finished_at TEXT,
                status TEXT NOT NULL DEFAULT 'running',
                config_json TEXT NOT NULL DEFAULT '{}',
                total_requests INTEGER NOT NULL DEFAULT 0,
                endpoints_found INTEGER NOT NULL DEFAULT 0,
                progress_json TEXT NOT NULL DEFAULT '{}'
            );
            ",
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    // ---- Services --------------------------------------------------------

    /// Creates or updates a service by name. Non-empty incoming fields
    /// overwrite; empty ones preserve whatever is already stored.
    ///
    /// # Errors
    /// Returns an error on database failure.
    pub async fn upsert_service(
        &self,
        name: &str,
        base_url: &str,
        server_header: &str,
        robots_txt: &str,
        metadata: Option<&serde_json::Value>,
    ) -> Result<i64> {
        let meta_json = metadata.map_or_else(|| "{}".to_string(), ToString::to_string);
        sqlx::query(
            r"
            INSERT INTO services (name, base_url, server_header, robots_txt, metadata_json)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(name) DO UPDATE SET
                base_url = excluded.base_url,
                server_header = CASE WHEN excluded.server_header != '' THEN excluded.server_header ELSE services.server_header END,
                robots_txt = CASE WHEN excluded.robots_txt != '' THEN excluded.robots_txt ELSE services.robots_txt END,
                metadata_json = CASE WHEN excluded.metadata_json != '{}' THEN excluded.metadata_json ELSE services.metadata_json END
            ",
        )
        .bind(name)
        .bind(base_url)
        .bind(server_header)
        .bind(robots_txt)
        .bind(&meta_json)
        .execute(&self.pool)
        .await?;

        let row = sqlx::query("SELECT id FROM services WHERE name = ?1")
            .bind(name)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.try_get("id")?)
    }

    /// # Errors
    /// Returns an error on database failure.
    pub async fn get_service(&self, name: &str) -> Result<Option<Service>> {
        let row = sqlx::query("SELECT * FROM services WHERE name = ?1")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        row.map(service_from_row).transpose()
    }

    /// # Errors
    /// Returns an error on database failure.
    pub async fn list_services(&self) -> Result<Vec<Service>> {
        let rows = sqlx::query("SELECT * FROM services ORDER BY name")
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(service_from_row).collect()
    }

    /// # Errors
    /// Returns an error on database failure.
    pub async fn update_service_last_probed(&self, service_id: i64) -> Result<()> {
        sqlx::query("UPDATE services SET last_probed = ?1 WHERE id = ?2")
            .bind(Utc::now().to_rfc3339())
            .bind(service_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // ---- Endpoints ---------------------------------------------------------

    /// Reads the current row (if any), unions the observed
    /// methods/status-codes/content-types into it, OR-latches `auth_required`,
    /// and overwrites `auth_type_hint` only when the incoming value is
    /// non-empty — the single centralized merge function for this entity.
    ///
    /// # Errors
    /// Returns an error on database failure.
    #[allow(clippy::too_many_arguments)]
    pub async fn upsert_endpoint(
        &self,
        service_id: i64,
        path: &str,
        methods: &BTreeSet<String>,
        status_codes: &BTreeSet<i64>,
        auth_required: bool,
        auth_type_hint: &str,
        content_types: &BTreeSet<String>,
        discovered_by: &str,
    ) -> Result<i64> {
        let existing = sqlx::query(
            "SELECT id, methods_json, status_codes_json, content_types_json, auth_required, auth_type_hint \
             FROM endpoints WHERE service_id = ?1 AND path = ?2",
        )
        .bind(service_id)
        .bind(path)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(row) = existing {
            let id: i64 = row.try_get("id")?;
            let mut all_methods: BTreeSet<String> =
                serde_json::from_str(row.try_get::<String, _>("methods_json")?.as_str())?;
            let mut all_codes: BTreeSet<i64> =
                serde_json::from_str(row.try_get::<String, _>("status_codes_json")?.as_str())?;
            let mut all_types: BTreeSet<String> =
                serde_json::from_str(row.try_get::<String, _>("content_types_json")?.as_str())?;
            all_methods.extend(methods.iter().cloned());
            all_codes.extend(status_codes.iter());
            all_types.extend(content_types.iter().cloned());
            let was_auth_required: bool = row.try_get::<i64, _>("auth_required")? != 0;
            let existing_hint: String = row.try_get("auth_type_hint")?;
            let new_hint = if auth_type_hint.is_empty() {
                existing_hint
            } else {
                auth_type_hint.to_string()
            };

            sqlx::query(
                "UPDATE endpoints SET methods_json = ?1, status_codes_json = ?2, content_types_json = ?3, \
                 auth_required = ?4, auth_type_hint = ?5 WHERE id = ?6",
            )
            .bind(serde_json::to_string(&all_methods)?)
            .bind(serde_json::to_string(&all_codes)?)
            .bind(serde_json::to_string(&all_types)?)
            .bind(i64::from(was_auth_required || auth_required))
            .bind(new_hint)
            .bind(id)
            .execute(&self.pool)
            .await?;
            Ok(id)
        } else {
            let row = sqlx::query(
                "INSERT INTO endpoints (service_id, path, methods_json, status_codes_json, content_types_json, \
                 auth_required, auth_type_hint, discovered_by) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8) RETURNING id",
            )
            .bind(service_id)
            .bind(path)
            .bind(serde_json::to_string(methods)?)
            .bind(serde_json::to_string(status_codes)?)
            .bind(serde_json::to_string(content_types)?)
            .bind(i64::from(auth_required))
            .bind(auth_type_hint)
            .bind(discovered_by)
            .fetch_one(&self.pool)
            .await?;
            Ok(row.try_get("id")?)
        }
    }

    /// # Errors
    /// Returns an error on database failure.
    pub async fn get_endpoints(&self, service_id: i64) -> Result<Vec<Endpoint>> {
        let rows = sqlx::query("SELECT * FROM endpoints WHERE service_id = ?1 ORDER BY path")
            .bind(service_id)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(endpoint_from_row).collect()
    }

    /// # Errors
    /// Returns an error on database failure.
    pub async fn get_endpoint_paths(&self, service_id: i64) -> Result<BTreeSet<String>> {
        let rows = sqlx::query("SELECT path FROM endpoints WHERE service_id = ?1")
            .bind(service_id)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter()
            .map(|r| Ok(r.try_get::<String, _>("path")?))
            .collect()
    }

    // ---- Responses ---------------------------------------------------------

    /// Truncates the body sample to 2048 bytes (on a UTF-8 boundary) before
    /// appending; never deduplicates.
    ///
    /// # Errors
    /// Returns an error on database failure.
    #[allow(clippy::too_many_arguments)]
    pub async fn add_response(
        &self,
        endpoint_id: i64,
        method: &str,
        status_code: i64,
        headers: &serde_json::Value,
        body_schema: &serde_json::Value,
        body_sample: &str,
        content_type: &str,
        elapsed_ms: i64,
    ) -> Result<()> {
        let truncated = truncate_utf8(body_sample, 2048);
        sqlx::query(
            "INSERT INTO responses (endpoint_id, method, status_code, headers_json, body_schema_json, \
             body_sample, content_type, elapsed_ms) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        )
        .bind(endpoint_id)
        .bind(method)
        .bind(status_code)
        .bind(headers.to_string())
        .bind(body_schema.to_string())
        .bind(truncated)
        .bind(content_type)
        .bind(elapsed_ms)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// # Errors
    /// Returns an error on database failure.
    pub async fn get_responses(&self, endpoint_id: i64) -> Result<Vec<Response>> {
        let rows = sqlx::query("SELECT * FROM responses WHERE endpoint_id = ?1 ORDER BY id")
            .bind(endpoint_id)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(response_from_row).collect()
    }

    // ---- Parameters ---------------------------------------------------------

    /// `required` OR-latches; `example_value` overwrites only when non-empty.
    ///
    /// # Errors
    /// Returns an error on database failure.
    pub async fn upsert_parameter(
        &self,
        endpoint_id: i64,
        name: &str,
        param_type: &str,
        location: ParamLocation,
        required: bool,
        example_value: &str,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO parameters (endpoint_id, name, param_type, location, required, example_value) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6) \
             ON CONFLICT(endpoint_id, name, location) DO UPDATE SET \
                param_type = excluded.param_type, \
                required = CASE WHEN excluded.required != 0 THEN 1 ELSE parameters.required END, \
                example_value = CASE WHEN excluded.example_value != '' THEN excluded.example_value ELSE parameters.example_value END",
        )
        .bind(endpoint_id)
        .bind(name)
        .bind(param_type)
        .bind(location.as_str())
        .bind(i64::from(required))
        .bind(example_value)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// # Errors
    /// Returns an error on database failure.
    pub async fn get_parameters(&self, endpoint_id: i64) -> Result<Vec<Parameter>> {
        let rows = sqlx::query(
            "SELECT * FROM parameters WHERE endpoint_id = ?1 ORDER BY location, name",
        )
        .bind(endpoint_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(parameter_from_row).collect()
    }

    // ---- Probe runs ---------------------------------------------------------

    /// # Errors
    /// Returns an error on database failure.
    pub async fn create_probe_run(
        &self,
        service_id: i64,
        config: &serde_json::Value,
    ) -> Result<i64> {
        let row = sqlx::query(
            "INSERT INTO probe_runs (service_id, config_json) VALUES (?1, ?2) RETURNING id",
        )
        .bind(service_id)
        .bind(config.to_string())
        .fetch_one(&self.pool)
        .await?;
        Ok(row.try_get("id")?)
    }

    /// Updates only the fields given; sets `finished_at` iff the new status
    /// is terminal, per the ProbeRun invariant.
    ///
    /// # Errors
    /// Returns an error on database failure.
    pub async fn update_probe_run(
        &self,
        run_id: i64,
        status: Option<RunStatus>,
        total_requests: Option<i64>,
        endpoints_found: Option<i64>,
        progress: Option<&serde_json::Value>,
    ) -> Result<()> {
        if let Some(status) = status {
            if status.is_terminal() {
                sqlx::query(
                    "UPDATE probe_runs SET status = ?1, finished_at = ?2 WHERE id = ?3",
                )
                .bind(status.as_str())
                .bind(Utc::now().to_rfc3339())
                .bind(run_id)
                .execute(&self.pool)
                .await?;
            } else {
                sqlx::query("UPDATE probe_runs SET status = ?1 WHERE id = ?2")
                    .bind(status.as_str())
                    .bind(run_id)
                    .execute(&self.pool)
                    .await?;
            }
        }
        if let Some(total_requests) = total_requests {
            sqlx::query("UPDATE probe_runs SET total_requests = ?1 WHERE id = ?2")
                .bind(total_requests)
                .bind(run_id)
                .execute(&self.pool)
                .await?;
        }
        if let Some(endpoints_found) = endpoints_found {
            sqlx::query("UPDATE probe_runs SET endpoints_found = ?1 WHERE id = ?2")
                .bind(endpoints_found)
                .bind(run_id)
                .execute(&self.pool)
                .await?;
        }
        if let Some(progress) = progress {
            sqlx::query("UPDATE probe_runs SET progress_json = ?1 WHERE id = ?2")
                .bind(progress.to_string())
                .bind(run_id)
                .execute(&self.pool)
                .await?;
        }
        Ok(())
    }

    /// # Errors
    /// Returns an error on database failure.
    pub async fn get_last_probe_run(&self, service_id: i64) -> Result<Option<ProbeRun>> {
        let row = sqlx::query(
            "SELECT * FROM probe_runs WHERE service_id = ?1 ORDER BY id DESC LIMIT 1",
        )
        .bind(service_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(probe_run_from_row).transpose()
    }

    /// # Errors
    /// Returns an error on database failure.
    pub async fn get_probe_runs(&self, service_id: i64) -> Result<Vec<ProbeRun>> {
        let rows = sqlx::query("SELECT * FROM probe_runs WHERE service_id = ?1 ORDER BY id DESC")
            .bind(service_id)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(probe_run_from_row).collect()
    }

    // ---- Aggregate stats ---------------------------------------------------

    /// # Errors
    /// Returns an error on database failure.
    pub async fn get_service_stats(&self, service_id: i64) -> Result<ServiceStats> {
        let endpoints: i64 = sqlx::query("SELECT COUNT(*) AS c FROM endpoints WHERE service_id = ?1")
            .bind(service_id)
            .fetch_one(&self.pool)
            .await?
            .try_get("c")?;
        let responses: i64 = sqlx::query(
            "SELECT COUNT(*) AS c FROM responses r JOIN endpoints e ON r.endpoint_id = e.id WHERE e.service_id = ?1",
        )
        .bind(service_id)
        .fetch_one(&self.pool)
        .await?
        .try_get("c")?;
        let parameters: i64 = sqlx::query(
            "SELECT COUNT(*) AS c FROM parameters p JOIN endpoints e ON p.endpoint_id = e.id WHERE e.service_id = ?1",
        )
        .bind(service_id)
        .fetch_one(&self.pool)
        .await?
        .try_get("c")?;
        Ok(ServiceStats {
            endpoints,
            responses,
            parameters,
        })
    }
}

/// Truncates a string to at most `max_bytes` bytes, walking back to the
/// nearest UTF-8 character boundary so the result is always valid UTF-8.
#[must_use]
pub fn truncate_utf8(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

fn service_from_row(row: sqlx::sqlite::SqliteRow) -> Result<Service> {
    Ok(Service {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        base_url: row.try_get("base_url")?,
        description: row.try_get("description")?,
        discovered_at: parse_ts(&row.try_get::<String, _>("discovered_at")?),
        last_probed: row
            .try_get::<Option<String>, _>("last_probed")?
            .map(|s| parse_ts(&s)),
        server_header: row.try_get("server_header")?,
        robots_txt: row.try_get("robots_txt")?,
        metadata: serde_json::from_str(&row.try_get::<String, _>("metadata_json")?)?,
    })
}

fn endpoint_from_row(row: sqlx::sqlite::SqliteRow) -> Result<Endpoint> {
    Ok(Endpoint {
        id: row.try_get("id")?,
        service_id: row.try_get("service_id")?,
        path: row.try_get("path")?,
        methods: serde_json::from_str(&row.try_get::<String, _>("methods_json")?)?,
        status_codes: serde_json::from_str(&row.try_get::<String, _>("status_codes_json")?)?,
        content_types: serde_json::from_str(&row.try_get::<String, _>("content_types_json")?)?,
        auth_required: row.try_get::<i64, _>("auth_required")? != 0,
        auth_type_hint: row.try_get("auth_type_hint")?,
        discovered_by: row.try_get("discovered_by")?,
    })
}

fn response_from_row(row: sqlx::sqlite::SqliteRow) -> Result<Response> {
    Ok(Response {
        id: row.try_get("id")?,
        endpoint_id: row.try_get("endpoint_id")?,
        method: row.try_get("method")?,
        status_code: row.try_get("status_code")?,
        headers: serde_json::from_str(&row.try_get::<String, _>("headers_json")?)?,
        body_schema: serde_json::from_str(&row.try_get::<String, _>("body_schema_json")?)?,
        body_sample: row.try_get("body_sample")?,
        content_type: row.try_get("content_type")?,
        elapsed_ms: row.try_get("elapsed_ms")?,
    })
}

fn parameter_from_row(row: sqlx::sqlite::SqliteRow) -> Result<Parameter> {
    Ok(Parameter {
        id: row.try_get("id")?,
        endpoint_id: row.try_get("endpoint_id")?,
        name: row.try_get("name")?,
        param_type: row.try_get("param_type")?,
        location: ParamLocation::parse(&row.try_get::<String, _>("location")?),
        required: row.try_get::<i64, _>("required")? != 0,
        example_value: row.try_get("example_value")?,
    })
}

fn probe_run_from_row(row: sqlx::sqlite::SqliteRow) -> Result<ProbeRun> {
    Ok(ProbeRun {
        id: row.try_get("id")?,
        service_id: row.try_get("service_id")?,
        started_at: parse_ts(&row.try_get::<String, _>("started_at")?),
        finished_at: row
            .try_get::<Option<String>, _>("finished_at")?
            .map(|s| parse_ts(&s)),
        status: RunStatus::parse(&row.try_get::<String, _>("status")?),
        config: serde_json::from_str(&row.try_get::<String, _>("config_json")?)?,
        total_requests: row.try_get("total_requests")?,
        endpoints_found: row.try_get("endpoints_found")?,
        progress: serde_json::from_str(&row.try_get::<String, _>("progress_json")?)?,
    })
}

/// Parses a timestamp stored either as RFC3339 (our writes) or SQLite's
/// `datetime('now')` format (the column default), falling back to `now()`.
fn parse_ts(raw: &str) -> chrono::DateTime<Utc> {
    chrono::DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
                .map(|naive| naive.and_utc())
        })
        .unwrap_or_else(|_| Utc::now())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    async fn memory_store() -> Store {
        Store::connect(&std::env::temp_dir().join(format!(
            "api_prober_test_{}.db",
            fastrand_seed()
        )))
        .await
        .unwrap()
    }

    fn fastrand_seed() -> u64 {
        use std::time::{SystemTime, UNIX_EPOCH};
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos() as u64
    }

    #[tokio::test]
    async fn endpoint_upsert_unions_sets_monotonically() {
        let store = memory_store().await;
        let svc = store
            .upsert_service("example", "https://example.com", "", "", None)
            .await
            .unwrap();

        let methods_a: BTreeSet<String> = ["GET"].into_iter().map(String::from).collect();
        let codes_a: BTreeSet<i64> = [200].into_iter().collect();
        let types_a: BTreeSet<String> = ["application/json".to_string()].into_iter().collect();
        store
            .upsert_endpoint(svc, "/users", &methods_a, &codes_a, false, "", &types_a, "wordlist")
            .await
            .unwrap();

        let methods_b: BTreeSet<String> = ["POST"].into_iter().map(String::from).collect();
        let codes_b: BTreeSet<i64> = [401].into_iter().collect();
        store
            .upsert_endpoint(
                svc,
                "/users",
                &methods_b,
                &codes_b,
                true,
                "bearer",
                &BTreeSet::new(),
                "method",
            )
            .await
            .unwrap();

        let endpoints = store.get_endpoints(svc).await.unwrap();
        assert_eq!(endpoints.len(), 1);
        let ep = &endpoints[0];
        assert_eq!(ep.methods, ["GET", "POST"].into_iter().map(String::from).collect());
        assert_eq!(ep.status_codes, [200, 401].into_iter().collect());
        assert!(ep.auth_required);
        assert_eq!(ep.auth_type_hint, "bearer");
    }

    #[tokio::test]
    async fn auth_required_never_regresses() {
        let store = memory_store().await;
        let svc = store
            .upsert_service("example", "https://example.com", "", "", None)
            .await
            .unwrap();
        store
            .upsert_endpoint(
                svc,
                "/x",
                &BTreeSet::new(),
                &BTreeSet::new(),
                true,
                "bearer",
                &BTreeSet::new(),
                "wordlist",
            )
            .await
            .unwrap();
        store
            .upsert_endpoint(
                svc,
                "/x",
                &BTreeSet::new(),
                &BTreeSet::new(),
                false,
                "",
                &BTreeSet::new(),
                "method",
            )
            .await
            .unwrap();
        let ep = &store.get_endpoints(svc).await.unwrap()[0];
        assert!(ep.auth_required);
        assert_eq!(ep.auth_type_hint, "bearer");
    }

    #[tokio::test]
    async fn response_body_sample_is_truncated() {
        let store = memory_store().await;
        let svc = store
            .upsert_service("example", "https://example.com", "", "", None)
            .await
            .unwrap();
        let ep = store
            .upsert_endpoint(
                svc,
                "/big",
                &BTreeSet::new(),
                &BTreeSet::new(),
                false,
                "",
                &BTreeSet::new(),
                "wordlist",
            )
            .await
            .unwrap();
        let body = "x".repeat(5000);
        store
            .add_response(ep, "GET", 200, &serde_json::json!({}), &serde_json::json!({}), &body, "text/plain", 10)
            .await
            .unwrap();
        let responses = store.get_responses(ep).await.unwrap();
        assert!(responses[0].body_sample.len() <= 2048);
    }

    #[test]
    fn truncate_utf8_respects_char_boundaries() {
        let s = "héllo world";
        let truncated = truncate_utf8(s, 2);
        assert!(s.is_char_boundary(truncated.len()));
    }
}
