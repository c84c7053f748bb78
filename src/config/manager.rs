//! Loads, merges, and persists [`ProbeConfig`] as a JSON file on disk.
//!
//! Merge semantics follow the original `_deep_merge`: nested objects merge
//! key-by-key, any other value (including lists) present in the override
//! document replaces the default wholesale, regardless of whether it is
//! empty. Dot-path `get`/`set` operate on the same JSON view so `config
//! --set auth.type bearer` can reach nested fields.

use crate::config::models::ProbeConfig;
use crate::error::{Error, Result};
use std::path::{Path, PathBuf};

pub struct ConfigManager {
    /// Directory holding `config.json`, the SQLite store, and the `STOP` sentinel.
    config_dir: PathBuf,
}

impl ConfigManager {
    /// Resolves the default config directory via `dirs::config_dir()`.
    ///
    /// # Errors
    /// Returns an error if no config directory can be determined for this platform.
    pub fn new() -> Result<Self> {
        let base = dirs::config_dir().ok_or_else(|| {
            Error::config("could not determine a platform config directory")
        })?;
        Ok(Self::with_dir(base.join("api-prober")))
    }

    #[must_use]
    pub fn with_dir(config_dir: PathBuf) -> Self {
        Self { config_dir }
    }

    #[must_use]
    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    #[must_use]
    pub fn config_path(&self) -> PathBuf {
        self.config_dir.join("config.json")
    }

    #[must_use]
    pub fn stop_sentinel_path(&self) -> PathBuf {
        self.config_dir.join("STOP")
    }

    #[must_use]
    pub fn wordlists_dir(&self) -> PathBuf {
        self.config_dir.join("wordlists")
    }

    #[must_use]
    pub fn db_path(&self, config: &ProbeConfig) -> PathBuf {
        self.config_dir.join(&config.db_path)
    }

    #[must_use]
    pub fn export_dir(&self, config: &ProbeConfig) -> PathBuf {
        self.config_dir.join(&config.export_dir)
    }

    /// Loads the config file (if present), deep-merges it over the defaults,
    /// and returns the resulting typed config.
    ///
    /// # Errors
    /// Returns an error if the file exists but is not valid JSON, or the
    /// merged document does not match [`ProbeConfig`]'s shape.
    pub fn load(&self) -> Result<ProbeConfig> {
        let path = self.config_path();
        let mut base = serde_json::to_value(ProbeConfig::default())?;
        if path.exists() {
            let raw = std::fs::read_to_string(&path)?;
            let override_doc: serde_json::Value = serde_json::from_str(&raw)?;
            deep_merge(&mut base, &override_doc);
        }
        Ok(serde_json::from_value(base)?)
    }

    /// Writes `config` as pretty JSON, creating the config directory if needed.
    ///
    /// # Errors
    /// Returns an error if the directory can't be created or the file written.
    pub fn save(&self, config: &ProbeConfig) -> Result<()> {
        std::fs::create_dir_all(&self.config_dir)?;
        let json = serde_json::to_string_pretty(config)?;
        std::fs::write(self.config_path(), json)?;
        Ok(())
    }

    /// Loads the raw JSON document (defaults merged with the on-disk override),
    /// for `config --show` / dot-path access.
    ///
    /// # Errors
    /// Returns an error if the on-disk file is not valid JSON.
    pub fn load_raw(&self) -> Result<serde_json::Value> {
        let mut base = serde_json::to_value(ProbeConfig::default())?;
        let path = self.config_path();
        if path.exists() {
            let raw = std::fs::read_to_string(&path)?;
            let override_doc: serde_json::Value = serde_json::from_str(&raw)?;
            deep_merge(&mut base, &override_doc);
        }
        Ok(base)
    }

    /// Sets a dot-path key (e.g. `auth.type`) to a value coerced from its
    /// string representation (bool, then integer, then float, else string),
    /// merges it into the raw config document, validates it still parses as
    /// a [`ProbeConfig`], and persists the raw document.
    ///
    /// # Errors
    /// Returns an error if the resulting document no longer matches
    /// [`ProbeConfig`]'s shape, or the file can't be written.
    pub fn set(&self, key: &str, raw_value: &str) -> Result<serde_json::Value> {
        let mut doc = self.load_raw()?;
        let value = coerce(raw_value);
        set_dot_path(&mut doc, key, value.clone());
        // Validate the mutated document still deserializes as a ProbeConfig
        // before committing it to disk.
        let _: ProbeConfig = serde_json::from_value(doc.clone())
            .map_err(|e| Error::config(format!("invalid config after setting '{key}': {e}")))?;
        std::fs::create_dir_all(&self.config_dir)?;
        std::fs::write(self.config_path(), serde_json::to_string_pretty(&doc)?)?;
        Ok(value)
    }
}

/// Recursively merges `override_doc` into `base`. Objects merge key-by-key;
/// any other value present in `override_doc` (including an empty array)
/// replaces the corresponding value in `base` wholesale.
pub(crate) fn deep_merge(base: &mut serde_json::Value, override_doc: &serde_json::Value) {
    let (serde_json::Value::Object(base_map), serde_json::Value::Object(override_map)) =
        (base, override_doc)
    else {
        return;
    };
    for (key, value) in override_map {
        match base_map.get_mut(key) {
            Some(existing @ serde_json::Value::Object(_)) if value.is_object() => {
                deep_merge(existing, value);
            }
            _ => {
                base_map.insert(key.clone(), value.clone());
            }
        }
    }
}

fn set_dot_path(doc: &mut serde_json::Value, key: &str, value: serde_json::Value) {
    let parts: Vec<&str> = key.split('.').collect();
    let mut target = doc;
    for part in &parts[..parts.len() - 1] {
        if !target.get(*part).is_some_and(serde_json::Value::is_object) {
            if let serde_json::Value::Object(map) = target {
                map.insert((*part).to_string(), serde_json::Value::Object(Default::default()));
            }
        }
        target = target
            .get_mut(*part)
            .expect("just ensured this key is an object");
    }
    if let serde_json::Value::Object(map) = target {
        map.insert((*parts.last().unwrap()).to_string(), value);
    }
}

/// Coerces a raw CLI string into bool, then integer, then float, falling
/// back to string — matching `config --set KEY VALUE`'s conversion rule.
fn coerce(raw: &str) -> serde_json::Value {
    if raw.eq_ignore_ascii_case("true") {
        return serde_json::Value::Bool(true);
    }
    if raw.eq_ignore_ascii_case("false") {
        return serde_json::Value::Bool(false);
    }
    if let Ok(i) = raw.parse::<i64>() {
        return serde_json::Value::Number(i.into());
    }
    if let Ok(f) = raw.parse::<f64>() {
        if let Some(n) = serde_json::Number::from_f64(f) {
            return serde_json::Value::Number(n);
        }
    }
    serde_json::Value::String(raw.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_falls_back_to_defaults_when_no_file_exists() {
        let dir = tempfile::tempdir().unwrap();
        let manager = ConfigManager::with_dir(dir.path().join("cfg"));
        let config = manager.load().unwrap();
        assert_eq!(config.delay_ms, 500);
        assert_eq!(config.max_requests, 500);
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let manager = ConfigManager::with_dir(dir.path().to_path_buf());
        let config = ProbeConfig {
            delay_ms: 1234,
            ..ProbeConfig::default()
        };
        manager.save(&config).unwrap();
        let loaded = manager.load().unwrap();
        assert_eq!(loaded.delay_ms, 1234);
    }

    #[test]
    fn set_coerces_and_persists_nested_key() {
        let dir = tempfile::tempdir().unwrap();
        let manager = ConfigManager::with_dir(dir.path().to_path_buf());
        manager.set("auth.type", "bearer").unwrap();
        manager.set("delay_ms", "250").unwrap();
        let loaded = manager.load().unwrap();
        assert_eq!(loaded.delay_ms, 250);
        assert!(matches!(
            loaded.auth.auth_type,
            crate::config::models::AuthType::Bearer
        ));
    }

    #[test]
    fn deep_merge_overrides_empty_list_explicitly() {
        let mut base = serde_json::json!({"strategies": ["openapi", "wordlist"], "other": 1});
        let override_doc = serde_json::json!({"strategies": []});
        deep_merge(&mut base, &override_doc);
        assert_eq!(base["strategies"], serde_json::json!([]));
        assert_eq!(base["other"], serde_json::json!(1));
    }
}
