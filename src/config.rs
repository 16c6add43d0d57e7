//! Application configuration
//!
//! Settings are layered: built-in defaults, then an optional JSON file named
//! by `VIDEO_SCREENING_CONFIG`, then individual environment overrides.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Environment variable naming an optional JSON config file
pub const CONFIG_PATH_ENV: &str = "VIDEO_SCREENING_CONFIG";
pub const API_BASE_ENV: &str = "VIDEO_SCREENING_API_BASE";
pub const GRAPHQL_URL_ENV: &str = "VIDEO_SCREENING_GRAPHQL_URL";
pub const APP_BASE_ENV: &str = "VIDEO_SCREENING_APP_BASE";
pub const MAX_SECONDS_ENV: &str = "VIDEO_SCREENING_MAX_SECONDS";

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// Runtime settings shared by the recorder, upload client and data client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppConfig {
    /// Base URL of the screening API (upload endpoint lives under it)
    pub api_base: String,

    /// GraphQL endpoint. Derived from `api_base` when unset.
    pub graphql_url: Option<String>,

    /// Base URL of the candidate-facing app, used for invite links
    pub app_base: String,

    /// Maximum recording length in seconds
    pub max_recording_secs: u32,

    /// Container/codec requested from the encoder
    pub mime_type: String,

    /// Per-request timeout for HTTP calls
    pub request_timeout_secs: u64,

    /// Invite id preselected on the dashboard
    pub default_invite_id: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_base: "http://localhost:8000".to_string(),
            graphql_url: None,
            app_base: "http://localhost:5173".to_string(),
            max_recording_secs: 120,
            mime_type: "video/webm".to_string(),
            request_timeout_secs: 30,
            default_invite_id: "demo-123".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the process environment
    pub fn load() -> Result<Self, ConfigError> {
        let lookup = |key: &str| std::env::var(key).ok();
        Self::load_with(lookup)
    }

    /// Load configuration using a custom variable lookup
    pub fn load_with<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match lookup(CONFIG_PATH_ENV) {
            Some(path) => Self::from_file(Path::new(&path))?,
            None => Self::default(),
        };

        if let Some(api_base) = lookup(API_BASE_ENV) {
            config.api_base = api_base;
        }
        if let Some(graphql_url) = lookup(GRAPHQL_URL_ENV) {
            config.graphql_url = Some(graphql_url);
        }
        if let Some(app_base) = lookup(APP_BASE_ENV) {
            config.app_base = app_base;
        }
        if let Some(max) = lookup(MAX_SECONDS_ENV) {
            config.max_recording_secs = max.trim().parse().map_err(|e| ConfigError::Invalid {
                key: "maxRecordingSecs",
                reason: format!("{max:?} is not a whole number of seconds ({e})"),
            })?;
        }

        config.validate()?;
        tracing::debug!("Loaded configuration: {:?}", config);
        Ok(config)
    }

    /// Read a JSON config file. Missing keys fall back to defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: AppConfig = serde_json::from_str(&content)?;
        tracing::info!("Read configuration from {:?}", path);
        Ok(config)
    }

    /// Check invariants the rest of the crate relies on
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_recording_secs == 0 {
            return Err(ConfigError::Invalid {
                key: "maxRecordingSecs",
                reason: "must be at least 1 second".to_string(),
            });
        }
        check_http_url("apiBase", &self.api_base)?;
        check_http_url("appBase", &self.app_base)?;
        if let Some(url) = &self.graphql_url {
            check_http_url("graphqlUrl", url)?;
        }
        if self.mime_type.trim().is_empty() {
            return Err(ConfigError::Invalid {
                key: "mimeType",
                reason: "must not be empty".to_string(),
            });
        }
        Ok(())
    }

    /// GraphQL endpoint, explicit or `{apiBase}/graphql`
    pub fn graphql_endpoint(&self) -> String {
        match &self.graphql_url {
            Some(url) => url.clone(),
            None => format!("{}/graphql", self.api_base.trim_end_matches('/')),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn check_http_url(key: &'static str, value: &str) -> Result<(), ConfigError> {
    if value.starts_with("http://") || value.starts_with("https://") {
        Ok(())
    } else {
        Err(ConfigError::Invalid {
            key,
            reason: format!("{value:?} is not an http(s) URL"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::load_with(|_| None).unwrap();
        assert_eq!(config.max_recording_secs, 120);
        assert_eq!(config.mime_type, "video/webm");
        assert_eq!(config.graphql_endpoint(), "http://localhost:8000/graphql");
        assert_eq!(config.default_invite_id, "demo-123");
    }

    #[test]
    fn test_env_overrides() {
        let vars = env(&[
            (API_BASE_ENV, "https://api.example.com/"),
            (MAX_SECONDS_ENV, "45"),
        ]);
        let config = AppConfig::load_with(|k| vars.get(k).cloned()).unwrap();
        assert_eq!(config.max_recording_secs, 45);
        assert_eq!(config.graphql_endpoint(), "https://api.example.com/graphql");
    }

    #[test]
    fn test_explicit_graphql_url_wins() {
        let vars = env(&[(GRAPHQL_URL_ENV, "http://gql.local/api")]);
        let config = AppConfig::load_with(|k| vars.get(k).cloned()).unwrap();
        assert_eq!(config.graphql_endpoint(), "http://gql.local/api");
    }

    #[test]
    fn test_zero_max_seconds_rejected() {
        let vars = env(&[(MAX_SECONDS_ENV, "0")]);
        let err = AppConfig::load_with(|k| vars.get(k).cloned()).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "maxRecordingSecs", .. }));
    }

    #[test]
    fn test_non_numeric_max_seconds_rejected() {
        let vars = env(&[(MAX_SECONDS_ENV, "two minutes")]);
        assert!(AppConfig::load_with(|k| vars.get(k).cloned()).is_err());
    }

    #[test]
    fn test_non_http_base_rejected() {
        let vars = env(&[(API_BASE_ENV, "ftp://files")]);
        assert!(AppConfig::load_with(|k| vars.get(k).cloned()).is_err());
    }

    #[test]
    fn test_file_then_env_layering() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"apiBase": "http://file.local", "maxRecordingSecs": 60}}"#).unwrap();

        let path = file.path().to_string_lossy().to_string();
        let vars = env(&[(CONFIG_PATH_ENV, path.as_str()), (MAX_SECONDS_ENV, "30")]);
        let config = AppConfig::load_with(|k| vars.get(k).cloned()).unwrap();

        assert_eq!(config.api_base, "http://file.local");
        assert_eq!(config.max_recording_secs, 30);
        // Keys absent from the file keep their defaults
        assert_eq!(config.mime_type, "video/webm");
    }
}
