//! Engine configuration.
//!
//! Supports loading configuration from:
//! 1. Configuration files (YAML)
//! 2. Environment variables (with ARNICA_ prefix)
//!
//! Configuration precedence (highest to lowest):
//! 1. Environment variables
//! 2. Configuration file
//! 3. Default values

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::backoff::RetryPolicy;
use crate::encoder::Limits;
use crate::engine::WaitOptions;
use crate::error::{JobsError, JobsResult};
use crate::persistence::{CredentialsRef, DEFAULT_TOKEN_ENV, default_store_path};

/// Smallest poll interval accepted from configuration.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Default portal API base.
pub const DEFAULT_PORTAL_URL: &str = "https://arnica.aqt.eu/api/v1";

/// Complete engine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Portal connection
    #[serde(default)]
    pub portal: PortalConfig,

    /// Result polling
    #[serde(default)]
    pub polling: PollingConfig,

    /// Resource limits enforced before submission
    #[serde(default)]
    pub limits: Limits,

    /// Persistence store
    #[serde(default)]
    pub store: StoreConfig,

    /// Logging
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Portal connection settings.
#[derive(Clone, Serialize, Deserialize)]
pub struct PortalConfig {
    /// API base URL
    #[serde(default = "default_portal_url")]
    pub url: String,

    /// Request timeout in seconds
    #[serde(default = "default_portal_timeout")]
    pub timeout_seconds: u64,

    /// Environment variable holding the access token
    #[serde(default = "default_token_env")]
    pub token_env: String,

    /// Inline access token, used instead of `token_env` when set
    #[serde(default, skip_serializing)]
    pub token: Option<String>,
}

impl fmt::Debug for PortalConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PortalConfig")
            .field("url", &self.url)
            .field("timeout_seconds", &self.timeout_seconds)
            .field("token_env", &self.token_env)
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            url: default_portal_url(),
            timeout_seconds: default_portal_timeout(),
            token_env: default_token_env(),
            token: None,
        }
    }
}

impl PortalConfig {
    /// Reference to the token for persisted records.
    pub fn credentials(&self) -> CredentialsRef {
        CredentialsRef::env(&self.token_env)
    }

    /// The access token: the inline one, else the content of `token_env`.
    pub fn resolve_token(&self) -> Option<String> {
        self.token
            .clone()
            .or_else(|| std::env::var(&self.token_env).ok())
    }
}

/// Result polling settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingConfig {
    /// Interval between result queries in milliseconds
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,

    /// Local wait timeout in seconds; absent means wait indefinitely
    #[serde(default)]
    pub timeout_seconds: Option<u64>,

    /// Retries of a failing result query
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// First retry delay in milliseconds
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,

    /// Retry delay cap in milliseconds
    #[serde(default = "default_backoff_max_ms")]
    pub backoff_max_ms: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            timeout_seconds: None,
            max_retries: default_max_retries(),
            backoff_base_ms: default_backoff_base_ms(),
            backoff_max_ms: default_backoff_max_ms(),
        }
    }
}

impl PollingConfig {
    /// Wait options, with the poll interval floored at [`MIN_POLL_INTERVAL`].
    pub fn wait_options(&self) -> WaitOptions {
        WaitOptions {
            timeout: self.timeout_seconds.map(Duration::from_secs),
            poll_interval: Duration::from_millis(self.interval_ms).max(MIN_POLL_INTERVAL),
        }
    }

    /// Retry policy of result queries.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            base_delay: Duration::from_millis(self.backoff_base_ms),
            max_delay: Duration::from_millis(self.backoff_max_ms),
        }
    }
}

/// Persistence store settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Store directory; the per-version user cache directory when absent
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl StoreConfig {
    /// Directory the JSON store uses.
    pub fn resolved_path(&self) -> JobsResult<PathBuf> {
        match &self.path {
            Some(path) => Ok(path.clone()),
            None => default_store_path(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error"
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: "console" or "json"
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

// Default value functions
fn default_portal_url() -> String {
    DEFAULT_PORTAL_URL.to_string()
}

fn default_portal_timeout() -> u64 {
    60
}

fn default_token_env() -> String {
    DEFAULT_TOKEN_ENV.to_string()
}

fn default_interval_ms() -> u64 {
    1000
}

fn default_max_retries() -> u32 {
    3
}

fn default_backoff_base_ms() -> u64 {
    250
}

fn default_backoff_max_ms() -> u64 {
    5000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "console".to_string()
}

impl EngineConfig {
    /// Load configuration from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> JobsResult<Self> {
        let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            JobsError::Config(format!("cannot read {}: {e}", path.as_ref().display()))
        })?;
        Self::from_yaml(&contents)
    }

    /// Parse and validate a YAML document.
    pub fn from_yaml(contents: &str) -> JobsResult<Self> {
        let config: EngineConfig = serde_yaml_ng::from_str(contents)
            .map_err(|e| JobsError::Config(format!("parse error: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults overridden by environment variables.
    pub fn from_env() -> Self {
        Self::default().merge_env()
    }

    /// Load configuration with the following precedence:
    /// 1. Load from file if provided
    /// 2. Apply environment variable overrides
    pub fn load(config_file: Option<&Path>) -> JobsResult<Self> {
        let config = match config_file {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        let config = config.merge_env();
        config.validate()?;
        Ok(config)
    }

    /// Merge environment variables into this configuration.
    fn merge_env(self) -> Self {
        self.merge_vars(|name| std::env::var(name).ok())
    }

    /// Apply overrides from `lookup`; variables it does not know leave the
    /// corresponding fields unchanged, unparsable numbers are ignored.
    pub fn merge_vars(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        fn parsed<T: std::str::FromStr>(
            lookup: &impl Fn(&str) -> Option<String>,
            name: &str,
        ) -> Option<T> {
            lookup(name).and_then(|v| v.parse().ok())
        }

        // Portal
        if let Some(v) = lookup("ARNICA_PORTAL_URL") {
            self.portal.url = v;
        }
        if let Some(v) = parsed(&lookup, "ARNICA_PORTAL_TIMEOUT") {
            self.portal.timeout_seconds = v;
        }
        if let Some(v) = lookup("ARNICA_TOKEN_ENV") {
            self.portal.token_env = v;
        }

        // Polling
        if let Some(v) = parsed(&lookup, "ARNICA_POLL_INTERVAL_MS") {
            self.polling.interval_ms = v;
        }
        if let Some(v) = parsed(&lookup, "ARNICA_POLL_TIMEOUT") {
            self.polling.timeout_seconds = Some(v);
        }
        if let Some(v) = parsed(&lookup, "ARNICA_MAX_RETRIES") {
            self.polling.max_retries = v;
        }
        if let Some(v) = parsed(&lookup, "ARNICA_BACKOFF_BASE_MS") {
            self.polling.backoff_base_ms = v;
        }
        if let Some(v) = parsed(&lookup, "ARNICA_BACKOFF_MAX_MS") {
            self.polling.backoff_max_ms = v;
        }

        // Limits
        if let Some(v) = parsed(&lookup, "ARNICA_MAX_CIRCUITS") {
            self.limits.max_circuits = v;
        }
        if let Some(v) = parsed(&lookup, "ARNICA_MAX_SHOTS") {
            self.limits.max_shots = v;
        }
        if let Some(v) = parsed(&lookup, "ARNICA_MAX_OPERATIONS") {
            self.limits.max_operations = v;
        }

        // Store
        if let Some(v) = lookup("ARNICA_STORE_PATH") {
            self.store.path = Some(PathBuf::from(v));
        }

        // Logging
        if let Some(v) = lookup("ARNICA_LOG_LEVEL") {
            self.logging.level = v;
        }
        if let Some(v) = lookup("ARNICA_LOG_FORMAT") {
            self.logging.format = v;
        }

        self
    }

    /// Validate configuration values.
    pub fn validate(&self) -> JobsResult<()> {
        if !self.portal.url.starts_with("http://") && !self.portal.url.starts_with("https://") {
            return Err(JobsError::Config(format!(
                "Invalid portal URL: {}",
                self.portal.url
            )));
        }
        if self.portal.timeout_seconds == 0 {
            return Err(JobsError::Config(
                "portal.timeout_seconds must be greater than 0".to_string(),
            ));
        }
        if self.portal.token_env.is_empty() {
            return Err(JobsError::Config(
                "portal.token_env must not be empty".to_string(),
            ));
        }

        if self.polling.backoff_base_ms > self.polling.backoff_max_ms {
            return Err(JobsError::Config(
                "polling.backoff_base_ms must not exceed polling.backoff_max_ms".to_string(),
            ));
        }

        if self.limits.max_circuits == 0
            || self.limits.max_shots == 0
            || self.limits.max_operations == 0
        {
            return Err(JobsError::Config(
                "limits must be greater than 0".to_string(),
            ));
        }

        match self.logging.level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            other => {
                return Err(JobsError::Config(format!("Invalid log level: {other}")));
            }
        }

        match self.logging.format.as_str() {
            "console" | "json" => {}
            other => {
                return Err(JobsError::Config(format!("Invalid log format: {other}")));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rustc_hash::FxHashMap;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: FxHashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.portal.url, DEFAULT_PORTAL_URL);
        assert_eq!(config.portal.token_env, "AQT_TOKEN");
        assert_eq!(config.polling.interval_ms, 1000);
        assert_eq!(config.limits.max_shots, 2000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_yaml_partial_sections() {
        let config = EngineConfig::from_yaml(
            r"
polling:
  interval_ms: 50
  timeout_seconds: 30
limits:
  max_circuits: 10
logging:
  format: json
",
        )
        .unwrap();
        assert_eq!(config.limits.max_circuits, 10);
        assert_eq!(config.limits.max_shots, 2000);
        assert_eq!(config.logging.format, "json");
        assert_eq!(config.logging.level, "info");

        let options = config.polling.wait_options();
        assert_eq!(options.poll_interval, MIN_POLL_INTERVAL);
        assert_eq!(options.timeout, Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_env_overrides_file() {
        let config = EngineConfig::from_yaml("portal:\n  url: https://example.org/api/v1\n")
            .unwrap()
            .merge_vars(vars(&[
                ("ARNICA_PORTAL_URL", "http://localhost:8000/api/v1"),
                ("ARNICA_MAX_RETRIES", "7"),
                ("ARNICA_MAX_SHOTS", "not-a-number"),
                ("ARNICA_STORE_PATH", "/tmp/arnica"),
            ]));
        assert_eq!(config.portal.url, "http://localhost:8000/api/v1");
        assert_eq!(config.polling.max_retries, 7);
        assert_eq!(config.limits.max_shots, 2000);
        assert_eq!(
            config.store.resolved_path().unwrap(),
            PathBuf::from("/tmp/arnica")
        );
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = EngineConfig::default();
        config.logging.level = "loud".into();
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.portal.url = "ftp://nowhere".into();
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.polling.backoff_base_ms = 10_000;
        assert!(config.validate().is_err());

        assert!(EngineConfig::from_yaml("limits:\n  max_shots: 0\n").is_err());
    }

    #[test]
    fn test_token_redacted_in_debug() {
        let mut config = EngineConfig::default();
        config.portal.token = Some("secret-token".into());
        let debug = format!("{config:?}");
        assert!(!debug.contains("secret-token"));
        assert!(debug.contains("[REDACTED]"));
        assert_eq!(config.portal.resolve_token().as_deref(), Some("secret-token"));
    }

    #[test]
    fn test_retry_policy_from_config() {
        let policy = EngineConfig::default().polling.retry_policy();
        assert_eq!(policy, RetryPolicy::default());
    }
}
