//! Settings file model
//!
//! ```yaml
//! endpoint: https://api.example.cloud/v1
//! region: tk1
//! timeout_secs: 1200
//! poll_interval_secs: 5
//! retry:
//!   initial_delay_ms: 1000
//!   max_delay_ms: 30000
//!   multiplier: 2.0
//! operations:
//!   switch-master:
//!     timeout_secs: 3600
//! status_tables:
//!   legacy-db:
//!     DONE: success
//!     BUSY: running
//! ```

use crate::error::{ConfigError, Result};
use converge_core::{ConvergeConfig, RetryConfig, StatusMap, TaskStatus};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

/// Top-level settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    /// API endpoint (overridable from the CLI / environment)
    #[serde(default)]
    pub endpoint: Option<String>,

    #[serde(default)]
    pub region: Option<String>,

    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    #[serde(default = "default_submit_timeout")]
    pub submit_timeout_secs: u64,

    #[serde(default = "default_poll_request_timeout")]
    pub poll_request_timeout_secs: u64,

    #[serde(default)]
    pub retry: RetrySettings,

    /// Overrides keyed by action name
    #[serde(default)]
    pub operations: BTreeMap<String, OperationOverride>,

    /// Extra status vocabularies keyed by backend name
    #[serde(default)]
    pub status_tables: BTreeMap<String, BTreeMap<String, TaskStatus>>,
}

fn default_timeout() -> u64 {
    1200 // 20分
}
fn default_poll_interval() -> u64 {
    5
}
fn default_submit_timeout() -> u64 {
    60
}
fn default_poll_request_timeout() -> u64 {
    30
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            endpoint: None,
            region: None,
            timeout_secs: default_timeout(),
            poll_interval_secs: default_poll_interval(),
            submit_timeout_secs: default_submit_timeout(),
            poll_request_timeout_secs: default_poll_request_timeout(),
            retry: RetrySettings::default(),
            operations: BTreeMap::new(),
            status_tables: BTreeMap::new(),
        }
    }
}

/// Submit backoff settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrySettings {
    #[serde(default = "default_initial_delay")]
    pub initial_delay_ms: u64,
    #[serde(default = "default_max_delay")]
    pub max_delay_ms: u64,
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
}

fn default_initial_delay() -> u64 {
    1000
}
fn default_max_delay() -> u64 {
    30000
}
fn default_multiplier() -> f64 {
    2.0
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            initial_delay_ms: default_initial_delay(),
            max_delay_ms: default_max_delay(),
            multiplier: default_multiplier(),
        }
    }
}

impl From<&RetrySettings> for RetryConfig {
    fn from(settings: &RetrySettings) -> Self {
        RetryConfig {
            initial_delay: Duration::from_millis(settings.initial_delay_ms),
            max_delay: Duration::from_millis(settings.max_delay_ms),
            backoff_multiplier: settings.multiplier,
        }
    }
}

/// Per-operation timing overrides
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OperationOverride {
    pub timeout_secs: Option<u64>,
    pub poll_interval_secs: Option<u64>,
    pub submit_timeout_secs: Option<u64>,
}

impl Settings {
    pub fn from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        // 空ファイルはデフォルト設定として扱う
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let settings: Settings = serde_yaml::from_str(content)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if self.timeout_secs == 0 {
            return Err(ConfigError::Invalid("timeout_secs must be > 0".to_string()));
        }
        if self.poll_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "poll_interval_secs must be > 0".to_string(),
            ));
        }
        if self.poll_request_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "poll_request_timeout_secs must be > 0".to_string(),
            ));
        }
        if self.retry.multiplier < 1.0 {
            return Err(ConfigError::Invalid(
                "retry.multiplier must be >= 1.0".to_string(),
            ));
        }
        for (action, op) in &self.operations {
            if op.timeout_secs == Some(0) || op.poll_interval_secs == Some(0) {
                return Err(ConfigError::Invalid(format!(
                    "operations.{}: timeouts and intervals must be > 0",
                    action
                )));
            }
        }
        Ok(())
    }

    /// Timing for `action`, with its override applied
    pub fn converge_config(&self, action: &str) -> ConvergeConfig {
        let op = self.operations.get(action).cloned().unwrap_or_default();

        ConvergeConfig::new(
            Duration::from_secs(op.timeout_secs.unwrap_or(self.timeout_secs)),
            Duration::from_secs(op.poll_interval_secs.unwrap_or(self.poll_interval_secs)),
        )
        .with_submit_timeout(Duration::from_secs(
            op.submit_timeout_secs.unwrap_or(self.submit_timeout_secs),
        ))
        .with_poll_request_timeout(Duration::from_secs(self.poll_request_timeout_secs))
        .with_retry(RetryConfig::from(&self.retry))
    }

    /// Custom status table for `backend`, if one is configured
    pub fn status_map(&self, backend: &str) -> Option<StatusMap> {
        self.status_tables
            .get(backend)
            .map(|entries| StatusMap::from_entries(backend, entries.iter().map(|(k, v)| (k, *v))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        let config = settings.converge_config("start-replication");

        assert_eq!(config.timeout, Duration::from_secs(1200));
        assert_eq!(config.poll_interval, Duration::from_secs(5));
        assert_eq!(config.submit_timeout, Duration::from_secs(60));
        assert_eq!(config.retry, RetryConfig::default());
    }

    #[test]
    fn test_operation_override() {
        let yaml = r#"
timeout_secs: 600
poll_interval_secs: 5
operations:
  switch-master:
    timeout_secs: 3600
    poll_interval_secs: 15
"#;
        let settings = Settings::from_yaml(yaml).unwrap();

        let switch = settings.converge_config("switch-master");
        assert_eq!(switch.timeout, Duration::from_secs(3600));
        assert_eq!(switch.poll_interval, Duration::from_secs(15));

        let other = settings.converge_config("toggle-ssl");
        assert_eq!(other.timeout, Duration::from_secs(600));
        assert_eq!(other.poll_interval, Duration::from_secs(5));
    }

    #[test]
    fn test_status_tables() {
        let yaml = r#"
status_tables:
  legacy-db:
    DONE: success
    busy: running
"#;
        let settings = Settings::from_yaml(yaml).unwrap();
        let map = settings.status_map("legacy-db").unwrap();

        assert_eq!(map.resolve("done").unwrap(), TaskStatus::Success);
        assert_eq!(map.resolve("BUSY").unwrap(), TaskStatus::Running);
        assert!(settings.status_map("other").is_none());
    }

    #[test]
    fn test_empty_file_is_default() {
        assert_eq!(Settings::from_yaml("\n").unwrap(), Settings::default());
    }

    #[test]
    fn test_zero_interval_is_rejected() {
        let result = Settings::from_yaml("poll_interval_secs: 0\n");
        assert!(matches!(result, Err(ConfigError::Invalid(_))));

        let result = Settings::from_yaml("operations:\n  toggle-ssl:\n    timeout_secs: 0\n");
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_zero_poll_request_timeout_is_rejected() {
        let result = Settings::from_yaml("poll_request_timeout_secs: 0\n");
        assert!(matches!(
            result,
            Err(ConfigError::Invalid(msg)) if msg.contains("poll_request_timeout_secs")
        ));

        let settings = Settings::from_yaml("poll_request_timeout_secs: 5\n").unwrap();
        assert_eq!(
            settings.converge_config("any").poll_request_timeout,
            Duration::from_secs(5)
        );
    }

    #[test]
    fn test_unknown_field_is_rejected() {
        let result = Settings::from_yaml("timeout: 10\n");
        assert!(matches!(result, Err(ConfigError::Yaml(_))));
    }

    #[test]
    fn test_retry_settings() {
        let settings =
            Settings::from_yaml("retry:\n  initial_delay_ms: 250\n  multiplier: 3.0\n").unwrap();
        let retry = settings.converge_config("any").retry;

        assert_eq!(retry.initial_delay, Duration::from_millis(250));
        assert_eq!(retry.max_delay, Duration::from_millis(30000));
        assert_eq!(retry.backoff_multiplier, 3.0);
    }
}
