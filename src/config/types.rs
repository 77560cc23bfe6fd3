//! Configuration types.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::ConfigError;

/// Environment variable overriding `ticketing.base_url`.
pub const ENV_BASE_URL: &str = "INCIDENT_RELAY_BASE_URL";
/// Environment variable overriding `ticketing.app_token`.
pub const ENV_APP_TOKEN: &str = "INCIDENT_RELAY_APP_TOKEN";
/// Environment variable overriding `ticketing.user_token`.
pub const ENV_USER_TOKEN: &str = "INCIDENT_RELAY_USER_TOKEN";
/// Environment variable overriding `watcher.log_file`.
pub const ENV_LOG_FILE: &str = "INCIDENT_RELAY_LOG_FILE";

const REDACTED: &str = "<redacted>";

/// Static ticket fields applied to every forwarded event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TicketDefaults {
    pub category_id: u32,
    pub recipient_user_id: u32,
    pub entity_id: u32,
    pub status: u32,
    pub priority: u32,
}

impl Default for TicketDefaults {
    fn default() -> Self {
        Self {
            category_id: 15,
            recipient_user_id: 6,
            entity_id: 0,
            status: 1,
            priority: 3,
        }
    }
}

/// Connection settings for the ticketing API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketingConfig {
    /// Base URL of the REST endpoint, e.g. `http://host/glpi/apirest.php`.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub app_token: String,
    #[serde(default)]
    pub user_token: String,
    /// Per-request timeout in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub defaults: TicketDefaults,
}

fn default_base_url() -> String {
    "http://host.docker.internal/glpi/apirest.php".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl Default for TicketingConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            app_token: String::new(),
            user_token: String::new(),
            request_timeout_secs: default_request_timeout_secs(),
            defaults: TicketDefaults::default(),
        }
    }
}

impl TicketingConfig {
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Which file to tail and how often.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatcherConfig {
    #[serde(default = "default_log_file")]
    pub log_file: PathBuf,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

fn default_log_file() -> PathBuf {
    PathBuf::from("/app/Scripts/events.log")
}

fn default_poll_interval_ms() -> u64 {
    500
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            log_file: default_log_file(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl WatcherConfig {
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Metrics sampling and alert thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitoringConfig {
    pub sample_interval_secs: u64,
    /// Failures per window above which an alert is raised.
    pub exception_threshold_per_minute: u64,
    /// Log every alert through `tracing`.
    pub enable_logging: bool,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            sample_interval_secs: 30,
            exception_threshold_per_minute: 10,
            enable_logging: true,
        }
    }
}

impl MonitoringConfig {
    #[must_use]
    pub fn sample_interval(&self) -> Duration {
        Duration::from_secs(self.sample_interval_secs)
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RelayConfig {
    #[serde(default)]
    pub ticketing: TicketingConfig,
    #[serde(default)]
    pub watcher: WatcherConfig,
    #[serde(default)]
    pub monitoring: MonitoringConfig,
}

impl RelayConfig {
    /// Apply `INCIDENT_RELAY_*` environment overrides.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary lookup. Empty values are ignored.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get(ENV_BASE_URL) {
            self.ticketing.base_url = v;
        }
        if let Some(v) = get(ENV_APP_TOKEN) {
            self.ticketing.app_token = v;
        }
        if let Some(v) = get(ENV_USER_TOKEN) {
            self.ticketing.user_token = v;
        }
        if let Some(v) = get(ENV_LOG_FILE) {
            self.watcher.log_file = PathBuf::from(v);
        }
    }

    /// Check the values the pipeline cannot run without.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let t = &self.ticketing;
        if t.base_url.trim().is_empty() {
            return Err(ConfigError::Invalid("ticketing.base_url is empty".to_string()));
        }
        if let Err(e) = url::Url::parse(&t.base_url) {
            return Err(ConfigError::Invalid(format!(
                "ticketing.base_url is not a valid URL: {e}"
            )));
        }
        if t.app_token.trim().is_empty() {
            return Err(ConfigError::Invalid(format!(
                "ticketing.app_token is empty (set it or {ENV_APP_TOKEN})"
            )));
        }
        if t.user_token.trim().is_empty() {
            return Err(ConfigError::Invalid(format!(
                "ticketing.user_token is empty (set it or {ENV_USER_TOKEN})"
            )));
        }
        if t.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "ticketing.request_timeout_secs must be greater than 0".to_string(),
            ));
        }
        if self.watcher.log_file.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("watcher.log_file is empty".to_string()));
        }
        if self.watcher.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "watcher.poll_interval_ms must be greater than 0".to_string(),
            ));
        }
        if self.monitoring.sample_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "monitoring.sample_interval_secs must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Copy with tokens replaced, for display.
    #[must_use]
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        for token in [&mut copy.ticketing.app_token, &mut copy.ticketing.user_token] {
            if !token.is_empty() {
                *token = REDACTED.to_string();
            }
        }
        copy
    }
}
