//! Otter runtime configuration
//!
//! Read from `.otter/config.toml` (TOML), then `OTTER_*` environment
//! variables, then command-line flags.

pub mod traits;

pub use traits::LayeredConfig;

use crate::errors::{OtterError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use traits::parse_number;

/// Default configuration file location, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = ".otter/config.toml";

/// Default coordination store endpoint.
pub const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:2379";

/// Runtime settings for every role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OtterConfig {
    /// Coordination store endpoints, tried in order
    pub endpoints: Vec<String>,
    /// Host identity override
    pub hostname: Option<String>,
    /// Declarative state file
    pub state_path: PathBuf,
    /// Seconds between membership refreshes
    pub heartbeat_interval_secs: u64,
    /// Lifetime of the membership key
    pub heartbeat_ttl_secs: u64,
    /// Per-host result wait
    pub result_timeout_secs: u64,
    /// Optional bound on a whole fan-out
    pub aggregate_timeout_secs: Option<u64>,
    /// Per-request timeout for non-blocking store operations
    pub request_timeout_secs: u64,
}

impl Default for OtterConfig {
    fn default() -> Self {
        Self {
            endpoints: vec![DEFAULT_ENDPOINT.to_string()],
            hostname: None,
            state_path: PathBuf::from("otter.yml"),
            heartbeat_interval_secs: 15,
            heartbeat_ttl_secs: 60,
            result_timeout_secs: 10,
            aggregate_timeout_secs: None,
            request_timeout_secs: 1,
        }
    }
}

impl OtterConfig {
    /// Heartbeat period.
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }

    /// Membership key lifetime.
    pub fn heartbeat_ttl(&self) -> Duration {
        Duration::from_secs(self.heartbeat_ttl_secs)
    }

    /// Per-host result wait.
    pub fn result_timeout(&self) -> Duration {
        Duration::from_secs(self.result_timeout_secs)
    }

    /// Whole fan-out bound, when configured.
    pub fn aggregate_timeout(&self) -> Option<Duration> {
        self.aggregate_timeout_secs.map(Duration::from_secs)
    }

    /// Non-blocking request timeout.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    fn set_endpoints(&mut self, value: &str) {
        self.endpoints = value
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
    }
}

impl LayeredConfig for OtterConfig {
    fn load_from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .map_err(|e| OtterError::io(format!("Failed to read config file: {e}")))?;
        Ok(toml::from_str(&content)?)
    }

    fn merge_with_vars<I, K, V>(&mut self, vars: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        for (key, value) in vars {
            let Some(name) = key.as_ref().strip_prefix("OTTER_") else {
                continue;
            };
            let setting = match name {
                "ENDPOINTS" => "endpoints",
                "HOSTNAME" => "hostname",
                "STATE" => "state_path",
                "HEARTBEAT_INTERVAL" => "heartbeat_interval_secs",
                "HEARTBEAT_TTL" => "heartbeat_ttl_secs",
                "RESULT_TIMEOUT" => "result_timeout_secs",
                "AGGREGATE_TIMEOUT" => "aggregate_timeout_secs",
                _ => continue,
            };
            self.set_from_string(setting, value.as_ref())?;
        }
        Ok(())
    }

    fn set_from_string(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "endpoints" => self.set_endpoints(value),
            "hostname" => {
                let trimmed = value.trim();
                self.hostname = (!trimmed.is_empty()).then(|| trimmed.to_string());
            }
            "state_path" | "state" => self.state_path = PathBuf::from(value),
            "heartbeat_interval_secs" => {
                self.heartbeat_interval_secs = parse_number(key, value)?;
            }
            "heartbeat_ttl_secs" => self.heartbeat_ttl_secs = parse_number(key, value)?,
            "result_timeout_secs" => self.result_timeout_secs = parse_number(key, value)?,
            "aggregate_timeout_secs" => {
                self.aggregate_timeout_secs = match value.trim() {
                    "" | "none" => None,
                    other => Some(parse_number(key, other)?),
                };
            }
            "request_timeout_secs" => self.request_timeout_secs = parse_number(key, value)?,
            _ => {
                return Err(OtterError::invalid(format!(
                    "Unknown configuration key: {key}"
                )))
            }
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.endpoints.is_empty() {
            return Err(OtterError::invalid("At least one endpoint is required"));
        }
        if let Some(bad) = self
            .endpoints
            .iter()
            .find(|e| !(e.starts_with("http://") || e.starts_with("https://")))
        {
            return Err(OtterError::invalid(format!(
                "Endpoint must be an http(s) URL: {bad}"
            )));
        }
        if self.heartbeat_interval_secs == 0 {
            return Err(OtterError::invalid("Heartbeat interval cannot be 0"));
        }
        if self.heartbeat_ttl_secs <= self.heartbeat_interval_secs {
            return Err(OtterError::invalid(
                "Heartbeat TTL must exceed the heartbeat interval",
            ));
        }
        if self.result_timeout_secs == 0 || self.request_timeout_secs == 0 {
            return Err(OtterError::invalid("Timeouts cannot be 0"));
        }
        if self.aggregate_timeout_secs == Some(0) {
            return Err(OtterError::invalid("Aggregate timeout cannot be 0"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_valid() {
        let config = OtterConfig::default();
        config.validate().unwrap();
        assert_eq!(config.heartbeat_interval(), Duration::from_secs(15));
        assert_eq!(config.heartbeat_ttl(), Duration::from_secs(60));
        assert_eq!(config.result_timeout(), Duration::from_secs(10));
        assert_eq!(config.aggregate_timeout(), None);
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = OtterConfig::load_from_file(&dir.path().join("config.toml")).unwrap();
        assert_eq!(config, OtterConfig::default());
    }

    #[test]
    fn file_values_override_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "endpoints = [\"http://10.0.0.1:2379\", \"http://10.0.0.2:2379\"]\n\
             hostname = \"node-1\"\n\
             aggregate_timeout_secs = 30"
        )
        .unwrap();
        let config = OtterConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.endpoints.len(), 2);
        assert_eq!(config.hostname.as_deref(), Some("node-1"));
        assert_eq!(config.aggregate_timeout(), Some(Duration::from_secs(30)));
        assert_eq!(config.heartbeat_interval_secs, 15);
    }

    #[test]
    fn unknown_file_keys_are_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "endpoint = \"http://x\"").unwrap();
        assert!(OtterConfig::load_from_file(file.path()).is_err());
    }

    #[test]
    fn environment_overrides_apply() {
        let mut config = OtterConfig::default();
        config
            .merge_with_vars([
                ("OTTER_ENDPOINTS", "http://a:2379, http://b:2379"),
                ("OTTER_HOSTNAME", "web-3"),
                ("PATH", "/usr/bin"),
            ])
            .unwrap();
        assert_eq!(config.endpoints, vec!["http://a:2379", "http://b:2379"]);
        assert_eq!(config.hostname.as_deref(), Some("web-3"));
    }

    #[test]
    fn validation_rejects_bad_timings() {
        let mut config = OtterConfig::default();
        config.heartbeat_ttl_secs = 15;
        assert!(config.validate().is_err());

        let mut config = OtterConfig::default();
        config.endpoints.clear();
        assert!(config.validate().is_err());

        let mut config = OtterConfig::default();
        config.set_from_string("endpoints", "127.0.0.1:2379").unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn bad_numbers_name_the_key() {
        let mut config = OtterConfig::default();
        let err = config
            .set_from_string("result_timeout_secs", "soon")
            .unwrap_err();
        assert!(err.to_string().contains("result_timeout_secs"));
    }
}
