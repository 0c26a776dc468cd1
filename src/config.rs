//! Bridge configuration
//!
//! Settings come from an optional YAML file, then `SKYBRIDGE_*` environment
//! variables override individual keys. Every key has a default, so running
//! without a file talks to a local development stack.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use crate::{BridgeError, Result};

/// Runtime settings for the bridge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Base URL of the ingestion API
    pub api_base_url: String,
    /// Identity provider login page opened in the browser
    pub login_url: String,
    /// Loopback port the OAuth redirect lands on (0 picks a free port)
    pub callback_port: u16,
    /// File the bearer token is cached in
    pub token_file: PathBuf,
    /// Client name announced to the simulator
    pub app_name: String,
    /// Delay between dispatch polls
    pub poll_interval_ms: u64,
    /// Grace period for shutting the loopback listener down
    pub listener_shutdown_timeout_secs: u64,
    /// How long to wait for the browser redirect; unbounded when unset
    pub redirect_timeout_secs: Option<u64>,
    /// Positions within this many degrees of 0/0 are not forwarded
    pub position_threshold_deg: f64,
    /// Per-request timeout for ingestion API calls
    pub http_timeout_secs: u64,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8080".to_string(),
            login_url: "http://localhost:3000/ui/login_console".to_string(),
            callback_port: 9999,
            token_file: PathBuf::from("token.jwt"),
            app_name: "Request Data".to_string(),
            poll_interval_ms: 1000,
            listener_shutdown_timeout_secs: 60,
            redirect_timeout_secs: None,
            position_threshold_deg: 0.1,
            http_timeout_secs: 10,
        }
    }
}

impl BridgeConfig {
    /// Load from a YAML file (if given), apply environment overrides, validate.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a YAML file; missing keys take defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let yaml = std::fs::read_to_string(path).map_err(|e| {
            BridgeError::config_error(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_yaml(&yaml)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml_ng::from_str(yaml).map_err(|e| BridgeError::config_error(e.to_string()))
    }

    /// Apply `SKYBRIDGE_*` overrides using `lookup` to read variables.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("SKYBRIDGE_API_URL") {
            debug!(url = %url, "API URL overridden from environment");
            self.api_base_url = url;
        }
        if let Some(url) = lookup("SKYBRIDGE_LOGIN_URL") {
            self.login_url = url;
        }
        if let Some(port) = lookup("SKYBRIDGE_CALLBACK_PORT") {
            self.callback_port = port.parse().map_err(|_| {
                BridgeError::config_error(format!(
                    "SKYBRIDGE_CALLBACK_PORT '{}' is not a port",
                    port
                ))
            })?;
        }
        if let Some(file) = lookup("SKYBRIDGE_TOKEN_FILE") {
            self.token_file = PathBuf::from(file);
        }
        Ok(())
    }

    /// Reject settings the bridge cannot run with.
    pub fn validate(&self) -> Result<()> {
        for (key, value) in [("api_base_url", &self.api_base_url), ("login_url", &self.login_url)] {
            let parsed = reqwest::Url::parse(value)
                .map_err(|e| BridgeError::config_error(format!("{} '{}': {}", key, value, e)))?;
            if parsed.cannot_be_a_base() {
                return Err(BridgeError::config_error(format!(
                    "{} '{}' is not a base URL",
                    key, value
                )));
            }
        }

        if self.token_file.as_os_str().is_empty() {
            return Err(BridgeError::config_error("token_file is empty"));
        }
        if self.poll_interval_ms == 0 {
            return Err(BridgeError::config_error("poll_interval_ms must be positive"));
        }
        if self.listener_shutdown_timeout_secs == 0 || self.http_timeout_secs == 0 {
            return Err(BridgeError::config_error("timeouts must be positive"));
        }
        if !(self.position_threshold_deg >= 0.0) {
            return Err(BridgeError::config_error("position_threshold_deg must be non-negative"));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn listener_shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.listener_shutdown_timeout_secs)
    }

    pub fn redirect_timeout(&self) -> Option<Duration> {
        self.redirect_timeout_secs.map(Duration::from_secs)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_match_local_stack() {
        let config = BridgeConfig::default();
        assert_eq!(config.callback_port, 9999);
        assert_eq!(config.token_file, PathBuf::from("token.jwt"));
        assert_eq!(config.poll_interval(), Duration::from_secs(1));
        assert_eq!(config.listener_shutdown_timeout(), Duration::from_secs(60));
        assert!(config.redirect_timeout().is_none());
        config.validate().unwrap();
    }

    #[test]
    fn partial_yaml_keeps_defaults() {
        let config = BridgeConfig::from_yaml(
            "api_base_url: https://telemetry.example.com\ncallback_port: 8765\n",
        )
        .unwrap();

        assert_eq!(config.api_base_url, "https://telemetry.example.com");
        assert_eq!(config.callback_port, 8765);
        assert_eq!(config.app_name, "Request Data");
    }

    #[test]
    fn environment_overrides_file_values() {
        let env: HashMap<&str, &str> = [
            ("SKYBRIDGE_API_URL", "http://10.0.0.5:8080"),
            ("SKYBRIDGE_CALLBACK_PORT", "7000"),
            ("SKYBRIDGE_TOKEN_FILE", "/tmp/skybridge.jwt"),
        ]
        .into_iter()
        .collect();

        let mut config = BridgeConfig::default();
        config.apply_overrides(|key| env.get(key).map(|v| v.to_string())).unwrap();

        assert_eq!(config.api_base_url, "http://10.0.0.5:8080");
        assert_eq!(config.callback_port, 7000);
        assert_eq!(config.token_file, PathBuf::from("/tmp/skybridge.jwt"));
    }

    #[test]
    fn bad_port_override_is_rejected() {
        let mut config = BridgeConfig::default();
        let result = config.apply_overrides(|key| {
            (key == "SKYBRIDGE_CALLBACK_PORT").then(|| "ninety".to_string())
        });
        assert!(matches!(result, Err(BridgeError::Config { .. })));
    }

    #[test]
    fn validation_rejects_unusable_settings() {
        let config = BridgeConfig { api_base_url: "not a url".into(), ..Default::default() };
        assert!(config.validate().is_err());

        let config = BridgeConfig { poll_interval_ms: 0, ..Default::default() };
        assert!(config.validate().is_err());

        let config = BridgeConfig { position_threshold_deg: f64::NAN, ..Default::default() };
        assert!(config.validate().is_err());
    }
}
