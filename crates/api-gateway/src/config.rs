//! Gateway configuration
//!
//! TOML-loadable settings for the request gateway: where the remote API
//! lives, where its refresh endpoint hangs off it, how long to wait for a
//! response, and how far ahead of expiry to refresh proactively.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

/// Gateway settings.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    /// Base URL of the remote API, e.g. `http://localhost:3000`
    pub api_base_url: String,
    /// Path of the token refresh endpoint, relative to the base URL
    #[serde(default = "default_refresh_path")]
    pub refresh_path: String,
    /// Bound on each outbound request, including the refresh exchange
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Lead time before expiry at which a request-time refresh triggers
    #[serde(default = "default_refresh_buffer_secs")]
    pub refresh_buffer_secs: u64,
}

fn default_refresh_path() -> String {
    "/auth/refresh".into()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_refresh_buffer_secs() -> u64 {
    300
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:3000".into(),
            refresh_path: default_refresh_path(),
            timeout_secs: default_timeout_secs(),
            refresh_buffer_secs: default_refresh_buffer_secs(),
        }
    }
}

impl GatewayConfig {
    /// Load configuration from a TOML file and validate it.
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: GatewayConfig = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate field constraints.
    pub fn validate(&self) -> common::Result<()> {
        if !self.api_base_url.starts_with("http://") && !self.api_base_url.starts_with("https://") {
            return Err(common::Error::Config(format!(
                "api_base_url must start with http:// or https://, got: {}",
                self.api_base_url
            )));
        }
        if !self.refresh_path.starts_with('/') {
            return Err(common::Error::Config(format!(
                "refresh_path must start with /, got: {}",
                self.refresh_path
            )));
        }
        if self.timeout_secs == 0 {
            return Err(common::Error::Config(
                "timeout_secs must be greater than 0".into(),
            ));
        }
        Ok(())
    }

    /// Absolute URL of the refresh endpoint.
    pub fn refresh_url(&self) -> String {
        format!(
            "{}{}",
            self.api_base_url.trim_end_matches('/'),
            self.refresh_path
        )
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn refresh_buffer(&self) -> Duration {
        Duration::from_secs(self.refresh_buffer_secs)
    }
}
