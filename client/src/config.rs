//! Client configuration

use crate::session::{RetryPolicy, SessionConfig};
use anyhow::{Result, bail};
use mr600_transport::HttpTransportConfig;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Top-level `config.toml`
#[derive(Debug, Clone, Deserialize)]
pub struct BridgeConfig {
    /// Router address and credentials
    pub router: RouterConfig,

    /// HTTP transport settings
    #[serde(default)]
    pub http: HttpConfig,

    /// Handshake retry settings
    #[serde(default)]
    pub retry: RetryConfig,
}

impl BridgeConfig {
    /// Load configuration from file
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = tokio::fs::read_to_string(path).await?;
        let config: BridgeConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if !self.router.url.starts_with("http://") && !self.router.url.starts_with("https://") {
            bail!("router.url must be an http(s) URL, got {:?}", self.router.url);
        }
        if self.router.login.is_empty() {
            bail!("router.login must not be empty");
        }
        Ok(())
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig::new(
            self.router.url.as_str(),
            self.router.login.as_str(),
            self.router.password.as_str(),
        )
        .with_retry(RetryPolicy {
            retries: self.retry.handshake_retries,
            base_delay: Duration::from_millis(self.retry.base_delay_ms),
        })
    }

    pub fn transport_config(&self) -> HttpTransportConfig {
        HttpTransportConfig {
            timeout: Duration::from_secs(self.http.timeout_secs),
            ..HttpTransportConfig::default()
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RouterConfig {
    /// Base URL of the web UI, e.g. `http://192.168.1.1`
    pub url: String,

    #[serde(default = "default_login")]
    pub login: String,

    pub password: String,
}

fn default_login() -> String {
    "admin".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    /// Extra attempts for `getParm` and `login`
    #[serde(default = "default_handshake_retries")]
    pub handshake_retries: u32,

    /// First backoff step in milliseconds
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
}

fn default_handshake_retries() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    1000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            handshake_retries: default_handshake_retries(),
            base_delay_ms: default_base_delay_ms(),
        }
    }
}
