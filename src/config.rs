use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    pub dingtalk: DingtalkConfig,
    pub resolver: ResolverConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct DingtalkConfig {
    /// Shared signing secret for inbound callbacks and outbound messages.
    pub secret: String,
    /// Robot send URL with the access token embedded in its query string.
    pub webhook_url: String,
}

impl DingtalkConfig {
    /// Access token embedded in the webhook URL (text after the last `=`).
    pub fn access_token(&self) -> &str {
        self.webhook_url.rsplit('=').next().unwrap_or("")
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ResolverConfig {
    pub base_url: String,
    /// Static API key sent as the X-Request-Key header.
    pub request_key: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Host header override, for services fronted by a shared endpoint.
    #[serde(default)]
    pub host_override: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_quality")]
    pub default_quality: String,
}

fn default_bind_addr() -> String {
    "0.0.0.0:5000".to_string()
}

fn default_user_agent() -> String {
    "lx-music-mobile/2.0.0".to_string()
}

fn default_timeout_secs() -> u64 {
    8
}

fn default_quality() -> String {
    "128k".to_string()
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }
}
