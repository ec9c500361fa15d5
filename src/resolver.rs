//! Client for the external music-resolution API.

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONNECTION, CONTENT_TYPE, HOST, USER_AGENT};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::ResolverConfig;

/// Playback metadata passed through from the resolution service. Every
/// field is optional upstream and is forwarded as-is; a resolved track
/// with no `url` is still a success.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Track {
    pub url: Option<String>,
    pub info: Option<String>,
    pub quality: Option<String>,
    // Upstream sends expiry as either a string or a number.
    pub expire: Option<serde_json::Value>,
}

/// Outcome of one resolution attempt. A failed attempt is terminal; the
/// client never retries.
#[derive(Debug, Clone)]
pub enum Resolution {
    Resolved(Track),
    Failed { error: String },
}

pub struct ResolverClient {
    client: reqwest::Client,
    config: ResolverConfig,
}

impl ResolverClient {
    pub fn new(config: ResolverConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&config.user_agent).context("Invalid resolver user_agent")?,
        );
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            "X-Request-Key",
            HeaderValue::from_str(&config.request_key).context("Invalid resolver request_key")?,
        );
        if let Some(host) = &config.host_override {
            headers.insert(
                HOST,
                HeaderValue::from_str(host).context("Invalid resolver host_override")?,
            );
        }
        headers.insert(CONNECTION, HeaderValue::from_static("Keep-Alive"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to build resolver HTTP client")?;

        Ok(Self { client, config })
    }

    /// Look up a playable URL for `song_id` on `source`. Transport errors,
    /// timeouts, non-success statuses and malformed JSON all fold into
    /// `Resolution::Failed`; nothing escapes the client boundary.
    pub async fn resolve(&self, song_id: &str, source: &str, quality: &str) -> Resolution {
        match self.try_resolve(song_id, source, quality).await {
            Ok(track) => Resolution::Resolved(track),
            Err(e) => {
                warn!("Music resolution failed for {source}/{song_id}: {e:#}");
                Resolution::Failed {
                    error: format!("{e:#}"),
                }
            }
        }
    }

    async fn try_resolve(&self, song_id: &str, source: &str, quality: &str) -> Result<Track> {
        debug!(
            "Resolving song {} from {} at {}: {}",
            song_id, source, quality, self.config.base_url
        );

        let response = self
            .client
            .get(&self.config.base_url)
            .query(&[("source", source), ("songId", song_id), ("quality", quality)])
            .send()
            .await
            .context("Failed to reach the music resolution service")?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            anyhow::bail!("Resolution service error ({}): {}", status, error_body);
        }

        response
            .json()
            .await
            .context("Failed to parse resolution service response")
    }
}
