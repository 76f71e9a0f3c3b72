//! # Index Fetching
//!
//! Downloads a chart repository's `index.yaml`.

use crate::constants::INDEX_DOWNLOAD_TIMEOUT_SECS;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

/// Source of remote repository indexes
#[async_trait]
pub trait IndexFetcher: Send + Sync {
    /// Download the raw index for the repository at `url`
    async fn fetch_index(&self, url: &str) -> Result<Vec<u8>>;
}

/// Fetches `<url>/index.yaml` over HTTPS
#[derive(Debug, Clone)]
pub struct HttpIndexFetcher {
    client: reqwest::Client,
}

impl HttpIndexFetcher {
    /// Build a fetcher with the default download timeout
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(INDEX_DOWNLOAD_TIMEOUT_SECS))
            .user_agent(concat!("cloudship-operator/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client for index downloads")?;
        Ok(Self { client })
    }
}

#[async_trait]
impl IndexFetcher for HttpIndexFetcher {
    async fn fetch_index(&self, url: &str) -> Result<Vec<u8>> {
        let index_url = index_url(url);
        debug!("Downloading repository index {}", index_url);
        let response = self
            .client
            .get(&index_url)
            .send()
            .await
            .with_context(|| format!("GET {index_url} failed"))?
            .error_for_status()
            .with_context(|| format!("GET {index_url} returned an error status"))?;
        let body = response
            .bytes()
            .await
            .with_context(|| format!("Failed to read body of {index_url}"))?;
        Ok(body.to_vec())
    }
}

/// Index location for a repository base URL
#[must_use]
pub fn index_url(url: &str) -> String {
    format!("{}/index.yaml", url.trim_end_matches('/'))
}

/// Check that downloaded bytes look like a chart repository index
///
/// # Errors
///
/// Returns an error when the body is not YAML or lacks `apiVersion` / `entries`.
pub fn validate_index(body: &[u8]) -> Result<()> {
    let value: serde_yaml::Value =
        serde_yaml::from_slice(body).context("index is not valid YAML")?;
    let mapping = value
        .as_mapping()
        .ok_or_else(|| anyhow::anyhow!("index is not a YAML mapping"))?;
    for key in ["apiVersion", "entries"] {
        if !mapping.contains_key(key) {
            return Err(anyhow::anyhow!("index has no `{key}` key"));
        }
    }
    Ok(())
}
