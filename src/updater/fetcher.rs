use anyhow::{bail, Context, Result};
use reqwest::header::CACHE_CONTROL;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

/// Retrieves the remote style catalog document.
#[async_trait::async_trait]
pub trait CatalogFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Value>;
}

pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent("TransparentZen/1.0")
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { client })
    }
}

#[async_trait::async_trait]
impl CatalogFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Value> {
        let resp = self
            .client
            .get(url)
            .header(CACHE_CONTROL, "no-cache")
            .send()
            .await
            .with_context(|| format!("Failed to fetch styles from {}", url))?;

        let status = resp.status();
        if !status.is_success() {
            bail!("Failed to fetch styles (Status: {})", status);
        }

        let document: Value = resp
            .json()
            .await
            .context("Style catalog response is not valid JSON")?;
        debug!("Fetched style catalog from {}", url);
        Ok(document)
    }
}
