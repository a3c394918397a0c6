//! Attachment download.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::{path::Path, time::Duration};
use tracing::debug;

/// Fetches an attachment into a caller-provided file. The pipeline owns the
/// destination's lifetime; implementations only write bytes.
#[async_trait]
pub trait AttachmentFetcher: Send + Sync {
    async fn fetch(&self, url: &str, dest: &Path) -> Result<u64>;
}

pub struct HttpFetcher {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { client, timeout })
    }
}

#[async_trait]
impl AttachmentFetcher for HttpFetcher {
    async fn fetch(&self, url: &str, dest: &Path) -> Result<u64> {
        let response = self
            .client
            .get(url)
            .timeout(self.timeout)
            .send()
            .await
            .with_context(|| format!("Failed to request attachment: {url}"))?
            .error_for_status()
            .with_context(|| format!("Attachment request returned an error status: {url}"))?;

        let bytes = response
            .bytes()
            .await
            .with_context(|| format!("Failed to read attachment body: {url}"))?;

        tokio::fs::write(dest, &bytes)
            .await
            .with_context(|| format!("Failed to write attachment to {}", dest.display()))?;

        debug!(url, bytes = bytes.len(), "downloaded attachment");
        Ok(bytes.len() as u64)
    }
}
