use anyhow::{Context, Result};
use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// Downloads reference images.
pub trait ImageFetcher: Send + Sync {
    fn fetch(&self, url: &str) -> impl Future<Output = Result<Vec<u8>>> + Send;
}

/// Fetches `http(s)://` URLs over HTTP and reads anything else as a local path.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { client })
    }
}

impl ImageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            debug!("Reading reference image from disk: {}", url);
            return tokio::fs::read(url)
                .await
                .with_context(|| format!("Failed to read {}", url));
        }

        debug!("Downloading reference image: {}", url);
        let bytes = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("Request to {} failed", url))?
            .error_for_status()
            .with_context(|| format!("Bad response from {}", url))?
            .bytes()
            .await
            .with_context(|| format!("Failed to read body from {}", url))?;
        Ok(bytes.to_vec())
    }
}
