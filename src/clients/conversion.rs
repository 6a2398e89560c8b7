use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};

/// Conversion lifecycle states the service reports per barcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversionStatus {
    /// Known to the service but not yet requested.
    Available,
    /// Requested and still converting.
    InProcess,
    /// Finished; an encrypted archive is ready for download.
    Converted,
    /// The service gave up on this barcode.
    Failed,
    /// Every barcode the service knows, regardless of state.
    All,
}

impl ConversionStatus {
    /// Query-string value the service expects.
    pub fn as_query(&self) -> &'static str {
        match self {
            ConversionStatus::Available => "available",
            ConversionStatus::InProcess => "in_process",
            ConversionStatus::Converted => "converted",
            ConversionStatus::Failed => "failed",
            ConversionStatus::All => "all",
        }
    }
}

/// The remote system that turns scanned books into downloadable archives.
pub trait ConversionService {
    /// Asks the service to start converting a barcode. Returns `false` when
    /// the service refuses the request (the book is not allowed to be
    /// downloaded), `Err` on transport or server faults.
    fn submit_for_conversion(
        &self,
        barcode: &str,
    ) -> impl std::future::Future<Output = Result<bool>> + Send;

    /// Lists the barcodes currently in a given conversion state.
    fn list_by_status(
        &self,
        status: ConversionStatus,
    ) -> impl std::future::Future<Output = Result<Vec<String>>> + Send;

    /// Downloads the finished encrypted archive for a barcode to `dest`.
    fn download_artifact(
        &self,
        barcode: &str,
        dest: &Path,
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

/// HTTP implementation of [`ConversionService`].
pub struct HttpConversionClient {
    base_url: String,
    http_client: reqwest::Client,
    timeout: Duration,
    attempts: usize,
}

impl HttpConversionClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http_client: reqwest::Client::new(),
            timeout: Duration::from_secs(30),
            attempts: 3,
        }
    }

    // --- HTTP Helpers with Backoff ---

    async fn post_with_retry<T: serde::Serialize>(
        &self,
        url: String,
        payload: &T,
    ) -> Result<reqwest::Response> {
        let mut delay_ms = 150u64;

        for attempt in 0..self.attempts {
            let response = self
                .http_client
                .post(url.clone())
                .json(payload)
                .timeout(self.timeout)
                .send()
                .await;

            match response {
                Ok(resp) => return Ok(resp),
                Err(e) => {
                    if attempt + 1 == self.attempts {
                        return Err(anyhow::anyhow!(e));
                    }
                    // Simple jitter to prevent thundering herd
                    let jitter = rand::random::<u64>() % 50;
                    tokio::time::sleep(Duration::from_millis(delay_ms + jitter)).await;
                    delay_ms = (delay_ms * 2).min(1200);
                }
            }
        }

        Err(anyhow::anyhow!("Retry attempts exhausted"))
    }

    async fn get_with_retry(&self, url: String) -> Result<reqwest::Response> {
        let mut delay_ms = 150u64;

        for attempt in 0..self.attempts {
            let response = self
                .http_client
                .get(url.clone())
                .timeout(self.timeout)
                .send()
                .await;

            match response {
                Ok(resp) => return Ok(resp),
                Err(e) => {
                    if attempt + 1 == self.attempts {
                        return Err(anyhow::anyhow!(e));
                    }
                    let jitter = rand::random::<u64>() % 50;
                    tokio::time::sleep(Duration::from_millis(delay_ms + jitter)).await;
                    delay_ms = (delay_ms * 2).min(1200);
                }
            }
        }

        Err(anyhow::anyhow!("Retry attempts exhausted"))
    }
}

#[derive(serde::Serialize)]
struct ConversionRequest<'a> {
    barcode: &'a str,
}

impl ConversionService for HttpConversionClient {
    async fn submit_for_conversion(&self, barcode: &str) -> Result<bool> {
        let url = format!("{}/conversions", self.base_url);
        let response = self
            .post_with_retry(url, &ConversionRequest { barcode })
            .await?;

        match response.status() {
            s if s.is_success() => Ok(true),
            reqwest::StatusCode::FORBIDDEN => Ok(false),
            s => bail!("conversion request for {barcode} failed: {s}"),
        }
    }

    async fn list_by_status(&self, status: ConversionStatus) -> Result<Vec<String>> {
        let url = format!("{}/conversions?status={}", self.base_url, status.as_query());
        let response = self.get_with_retry(url).await?;

        if !response.status().is_success() {
            bail!("conversion status listing failed: {}", response.status());
        }

        let barcodes: Vec<String> = response
            .json()
            .await
            .context("failed to parse conversion status listing")?;
        Ok(barcodes)
    }

    async fn download_artifact(&self, barcode: &str, dest: &Path) -> Result<()> {
        let url = format!("{}/artifacts/{barcode}", self.base_url);
        let response = self.get_with_retry(url).await?;

        if !response.status().is_success() {
            bail!(
                "artifact download for {barcode} failed: {}",
                response.status()
            );
        }

        let body = response
            .bytes()
            .await
            .with_context(|| format!("failed to read artifact body for {barcode}"))?;
        tokio::fs::write(dest, &body)
            .await
            .with_context(|| format!("failed to write artifact to {}", dest.display()))?;
        tracing::info!("downloaded {} bytes for {barcode}", body.len());
        Ok(())
    }
}
