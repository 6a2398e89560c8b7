use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};

/// Long-term storage for finished archives.
pub trait ObjectStore {
    /// Whether an object already exists under this key.
    fn exists(&self, key: &str) -> impl std::future::Future<Output = Result<bool>> + Send;

    /// Uploads the file at `path` under `key`, overwriting any previous
    /// object.
    fn store(
        &self,
        path: &Path,
        key: &str,
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

/// HTTP implementation of [`ObjectStore`].
pub struct HttpObjectStore {
    base_url: String,
    http_client: reqwest::Client,
    timeout: Duration,
}

impl HttpObjectStore {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http_client: reqwest::Client::new(),
            timeout: Duration::from_secs(120),
        }
    }

    fn object_url(&self, key: &str) -> String {
        format!("{}/objects/{key}", self.base_url)
    }
}

impl ObjectStore for HttpObjectStore {
    async fn exists(&self, key: &str) -> Result<bool> {
        let response = self
            .http_client
            .head(self.object_url(key))
            .timeout(self.timeout)
            .send()
            .await
            .with_context(|| format!("failed to query object store for {key}"))?;

        match response.status() {
            s if s.is_success() => Ok(true),
            reqwest::StatusCode::NOT_FOUND => Ok(false),
            s => bail!("object store existence check for {key} failed: {s}"),
        }
    }

    async fn store(&self, path: &Path, key: &str) -> Result<()> {
        let body = tokio::fs::read(path)
            .await
            .with_context(|| format!("failed to read upload source {}", path.display()))?;
        let size = body.len();

        let response = self
            .http_client
            .put(self.object_url(key))
            .body(body)
            .timeout(self.timeout)
            .send()
            .await
            .with_context(|| format!("failed to upload {key} to object store"))?;

        if !response.status().is_success() {
            bail!("object store rejected {key}: {}", response.status());
        }
        tracing::info!("stored {size} bytes as {key}");
        Ok(())
    }
}
