use anyhow::Result;

use crate::clients::ConversionService;
use crate::pipeline::{Stage, Token};

use super::processing_bucket;

/// Downloads the finished encrypted archive into the scratch directory.
pub struct Downloader<C> {
    client: C,
}

impl<C> Downloader<C> {
    pub fn new(client: C) -> Self {
        Self { client }
    }
}

impl<C: ConversionService + Sync> Stage for Downloader<C> {
    fn name(&self) -> &str {
        "downloader"
    }

    fn validate(&self, token: &mut Token) -> bool {
        processing_bucket(token, "downloader").is_some()
    }

    async fn process(&self, token: &mut Token) -> Result<bool> {
        // validate() has already established the property exists.
        let Some(dir) = processing_bucket(token, self.name()) else {
            return Ok(false);
        };
        let dest = dir.join(format!("{}.tar.gz.gpg", token.barcode));
        self.client.download_artifact(&token.barcode, &dest).await?;
        Ok(true)
    }
}
