use anyhow::Result;

use crate::clients::ObjectStore;
use crate::pipeline::{LogLevel, Stage, Token};

use super::processing_bucket;

/// Uploads the decrypted archive to the long-term object store.
///
/// Records the verdict on the token as `upload_status`.
pub struct Uploader<S> {
    store: S,
}

impl<S> Uploader<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }
}

impl<S: ObjectStore + Sync> Stage for Uploader<S> {
    fn name(&self) -> &str {
        "uploader"
    }

    fn validate(&self, token: &mut Token) -> bool {
        let Some(dir) = processing_bucket(token, "uploader") else {
            return false;
        };
        let infile = dir.join(format!("{}.tgz", token.barcode));
        if !infile.is_file() {
            let message = format!("source file does not exist: {}", infile.display());
            tracing::error!("{message}");
            token.append_log(Some("uploader"), LogLevel::Error, message);
            return false;
        }
        true
    }

    async fn process(&self, token: &mut Token) -> Result<bool> {
        let Some(dir) = processing_bucket(token, self.name()) else {
            return Ok(false);
        };
        let infile = dir.join(format!("{}.tgz", token.barcode));

        match self.store.store(&infile, &token.barcode).await {
            Ok(()) => {
                token.set("upload_status", "success");
                token.append_log(Some(self.name()), LogLevel::Info, "Upload successful");
                Ok(true)
            }
            Err(e) => {
                token.set("upload_status", "fail");
                token.append_log(
                    Some(self.name()),
                    LogLevel::Error,
                    format!("Upload error: {e:#}"),
                );
                Ok(false)
            }
        }
    }
}
