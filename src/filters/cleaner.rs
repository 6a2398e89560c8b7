use std::fs;
use std::path::PathBuf;

use anyhow::Result;

use crate::pipeline::{LogLevel, Stage, Token};

use super::processing_bucket;

/// Parks the decrypted archive in the finished bucket.
///
/// The last stage: the upload already happened, this just moves the local
/// `.tgz` out of the scratch directory so the scratch space stays small.
pub struct Cleaner {
    finished_bucket: PathBuf,
}

impl Cleaner {
    pub fn new(finished_bucket: impl Into<PathBuf>) -> Self {
        Self {
            finished_bucket: finished_bucket.into(),
        }
    }
}

impl Stage for Cleaner {
    fn name(&self) -> &str {
        "cleaner"
    }

    fn validate(&self, token: &mut Token) -> bool {
        let Some(dir) = processing_bucket(token, "cleaner") else {
            return false;
        };
        let mut status = true;

        let source = dir.join(format!("{}.tgz", token.barcode));
        if !source.is_file() {
            let message = format!("file to clean does not exist: {}", source.display());
            tracing::error!("{message}");
            token.append_log(Some("cleaner"), LogLevel::Error, message);
            status = false;
        }

        if !self.finished_bucket.is_dir() {
            let message = format!(
                "target directory does not exist: {}",
                self.finished_bucket.display()
            );
            tracing::error!("{message}");
            token.append_log(Some("cleaner"), LogLevel::Error, message);
            status = false;
        }

        status
    }

    async fn process(&self, token: &mut Token) -> Result<bool> {
        let Some(dir) = processing_bucket(token, self.name()) else {
            return Ok(false);
        };
        let filename = format!("{}.tgz", token.barcode);
        let source = dir.join(&filename);
        let dest = self.finished_bucket.join(&filename);

        match fs::rename(&source, &dest) {
            Ok(()) => {
                token.append_log(Some(self.name()), LogLevel::Info, "Object moved to done");
                Ok(true)
            }
            Err(e) => {
                token.append_log(
                    Some(self.name()),
                    LogLevel::Error,
                    format!("Object not moved! {e}"),
                );
                Ok(false)
            }
        }
    }
}
