use std::path::PathBuf;

use anyhow::Result;

use crate::clients::decrypt_file;
use crate::pipeline::{LogLevel, Stage, Token};

use super::processing_bucket;

/// Decrypts the downloaded archive with gpg.
///
/// `<barcode>.tar.gz.gpg` in the scratch directory becomes `<barcode>.tgz`.
/// The verdict is recorded on the token as `decryption_status` so later
/// stages and operators can tell a failed decryption from a missing
/// download.
pub struct Decryptor {
    passphrase: String,
}

impl Decryptor {
    pub fn new(passphrase: impl Into<String>) -> Self {
        Self {
            passphrase: passphrase.into(),
        }
    }

    fn infile(dir: &std::path::Path, barcode: &str) -> PathBuf {
        dir.join(format!("{barcode}.tar.gz.gpg"))
    }

    fn outfile(dir: &std::path::Path, barcode: &str) -> PathBuf {
        dir.join(format!("{barcode}.tgz"))
    }
}

impl Stage for Decryptor {
    fn name(&self) -> &str {
        "decryptor"
    }

    fn validate(&self, token: &mut Token) -> bool {
        let Some(dir) = processing_bucket(token, "decryptor") else {
            return false;
        };
        let infile = Self::infile(&dir, &token.barcode);
        if !infile.is_file() {
            let message = format!("source file does not exist: {}", infile.display());
            tracing::error!("{message}");
            token.append_log(Some("decryptor"), LogLevel::Error, message);
            return false;
        }
        true
    }

    async fn process(&self, token: &mut Token) -> Result<bool> {
        let Some(dir) = processing_bucket(token, self.name()) else {
            return Ok(false);
        };
        let infile = Self::infile(&dir, &token.barcode);
        let outfile = Self::outfile(&dir, &token.barcode);

        match decrypt_file(&infile, &outfile, &self.passphrase).await {
            Ok(()) => {
                token.set("decryption_status", "success");
                token.append_log(Some(self.name()), LogLevel::Info, "Decryption successful");
                Ok(true)
            }
            Err(e) => {
                token.set("decryption_status", "fail");
                token.append_log(
                    Some(self.name()),
                    LogLevel::Warning,
                    format!("Decryption failed: {e:#}"),
                );
                Ok(false)
            }
        }
    }
}
