use std::path::Path;

use anyhow::{bail, Context, Result};
use tokio::process::Command;

/// Decrypts a gpg-encrypted archive into `output`.
///
/// Runs `gpg --batch` as a child process and waits for it; stderr is
/// captured and included in the error on a non-zero exit. The passphrase
/// travels on the command line of the child only, it is never logged.
pub async fn decrypt_file(input: &Path, output: &Path, passphrase: &str) -> Result<()> {
    let result = Command::new("gpg")
        .arg("--batch")
        .arg("--yes")
        .arg("--passphrase")
        .arg(passphrase)
        .arg("--decrypt")
        .arg("--output")
        .arg(output)
        .arg(input)
        .output()
        .await
        .context("failed to launch gpg")?;

    if !result.status.success() {
        let stderr = String::from_utf8_lossy(&result.stderr);
        bail!(
            "gpg failed on {} ({}): {}",
            input.display(),
            result.status,
            stderr.trim()
        );
    }
    tracing::info!("decrypted {} to {}", input.display(), output.display());
    Ok(())
}
