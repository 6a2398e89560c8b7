use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

use super::token::{dump_token, load_token, Token};

/// Binds one input bucket to one output bucket and drives the single-item
/// transactional hand-off protocol between them.
///
/// A Pipe holds at most one token at a time. `take` claims a waiting token
/// by renaming `<barcode>.json` to `<barcode>.bak` inside the input bucket;
/// the rename is atomic at the filesystem level, so two processes racing on
/// the same bucket can never both claim the same barcode. `put` commits the
/// claimed token to the output bucket (or to the input bucket as `.err` on
/// failure) and deletes the `.bak` marker.
///
/// If the owning process dies between `take` and `put`, the token stays
/// behind as a `.bak` file with no holder. That stuck state is observable
/// (it shows up in the `Pipeline` snapshot as in-process) but is not
/// reconciled automatically; an operational sweep has to decide whether to
/// re-queue or escalate.
#[derive(Debug)]
pub struct Pipe {
    input: PathBuf,
    output: PathBuf,
    /// Barcode of the token currently claimed by this Pipe, if any.
    held: Option<String>,
}

impl Pipe {
    pub fn new(input: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
            held: None,
        }
    }

    pub fn input(&self) -> &Path {
        &self.input
    }

    pub fn output(&self) -> &Path {
        &self.output
    }

    /// Barcode of the currently claimed token, if any.
    pub fn held(&self) -> Option<&str> {
        self.held.as_deref()
    }

    /// Lists the barcodes currently waiting (`.json`) in the input bucket,
    /// sorted so that scan order is deterministic.
    pub fn waiting_barcodes(&self) -> Result<Vec<String>> {
        waiting_barcodes(&self.input)
    }

    /// Claims one waiting token from the input bucket.
    ///
    /// Returns `None` without any side effect if this Pipe already holds a
    /// token or if no token is waiting. On success the token file has been
    /// renamed to `.bak` and the claim is held until `put` or `put_back`.
    pub fn take(&mut self) -> Result<Option<Token>> {
        if self.held.is_some() {
            return Ok(None);
        }
        let Some(barcode) = self.waiting_barcodes()?.into_iter().next() else {
            return Ok(None);
        };
        self.claim(&barcode).map(Some)
    }

    /// Claims a specific waiting token by barcode.
    ///
    /// Returns `None` without side effects if this Pipe already holds a
    /// token or if that barcode is not currently waiting.
    pub fn take_named(&mut self, barcode: &str) -> Result<Option<Token>> {
        if self.held.is_some() {
            return Ok(None);
        }
        if !self.input.join(format!("{barcode}.json")).is_file() {
            return Ok(None);
        }
        self.claim(barcode).map(Some)
    }

    fn claim(&mut self, barcode: &str) -> Result<Token> {
        let token_path = self.input.join(format!("{barcode}.json"));
        let token = load_token(&token_path)?;
        let backup_path = token_path.with_extension("bak");
        fs::rename(&token_path, &backup_path).with_context(|| {
            format!("failed to mark token {} as in-flight", token_path.display())
        })?;
        tracing::debug!("claimed token {} from {}", barcode, self.input.display());
        self.held = Some(barcode.to_string());
        Ok(token)
    }

    /// Commits the claimed token.
    ///
    /// Writes it to the output bucket as `<barcode>.json`, or, when
    /// `as_error` is set, to the *input* bucket as `<barcode>.err`. Deletes
    /// the `.bak` marker and releases the claim either way.
    pub fn put(&mut self, token: &Token, as_error: bool) -> Result<()> {
        let dest = if as_error {
            self.input.join(format!("{}.err", token.barcode))
        } else {
            self.output.join(format!("{}.json", token.barcode))
        };
        self.finalize(token, dest)
    }

    /// Returns the claimed token to the input bucket.
    ///
    /// Used when a stage condition is not yet met and the token must stay
    /// available for a future poll.
    pub fn put_back(&mut self, token: &Token, as_error: bool) -> Result<()> {
        let ext = if as_error { "err" } else { "json" };
        let dest = self.input.join(format!("{}.{ext}", token.barcode));
        self.finalize(token, dest)
    }

    fn finalize(&mut self, token: &Token, dest: PathBuf) -> Result<()> {
        match self.held.as_deref() {
            None => bail!("pipe holds no token to put"),
            Some(held) if held != token.barcode => bail!(
                "pipe holds token {held}, not {}",
                token.barcode
            ),
            Some(_) => {}
        }
        // The claim is released whatever happens below. A failed write
        // leaves the token stranded as `.bak`, the same observable state a
        // crash produces, and the pipe stays usable for other tokens.
        self.held = None;
        dump_token(token, &dest)?;

        let backup_path = self.input.join(format!("{}.bak", token.barcode));
        fs::remove_file(&backup_path).with_context(|| {
            format!("failed to remove in-flight marker {}", backup_path.display())
        })?;
        tracing::debug!("finalized token {} to {}", token.barcode, dest.display());
        Ok(())
    }
}

/// Sorted list of waiting barcodes in a bucket directory.
pub fn waiting_barcodes(bucket: &Path) -> Result<Vec<String>> {
    let mut barcodes = Vec::new();
    let entries = fs::read_dir(bucket)
        .with_context(|| format!("failed to list bucket {}", bucket.display()))?;
    for entry in entries {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) == Some("json") {
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                barcodes.push(stem.to_string());
            }
        }
    }
    barcodes.sort();
    Ok(barcodes)
}
