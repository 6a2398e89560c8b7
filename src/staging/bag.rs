use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

use crate::pipeline::{dump_token, load_token, Token};

/// A staging directory of tokens that have been minted but not yet admitted
/// to the pipeline.
///
/// The bag keeps an in-memory working copy of its tokens; mutations are
/// visible immediately in memory and hit the directory only on `dump`.
/// Callers sequence that persistence explicitly (the Secretary commits the
/// ledger before the bag, so a crash in between leaves a chosen book with no
/// token rather than a token for an unchosen book).
#[derive(Debug)]
pub struct TokenBag {
    dir: PathBuf,
    tokens: Vec<Token>,
}

impl TokenBag {
    /// Loads the bag from its directory, reading every `.json` token file.
    pub fn load(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        let mut tokens = Vec::new();
        let entries = fs::read_dir(&dir)
            .with_context(|| format!("failed to list token bag {}", dir.display()))?;
        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) == Some("json") {
                tokens.push(load_token(&path)?);
            }
        }
        tokens.sort_by(|a, b| a.barcode.cmp(&b.barcode));
        tracing::debug!("loaded {} staged tokens from {}", tokens.len(), dir.display());
        Ok(Self { dir, tokens })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn size(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Mints a fresh token for a barcode and adds it to the in-memory bag.
    pub fn add_book(&mut self, barcode: &str) {
        self.tokens.push(Token::new(barcode));
    }

    pub fn find_token(&self, barcode: &str) -> Option<&Token> {
        self.tokens.iter().find(|t| t.barcode == barcode)
    }

    /// Removes and returns the token for a barcode, erroring if absent.
    pub fn take_token(&mut self, barcode: &str) -> Result<Token> {
        let idx = self
            .tokens
            .iter()
            .position(|t| t.barcode == barcode);
        match idx {
            Some(idx) => Ok(self.tokens.remove(idx)),
            None => bail!("token {barcode} is not in the bag"),
        }
    }

    /// Applies a mutation to every token in the bag.
    pub fn for_each_token(&mut self, mut f: impl FnMut(&mut Token)) {
        for token in &mut self.tokens {
            f(token);
        }
    }

    /// Persists the in-memory bag to its directory.
    ///
    /// Deletes every existing `.json` file first, then writes the current
    /// token set, so the directory always reflects exactly the in-memory
    /// state after a dump.
    pub fn dump(&self) -> Result<()> {
        let entries = fs::read_dir(&self.dir)
            .with_context(|| format!("failed to list token bag {}", self.dir.display()))?;
        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) == Some("json") {
                fs::remove_file(&path).with_context(|| {
                    format!("failed to clear stale token {}", path.display())
                })?;
            }
        }
        for token in &self.tokens {
            let path = self.dir.join(format!("{}.json", token.barcode));
            dump_token(token, &path)?;
        }
        tracing::debug!("dumped {} staged tokens to {}", self.tokens.len(), self.dir.display());
        Ok(())
    }

    /// Moves every token out of the bag into a pipeline bucket.
    ///
    /// Tokens land in the bucket as `<barcode>.json` and the in-memory bag
    /// empties. The bag directory itself is untouched until the caller
    /// commits with `dump`.
    pub fn pour_into(&mut self, bucket: &Path) -> Result<usize> {
        let poured = self.tokens.len();
        for token in self.tokens.drain(..) {
            let dest = bucket.join(format!("{}.json", token.barcode));
            dump_token(&token, &dest)?;
        }
        tracing::info!("poured {} tokens into {}", poured, bucket.display());
        Ok(poured)
    }
}
