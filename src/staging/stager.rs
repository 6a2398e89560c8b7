use std::path::PathBuf;

use anyhow::Result;

use super::secretary::Secretary;

/// Admits staged tokens into the pipeline.
///
/// Stamps every bagged token with the shared `processing_bucket` scratch
/// directory, pours the bag into the pipeline's entry bucket, and commits
/// the now-empty bag. The pour happens before the commit, so a crash in the
/// window between them leaves the poured tokens both in the entry bucket and
/// in the bag directory; on restart the next pour would duplicate them, and
/// the bag directory must be cleared by hand first.
pub struct Stager {
    secretary: Secretary,
    entry_bucket: PathBuf,
    processing_bucket: PathBuf,
}

impl Stager {
    pub fn new(
        secretary: Secretary,
        entry_bucket: impl Into<PathBuf>,
        processing_bucket: impl Into<PathBuf>,
    ) -> Self {
        Self {
            secretary,
            entry_bucket: entry_bucket.into(),
            processing_bucket: processing_bucket.into(),
        }
    }

    /// Stamps each staged token with the scratch directory stages will use
    /// for its artifacts.
    pub fn update_tokens(&mut self) {
        let processing = self.processing_bucket.to_string_lossy().into_owned();
        self.secretary.bag_mut().for_each_token(|token| {
            token.set("processing_bucket", processing.clone());
        });
    }

    /// Pours the bag into the entry bucket and, when `commit` is set,
    /// persists ledger and bag afterwards.
    pub fn stage(&mut self, commit: bool) -> Result<usize> {
        self.update_tokens();
        let poured = self.secretary.pour_bag(&self.entry_bucket)?;
        if commit {
            self.secretary.commit()?;
        }
        tracing::info!("staged {poured} tokens into {}", self.entry_bucket.display());
        Ok(poured)
    }

    pub fn into_secretary(self) -> Secretary {
        self.secretary
    }
}
