use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use serde::Serialize;

use super::pipe::Pipe;
use crate::config::PipelineConfig;

/// Per-bucket file counts for the diagnostic snapshot.
#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct BucketCounts {
    pub waiting: usize,
    pub in_process: usize,
    pub errored: usize,
}

/// The named bucket topology of the pipeline.
///
/// Resolves bucket names to filesystem paths and produces Pipes on demand.
/// Bucket directories are assumed to exist; only the single-reader-per-bucket
/// deployment is supported.
#[derive(Debug, Clone)]
pub struct Pipeline {
    buckets: Vec<(String, PathBuf)>,
}

impl Pipeline {
    pub fn new(buckets: Vec<(String, PathBuf)>) -> Self {
        Self { buckets }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(
            config
                .buckets
                .iter()
                .map(|b| (b.name.clone(), b.path.clone()))
                .collect(),
        )
    }

    /// Resolves a bucket name to its directory path.
    pub fn bucket(&self, name: &str) -> Result<&Path> {
        self.buckets
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, p)| p.as_path())
            .ok_or_else(|| anyhow!("bucket '{name}' is not configured"))
    }

    /// Builds a Pipe between two named buckets.
    pub fn pipe(&self, in_name: &str, out_name: &str) -> Result<Pipe> {
        let input = self.bucket(in_name)?;
        let output = self.bucket(out_name)?;
        Ok(Pipe::new(input, output))
    }

    /// Read-only status view: counts each bucket's waiting, in-process and
    /// errored files. Never mutates pipeline state.
    pub fn snapshot(&self) -> Result<BTreeMap<String, BucketCounts>> {
        let mut report = BTreeMap::new();
        for (name, path) in &self.buckets {
            let mut counts = BucketCounts::default();
            let entries = fs::read_dir(path)
                .with_context(|| format!("failed to list bucket '{name}' at {}", path.display()))?;
            for entry in entries {
                match entry?.path().extension().and_then(|e| e.to_str()) {
                    Some("json") => counts.waiting += 1,
                    Some("bak") => counts.in_process += 1,
                    Some("err") => counts.errored += 1,
                    _ => {}
                }
            }
            report.insert(name.clone(), counts);
        }
        Ok(report)
    }
}
