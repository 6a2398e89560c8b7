//! Pipeline Configuration Module
//!
//! Loads the YAML pipeline description: global paths, the named bucket list,
//! and the filter-stage descriptors the orchestrator launches. The parsed
//! configuration is an explicit value constructed once and passed into each
//! component's constructor; there are no process-wide mutable singletons.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Paths and settings shared by every component.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalConfig {
    /// CSV file recording every known book and its lifecycle status.
    pub ledger_file: PathBuf,
    /// Directory holding staged tokens before pipeline admission.
    pub token_bag: PathBuf,
    /// Shared scratch directory where stages read and write artifacts.
    pub processing_bucket: PathBuf,
    /// Directory where finished artifacts are parked by the cleaner.
    pub finished_bucket: PathBuf,
    /// Seconds a filter sleeps when its input bucket is empty.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    /// Base URL of the conversion service.
    pub conversion_service_url: String,
    /// Base URL of the long-term object store.
    pub object_store_url: String,
}

fn default_poll_interval() -> u64 {
    5
}

/// One named bucket directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BucketConfig {
    pub name: String,
    pub path: PathBuf,
}

/// Input/output bucket names for one filter stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipeConfig {
    #[serde(rename = "in")]
    pub input: String,
    #[serde(rename = "out")]
    pub output: String,
}

/// Descriptor for one filter stage process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Display name used in logs and the orchestrator status report.
    pub name: String,
    /// Which stage implementation to run (e.g. "requester", "decryptor").
    pub stage: String,
    pub pipe: PipeConfig,
    /// Stage-specific environment variables added to the child process.
    #[serde(default)]
    pub env: HashMap<String, String>,
}

/// The complete pipeline description.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub global: GlobalConfig,
    pub buckets: Vec<BucketConfig>,
    #[serde(default)]
    pub filters: Vec<FilterConfig>,
}

/// Loads and parses a YAML pipeline configuration file.
pub fn load_config(path: &Path) -> Result<PipelineConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    let config: PipelineConfig = serde_yaml::from_str(&raw)
        .with_context(|| format!("failed to parse config file {}", path.display()))?;
    Ok(config)
}
