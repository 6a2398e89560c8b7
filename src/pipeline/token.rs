use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Severity of a token audit-log entry.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Info,
    Warning,
    Error,
}

/// One entry in a token's append-only audit log.
///
/// Every stage transition appends at least one entry; entries are never
/// rewritten, only appended.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<String>,
    pub level: LogLevel,
    pub message: String,
}

/// The unit of work exchanged between pipeline stages.
///
/// A token is a typed property bag: the `barcode` is its identity (and its
/// filesystem basename within a bucket), `props` holds arbitrary
/// JSON-compatible stage metadata (`processing_bucket`, `upload_status`, ...),
/// and `log` records every stage's verdict. The token itself performs no
/// validation; stages decide what a usable token looks like.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Token {
    pub barcode: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub log: Vec<LogEntry>,
    #[serde(flatten)]
    props: serde_json::Map<String, Value>,
}

impl Token {
    /// Creates a bare token holding only its barcode.
    pub fn new(barcode: impl Into<String>) -> Self {
        Self {
            barcode: barcode.into(),
            log: Vec::new(),
            props: serde_json::Map::new(),
        }
    }

    /// The token's identity, which doubles as its filename stem.
    pub fn name(&self) -> &str {
        &self.barcode
    }

    /// Looks up an arbitrary property by key.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.props.get(key)
    }

    /// Sets (or replaces) an arbitrary property.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.props.insert(key.into(), value.into());
    }

    /// Appends an audit-log entry stamped with the current UTC time.
    pub fn append_log(&mut self, stage: Option<&str>, level: LogLevel, message: impl Into<String>) {
        self.log.push(LogEntry {
            timestamp: Utc::now(),
            stage: stage.map(str::to_string),
            level,
            message: message.into(),
        });
    }
}

/// Reads a token from a JSON file.
pub fn load_token(path: &Path) -> Result<Token> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read token file {}", path.display()))?;
    let token: Token = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse token file {}", path.display()))?;
    Ok(token)
}

/// Writes a token to a JSON file.
///
/// The write goes through a sibling temp file followed by an atomic rename,
/// so a crash mid-write never leaves a truncated token in a bucket.
pub fn dump_token(token: &Token, path: &Path) -> Result<()> {
    let body = serde_json::to_string_pretty(token)
        .with_context(|| format!("failed to serialize token {}", token.barcode))?;
    let tmp_path = path.with_extension("tmp");
    fs::write(&tmp_path, body)
        .with_context(|| format!("failed to write token file {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path)
        .with_context(|| format!("failed to move token file into place at {}", path.display()))?;
    Ok(())
}
