//! Book Ledger Module
//!
//! The durable registry of every known book and its lifecycle status.
//!
//! ## Core Concepts
//! - **Single source of truth**: the CSV file on disk. The ledger is loaded
//!   fully into memory, mutated there, and flushed wholesale on `write_ledger`.
//!   Between load and write the in-memory copy is authoritative.
//! - **Monotonic status**: unprocessed -> chosen -> completed. Choosing an
//!   unknown or already-chosen barcode is a caller error and is raised, never
//!   silently swallowed.
//! - **Crash safety**: `write_ledger` copies the previous file to a sibling
//!   `~`-suffixed backup and performs the rewrite through a temp file plus
//!   atomic rename, so a crash mid-write leaves either the old or the new
//!   ledger intact, never a truncated one.
//!
//! A single process owns the ledger file at a time; there is no external
//! locking around the read/mutate/flush cycle.

pub mod types;


use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::Utc;

pub use types::{Book, BookStatus};

const CSV_HEADER: &str = "barcode,date_chosen,date_completed,status";

/// In-memory view of the ledger CSV, preserving file row order.
#[derive(Debug)]
pub struct BookLedger {
    csv_path: PathBuf,
    books: Vec<Book>,
}

impl BookLedger {
    /// Loads the ledger from its CSV file.
    pub fn load(csv_path: impl Into<PathBuf>) -> Result<Self> {
        let csv_path = csv_path.into();
        let raw = fs::read_to_string(&csv_path)
            .with_context(|| format!("failed to read ledger file {}", csv_path.display()))?;
        let books = parse_csv(&raw)
            .with_context(|| format!("failed to parse ledger file {}", csv_path.display()))?;
        tracing::debug!("loaded {} ledger entries from {}", books.len(), csv_path.display());
        Ok(Self { csv_path, books })
    }

    pub fn path(&self) -> &Path {
        &self.csv_path
    }

    pub fn len(&self) -> usize {
        self.books.len()
    }

    pub fn is_empty(&self) -> bool {
        self.books.is_empty()
    }

    /// Looks up a book by barcode.
    pub fn entry(&self, barcode: &str) -> Option<&Book> {
        self.books.iter().find(|b| b.barcode == barcode)
    }

    /// Marks an unprocessed book as chosen and stamps `date_chosen`.
    ///
    /// This is the single validation point keeping tokens for unknown books
    /// out of the pipeline: an unknown barcode errors, and so does a book
    /// that is already chosen or completed (`date_chosen` is never silently
    /// re-stamped).
    pub fn choose_book(&mut self, barcode: &str) -> Result<&Book> {
        let book = self
            .books
            .iter_mut()
            .find(|b| b.barcode == barcode)
            .with_context(|| format!("book {barcode} not in ledger"))?;
        if book.status != BookStatus::Unprocessed {
            bail!(
                "book {barcode} has status '{}', expected unprocessed",
                book.status.as_str()
            );
        }
        book.status = BookStatus::Chosen;
        book.date_chosen = Some(Utc::now());
        tracing::info!("chose book {barcode}");
        Ok(book)
    }

    /// Marks a book as completed and stamps `date_completed`.
    pub fn mark_completed(&mut self, barcode: &str) -> Result<&Book> {
        let book = self
            .books
            .iter_mut()
            .find(|b| b.barcode == barcode)
            .with_context(|| format!("book {barcode} not in ledger"))?;
        book.status = BookStatus::Completed;
        book.date_completed = Some(Utc::now());
        tracing::info!("marked book {barcode} completed");
        Ok(book)
    }

    fn with_status(&self, status: BookStatus) -> Vec<&Book> {
        self.books.iter().filter(|b| b.status == status).collect()
    }

    /// Books not yet chosen, in ledger file order.
    pub fn all_unprocessed(&self) -> Vec<&Book> {
        self.with_status(BookStatus::Unprocessed)
    }

    pub fn all_chosen(&self) -> Vec<&Book> {
        self.with_status(BookStatus::Chosen)
    }

    pub fn all_completed(&self) -> Vec<&Book> {
        self.with_status(BookStatus::Completed)
    }

    /// Rewrites the whole CSV from the in-memory map.
    ///
    /// With `backup` set (the default path for callers), the previous file is
    /// first copied to `<file>~`; the rewrite itself goes through a temp file
    /// and an atomic rename. Operators should treat the backup as the
    /// recovery path if the ledger ever looks wrong after a crash.
    pub fn write_ledger(&self, backup: bool) -> Result<()> {
        if backup && self.csv_path.exists() {
            let backup_path = backup_path(&self.csv_path);
            fs::copy(&self.csv_path, &backup_path).with_context(|| {
                format!("failed to back up ledger to {}", backup_path.display())
            })?;
        }

        let mut out = String::with_capacity(64 * (self.books.len() + 1));
        out.push_str(CSV_HEADER);
        out.push('\n');
        for book in &self.books {
            out.push_str(&format!(
                "{},{},{},{}\n",
                book.barcode,
                book.date_chosen.map(|d| d.to_rfc3339()).unwrap_or_default(),
                book.date_completed.map(|d| d.to_rfc3339()).unwrap_or_default(),
                book.status.as_str()
            ));
        }

        let tmp_path = self.csv_path.with_extension("csv.tmp");
        fs::write(&tmp_path, out)
            .with_context(|| format!("failed to write ledger temp file {}", tmp_path.display()))?;
        fs::rename(&tmp_path, &self.csv_path).with_context(|| {
            format!("failed to move ledger into place at {}", self.csv_path.display())
        })?;
        tracing::debug!("wrote {} ledger entries to {}", self.books.len(), self.csv_path.display());
        Ok(())
    }
}

fn backup_path(csv_path: &Path) -> PathBuf {
    let mut name = csv_path.as_os_str().to_os_string();
    name.push("~");
    PathBuf::from(name)
}

fn parse_csv(raw: &str) -> Result<Vec<Book>> {
    let mut lines = raw.lines();
    let header = lines.next().context("ledger file is empty")?;
    if header.trim() != CSV_HEADER {
        bail!("unexpected ledger header '{header}', expected '{CSV_HEADER}'");
    }

    let mut books = Vec::new();
    for (idx, line) in lines.enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split(',').collect();
        if fields.len() != 4 {
            bail!("ledger row {} has {} fields, expected 4", idx + 2, fields.len());
        }
        let status = BookStatus::parse(fields[3].trim())
            .with_context(|| format!("unknown status '{}' on row {}", fields[3], idx + 2))?;
        books.push(Book {
            barcode: fields[0].trim().to_string(),
            date_chosen: parse_date(fields[1])?,
            date_completed: parse_date(fields[2])?,
            status,
        });
    }
    Ok(books)
}

fn parse_date(field: &str) -> Result<Option<chrono::DateTime<Utc>>> {
    let field = field.trim();
    if field.is_empty() {
        return Ok(None);
    }
    let parsed = chrono::DateTime::parse_from_rfc3339(field)
        .with_context(|| format!("invalid date '{field}' in ledger"))?;
    Ok(Some(parsed.with_timezone(&Utc)))
}
