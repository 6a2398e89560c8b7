use chrono::{DateTime, Utc};

/// Lifecycle state of a book in the ledger.
///
/// Transitions are monotonic: Unprocessed -> Chosen -> Completed, never
/// reversed. The empty string in the CSV encodes Unprocessed; `as_str` and
/// `parse` are the only persistence surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookStatus {
    Unprocessed,
    Chosen,
    Completed,
}

impl BookStatus {
    /// CSV field representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            BookStatus::Unprocessed => "",
            BookStatus::Chosen => "chosen",
            BookStatus::Completed => "completed",
        }
    }

    /// Parses the CSV field representation.
    pub fn parse(field: &str) -> Option<Self> {
        match field {
            "" => Some(BookStatus::Unprocessed),
            "chosen" => Some(BookStatus::Chosen),
            "completed" => Some(BookStatus::Completed),
            _ => None,
        }
    }
}

/// One row of the book ledger.
///
/// A book's ledger entry exists independently of any token: a barcode may be
/// `chosen` here while its token sits in the bag or in a pipeline bucket.
/// These are different views of the same unit of work, not duplicated state.
#[derive(Debug, Clone)]
pub struct Book {
    pub barcode: String,
    pub date_chosen: Option<DateTime<Utc>>,
    pub date_completed: Option<DateTime<Utc>>,
    pub status: BookStatus,
}

impl Book {
    /// Creates an unprocessed entry.
    pub fn new(barcode: impl Into<String>) -> Self {
        Self {
            barcode: barcode.into(),
            date_chosen: None,
            date_completed: None,
            status: BookStatus::Unprocessed,
        }
    }
}
