//! Filter Stages Module
//!
//! The concrete stages a book token passes through, in pipeline order:
//!
//! 1. **Requester**: asks the conversion service to convert the book.
//! 2. **RequestMonitor**: watches requested books until conversion finishes.
//! 3. **Downloader**: fetches the encrypted archive into the scratch
//!    directory.
//! 4. **Decryptor**: turns `<barcode>.tar.gz.gpg` into `<barcode>.tgz`.
//! 5. **Uploader**: pushes the decrypted archive to the object store.
//! 6. **Cleaner**: parks the archive in the finished bucket.
//!
//! **Mover** is a do-nothing stage kept for plumbing smoke tests.
//!
//! Stages implement the [`Stage`](crate::pipeline::Stage) or
//! [`MonitorStage`](crate::pipeline::MonitorStage) contract and hold their
//! external collaborators by generic parameter, so every stage can be
//! exercised against an in-memory fake.

pub mod cleaner;
pub mod decryptor;
pub mod downloader;
pub mod monitor;
pub mod mover;
pub mod requester;
pub mod uploader;


pub use cleaner::Cleaner;
pub use decryptor::Decryptor;
pub use downloader::Downloader;
pub use monitor::RequestMonitor;
pub use mover::Mover;
pub use requester::Requester;
pub use uploader::Uploader;

use crate::pipeline::{LogLevel, Token};

/// Reads the scratch directory a token was stamped with at staging time.
///
/// Appends an ERROR audit entry and returns `None` when the property is
/// missing, which every stage treats as a validation failure.
pub(crate) fn processing_bucket(token: &mut Token, stage: &str) -> Option<std::path::PathBuf> {
    match token.get("processing_bucket").and_then(|v| v.as_str()) {
        Some(dir) => Some(std::path::PathBuf::from(dir)),
        None => {
            token.append_log(Some(stage), LogLevel::Error, "token has no processing_bucket");
            None
        }
    }
}
