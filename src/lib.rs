//! Book Conversion Pipeline Library
//!
//! This library crate defines the core modules of a filesystem-coordinated
//! conversion pipeline for digitized books. It serves as the foundation for
//! the binary executable (`main.rs`).
//!
//! ## Architecture Modules
//! The system is composed of six loosely coupled subsystems:
//!
//! - **`pipeline`**: The plumbing layer. Tokens (units of work), Pipes
//!   (single-item transactional hand-off between bucket directories),
//!   Filter drivers (poll-loop workers), and the Pipeline topology.
//! - **`ledger`**: The durable book registry. A CSV-backed record of every
//!   known book and its lifecycle status, independent of pipeline state.
//! - **`staging`**: Pre-admission coordination. The TokenBag holding area,
//!   the Secretary (ledger/bag selection and commit), and the Stager that
//!   pours tokens into the pipeline's entry bucket.
//! - **`filters`**: The concrete processing stages (request conversion,
//!   monitor, download, decrypt, upload, clean up).
//! - **`clients`**: External collaborators: the conversion service, the
//!   object store, and the gpg decryption subprocess.
//! - **`orchestrator`**: Process supervision. Launches one OS process per
//!   configured filter stage and manages start/stop/status/reload.

pub mod clients;
pub mod config;
pub mod filters;
pub mod ledger;
pub mod orchestrator;
pub mod pipeline;
pub mod staging;
