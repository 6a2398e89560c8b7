//! External Collaborator Clients
//!
//! Adapters for the three outside systems the pipeline stages talk to.
//!
//! ## Responsibilities
//! - **Conversion service**: requesting book conversions, polling their
//!   status and downloading the finished encrypted archives.
//! - **Object store**: long-term storage for the decrypted archives.
//! - **Decryption**: shelling out to `gpg` for the archive decryption step.
//!
//! Stages depend on the traits here, never on the HTTP types, so tests can
//! substitute in-memory fakes for the real services.

pub mod conversion;
pub mod decrypt;
pub mod store;


pub use conversion::{ConversionService, ConversionStatus, HttpConversionClient};
pub use decrypt::decrypt_file;
pub use store::{HttpObjectStore, ObjectStore};
