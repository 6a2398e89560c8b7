//! Staging Module
//!
//! Everything that happens to a book before its token enters the pipeline.
//!
//! ## Responsibilities
//! - **TokenBag**: a directory of freshly minted tokens waiting for
//!   admission, with an in-memory working copy and explicit persistence.
//! - **Secretary**: the clerk that picks books out of the ledger, mints
//!   tokens for them, and keeps ledger and bag consistent (ledger first,
//!   bag second on commit).
//! - **Stager**: stamps staged tokens with their shared scratch directory
//!   and pours the bag into the pipeline's entry bucket.

pub mod bag;
pub mod secretary;
pub mod stager;


pub use bag::TokenBag;
pub use secretary::Secretary;
pub use stager::Stager;
