//! Pipeline Plumbing Module
//!
//! Implements the token-passing substrate that moves units of work between
//! processing stages using only the filesystem as a shared medium.
//!
//! ## Core Concepts
//! - **Token**: a named, mutable property bag with an append-only audit log,
//!   serialized as `<barcode>.json` inside a bucket directory.
//! - **Bucket**: a directory whose contents partition into three logical
//!   sets by extension: waiting (`.json`), in-flight (`.bak`), errored (`.err`).
//! - **Pipe**: binds one input bucket to one output bucket and implements
//!   the single-item take/process/commit protocol. The rename from `.json`
//!   to `.bak` is the sole concurrency-control primitive.
//! - **Filter**: the worker abstraction. A `Stage` validates and processes
//!   one token; the drivers (`FilterDriver`, `MonitorDriver`) run the poll
//!   loop and convert every failure into a token-visible audit entry.
//! - **Pipeline**: the named bucket topology, resolving bucket names to
//!   paths and producing Pipes on demand.
//!
//! ## Deployment Invariant
//! At most one worker process may read a given input bucket. The `.bak`
//! rename makes a double-take impossible at the filesystem level, but the
//! design does not attempt fair load distribution across competing readers.

pub mod filter;
pub mod pipe;
pub mod token;
pub mod topology;

pub use filter::{FilterDriver, MonitorDriver, MonitorStage, Outcome, Readiness, Stage};
pub use pipe::Pipe;
pub use token::{dump_token, load_token, LogLevel, Token};
pub use topology::{BucketCounts, Pipeline};

#[cfg(test)]
mod tests;
