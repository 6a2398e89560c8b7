use anyhow::Result;

use crate::pipeline::{Stage, Token};

/// Moves tokens from input to output without touching them.
///
/// Exists to smoke-test the bucket plumbing of a new deployment before any
/// real stage is wired in.
pub struct Mover;

impl Stage for Mover {
    fn name(&self) -> &str {
        "mover"
    }

    fn validate(&self, _token: &mut Token) -> bool {
        true
    }

    async fn process(&self, _token: &mut Token) -> Result<bool> {
        Ok(true)
    }
}
