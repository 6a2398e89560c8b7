use anyhow::Result;
use chrono::Utc;

use crate::clients::ConversionService;
use crate::pipeline::{LogLevel, Stage, Token};

/// Submits each book to the conversion service.
///
/// The first real stage a token meets. A refused submission (the service is
/// not allowed to release the book) fails the token; on success the token is
/// stamped with `when_requested` so the monitor's wait is measurable.
pub struct Requester<C> {
    client: C,
}

impl<C> Requester<C> {
    pub fn new(client: C) -> Self {
        Self { client }
    }
}

impl<C: ConversionService + Sync> Stage for Requester<C> {
    fn name(&self) -> &str {
        "requester"
    }

    fn validate(&self, _token: &mut Token) -> bool {
        true
    }

    async fn process(&self, token: &mut Token) -> Result<bool> {
        let accepted = self.client.submit_for_conversion(&token.barcode).await?;
        if !accepted {
            token.append_log(
                Some(self.name()),
                LogLevel::Error,
                "Not allowed to be downloaded",
            );
            return Ok(false);
        }
        token.set("when_requested", Utc::now().to_rfc3339());
        Ok(true)
    }
}
