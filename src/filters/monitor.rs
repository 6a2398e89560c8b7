use anyhow::{bail, Result};

use crate::clients::{ConversionService, ConversionStatus};
use crate::pipeline::{MonitorStage, Readiness, Token};

/// Watches requested books until the conversion service finishes them.
///
/// A book still converting is pending and goes back into the bucket; a
/// converted book moves on. A barcode in neither list is a state the
/// pipeline cannot account for, so the token is failed rather than polled
/// forever.
pub struct RequestMonitor<C> {
    client: C,
}

impl<C> RequestMonitor<C> {
    pub fn new(client: C) -> Self {
        Self { client }
    }
}

impl<C: ConversionService + Sync> MonitorStage for RequestMonitor<C> {
    fn name(&self) -> &str {
        "request-monitor"
    }

    async fn assess(&self, token: &Token) -> Result<Readiness> {
        let converted = self.client.list_by_status(ConversionStatus::Converted).await?;
        if converted.iter().any(|b| b == &token.barcode) {
            return Ok(Readiness::Ready);
        }

        let in_process = self.client.list_by_status(ConversionStatus::InProcess).await?;
        if in_process.iter().any(|b| b == &token.barcode) {
            return Ok(Readiness::Pending);
        }

        bail!("{} is neither pending nor converted", token.barcode)
    }
}
