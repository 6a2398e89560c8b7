use std::time::Duration;

use anyhow::Result;

use super::pipe::Pipe;
use super::token::{LogLevel, Token};

/// Result of one driver iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// No token was waiting; the caller should back off before retrying.
    Idle,
    /// A token was taken and forwarded to the output bucket.
    Handled,
    /// A token was taken and routed to the error file in the input bucket.
    HandledWithError,
}

/// One processing stage of the pipeline.
///
/// A stage is a capability contract, not a subclass: it checks that a token
/// meets its preconditions and performs one unit of stage-specific work,
/// usually by delegating to an external collaborator. The drivers own the
/// take/put protocol; stages never touch the filesystem hand-off.
pub trait Stage {
    /// Stage name recorded in token audit-log entries.
    fn name(&self) -> &str;

    /// Checks stage preconditions. Implementations should append an ERROR
    /// log entry to the token describing what is missing before returning
    /// false.
    fn validate(&self, token: &mut Token) -> bool;

    /// Performs the stage's unit of work.
    ///
    /// `Ok(true)` forwards the token, `Ok(false)` fails it with a WARNING,
    /// and `Err` fails it with an ERROR carrying the failure text. The
    /// driver guarantees none of these escape the poll loop.
    fn process(&self, token: &mut Token) -> impl std::future::Future<Output = Result<bool>> + Send;
}

/// Drives a [`Stage`] over one Pipe: take, validate, process, commit.
pub struct FilterDriver<S: Stage> {
    pipe: Pipe,
    stage: S,
}

impl<S: Stage + Sync> FilterDriver<S> {
    pub fn new(pipe: Pipe, stage: S) -> Self {
        Self { pipe, stage }
    }

    pub fn pipe(&self) -> &Pipe {
        &self.pipe
    }

    /// Runs one iteration of the stage state machine.
    ///
    /// Every failure is converted into an audit entry on the token plus an
    /// `.err` file; only infrastructure faults (an unreadable bucket, a
    /// failed rename) surface as `Err` to the caller.
    pub async fn run_once(&mut self) -> Result<Outcome> {
        let Some(mut token) = self.pipe.take()? else {
            return Ok(Outcome::Idle);
        };

        if !self.stage.validate(&mut token) {
            // Stages append their own entry describing what is missing; this
            // one guarantees every .err file explains itself even when a
            // stage forgets.
            token.append_log(Some(self.stage.name()), LogLevel::Error, "Validation failed");
            tracing::warn!(
                "token {} failed validation in stage {}",
                token.barcode,
                self.stage.name()
            );
            self.pipe.put(&token, true)?;
            return Ok(Outcome::HandledWithError);
        }

        match self.stage.process(&mut token).await {
            Ok(true) => {
                token.append_log(
                    Some(self.stage.name()),
                    LogLevel::Info,
                    "Stage completed successfully",
                );
                self.pipe.put(&token, false)?;
                tracing::info!(
                    "stage {} processed token {}",
                    self.stage.name(),
                    token.barcode
                );
                Ok(Outcome::Handled)
            }
            Ok(false) => {
                token.append_log(
                    Some(self.stage.name()),
                    LogLevel::Warning,
                    "Stage reported failure",
                );
                self.pipe.put(&token, true)?;
                tracing::warn!(
                    "stage {} failed token {}",
                    self.stage.name(),
                    token.barcode
                );
                Ok(Outcome::HandledWithError)
            }
            Err(e) => {
                token.append_log(Some(self.stage.name()), LogLevel::Error, format!("{e:#}"));
                self.pipe.put(&token, true)?;
                tracing::error!(
                    "stage {} errored on token {}: {e:#}",
                    self.stage.name(),
                    token.barcode
                );
                Ok(Outcome::HandledWithError)
            }
        }
    }

    /// Loops `run_once`, sleeping `poll_interval` only when the input bucket
    /// is empty. A non-idle iteration retries immediately so a backlog is
    /// drained before backing off.
    pub async fn run_forever(&mut self, poll_interval: Duration) {
        tracing::info!("stage {} polling {}", self.stage.name(), self.pipe.input().display());
        loop {
            match self.run_once().await {
                Ok(Outcome::Idle) => tokio::time::sleep(poll_interval).await,
                Ok(_) => {}
                Err(e) => {
                    // Bucket-level faults should not kill the worker; log and back off.
                    tracing::error!("stage {} iteration failed: {e:#}", self.stage.name());
                    tokio::time::sleep(poll_interval).await;
                }
            }
        }
    }
}

/// Verdict of a monitor stage on one token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    /// The awaited condition holds; forward the token.
    Ready,
    /// Not yet; return the token to the input bucket for a later poll.
    Pending,
}

/// A stage that watches tokens for an external condition instead of
/// transforming them.
pub trait MonitorStage {
    fn name(&self) -> &str;

    /// Decides whether the token's awaited condition has been met. An `Err`
    /// means the token is in a state the monitor cannot account for.
    fn assess(&self, token: &Token) -> impl std::future::Future<Output = Result<Readiness>> + Send;
}

/// Drives a [`MonitorStage`] over one Pipe.
///
/// Unlike `FilterDriver`, a monitor pass snapshots all waiting barcodes up
/// front and attempts each exactly once. Pending tokens are put back into
/// the same input bucket, so looping immediately on a non-idle pass would
/// busy-spin on the same not-yet-ready tokens; the driver always sleeps
/// between passes instead.
pub struct MonitorDriver<S: MonitorStage> {
    pipe: Pipe,
    stage: S,
}

impl<S: MonitorStage + Sync> MonitorDriver<S> {
    pub fn new(pipe: Pipe, stage: S) -> Self {
        Self { pipe, stage }
    }

    pub fn pipe(&self) -> &Pipe {
        &self.pipe
    }

    /// Attempts every barcode that was waiting when the pass started.
    ///
    /// Returns the number of tokens forwarded.
    pub async fn run_pass(&mut self) -> Result<usize> {
        let snapshot = self.pipe.waiting_barcodes()?;
        let mut forwarded = 0;

        for barcode in snapshot {
            // Another pass (or an operator) may have removed it since the snapshot.
            let Some(mut token) = self.pipe.take_named(&barcode)? else {
                continue;
            };

            match self.stage.assess(&token).await {
                Ok(Readiness::Ready) => {
                    token.append_log(Some(self.stage.name()), LogLevel::Info, "condition met");
                    self.pipe.put(&token, false)?;
                    forwarded += 1;
                }
                Ok(Readiness::Pending) => {
                    tracing::debug!(
                        "monitor {}: token {} still pending",
                        self.stage.name(),
                        barcode
                    );
                    self.pipe.put_back(&token, false)?;
                }
                Err(e) => {
                    token.append_log(Some(self.stage.name()), LogLevel::Error, format!("{e:#}"));
                    self.pipe.put(&token, true)?;
                    tracing::error!(
                        "monitor {} errored on token {}: {e:#}",
                        self.stage.name(),
                        barcode
                    );
                }
            }
        }

        Ok(forwarded)
    }

    /// Loops `run_pass` with a sleep between every pass.
    pub async fn run_forever(&mut self, poll_interval: Duration) {
        tracing::info!(
            "monitor {} polling {}",
            self.stage.name(),
            self.pipe.input().display()
        );
        loop {
            if let Err(e) = self.run_pass().await {
                tracing::error!("monitor {} pass failed: {e:#}", self.stage.name());
            }
            tokio::time::sleep(poll_interval).await;
        }
    }
}
