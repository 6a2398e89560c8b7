//! Orchestrator Module
//!
//! Launches and supervises one OS process per configured filter stage.
//!
//! ## Responsibilities
//! - **Launching**: each filter from the configuration is spawned as a child
//!   of the current executable running the `run-stage` subcommand, with the
//!   filter's extra environment variables applied.
//! - **Shutdown**: SIGTERM first, a bounded wait, then SIGKILL for children
//!   that will not go quietly.
//! - **Status**: reports which children are still running and the exit codes
//!   of those that stopped.
//!
//! Fault isolation is the point of the process-per-stage layout: a panic or
//! leak in one stage cannot take the others down.


use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use tokio::process::{Child, Command};

use crate::config::{load_config, FilterConfig, PipelineConfig};
use crate::pipeline::Pipeline;

/// One supervised filter child process.
pub struct StageProcess {
    name: String,
    child: Child,
}

impl StageProcess {
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Status of one supervised child at a point in time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageStatus {
    Running,
    Exited(Option<i32>),
}

impl std::fmt::Display for StageStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StageStatus::Running => write!(f, "running"),
            StageStatus::Exited(Some(code)) => write!(f, "exited ({code})"),
            StageStatus::Exited(None) => write!(f, "exited (signal)"),
        }
    }
}

/// Supervises the filter processes that make up the pipeline.
pub struct Orchestrator {
    config: PipelineConfig,
    config_path: PathBuf,
    pipeline: Pipeline,
    processes: Vec<StageProcess>,
}

impl Orchestrator {
    pub fn new(config: PipelineConfig, config_path: impl Into<PathBuf>) -> Self {
        let pipeline = Pipeline::from_config(&config);
        Self {
            config,
            config_path: config_path.into(),
            pipeline,
            processes: Vec::new(),
        }
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// Starts every filter from the configuration.
    pub fn start_filters(&mut self) -> Result<()> {
        let filters = self.config.filters.clone();
        for filter in &filters {
            self.start_filter(filter)?;
        }
        Ok(())
    }

    /// Spawns one filter as a child process.
    ///
    /// The child re-executes the current binary with the `run-stage`
    /// subcommand and resolves its own stage, buckets and collaborators from
    /// the shared configuration file.
    pub fn start_filter(&mut self, filter: &FilterConfig) -> Result<()> {
        // Fail fast on a bad pipe rather than leaving it to the child.
        self.pipeline.bucket(&filter.pipe.input)?;
        self.pipeline.bucket(&filter.pipe.output)?;

        let exe = std::env::current_exe().context("failed to resolve current executable")?;
        let mut command = Command::new(exe);
        command
            .arg("run-stage")
            .arg("--config")
            .arg(&self.config_path)
            .arg("--name")
            .arg(&filter.name)
            .envs(&filter.env)
            .kill_on_drop(true);

        tracing::info!("starting filter '{}' (stage {})", filter.name, filter.stage);
        let child = command
            .spawn()
            .with_context(|| format!("failed to spawn filter '{}'", filter.name))?;

        self.processes.push(StageProcess {
            name: filter.name.clone(),
            child,
        });
        Ok(())
    }

    /// Stops every child: SIGTERM, wait up to five seconds, then SIGKILL.
    pub async fn stop_all(&mut self) -> Result<()> {
        for process in &mut self.processes {
            tracing::info!("stopping filter '{}'", process.name);

            if let Some(pid) = process.child.id() {
                if let Err(e) = kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
                    tracing::warn!("SIGTERM to '{}' failed: {e}", process.name);
                }
            }

            match tokio::time::timeout(Duration::from_secs(5), process.child.wait()).await {
                Ok(status) => {
                    let status = status
                        .with_context(|| format!("failed to reap filter '{}'", process.name))?;
                    tracing::info!("filter '{}' exited: {status}", process.name);
                }
                Err(_) => {
                    tracing::warn!("filter '{}' ignored SIGTERM, killing", process.name);
                    process
                        .child
                        .kill()
                        .await
                        .with_context(|| format!("failed to kill filter '{}'", process.name))?;
                }
            }
        }
        self.processes.clear();
        Ok(())
    }

    /// Reports each supervised child's current state without blocking.
    pub fn status(&mut self) -> Result<Vec<(String, StageStatus)>> {
        let mut report = Vec::with_capacity(self.processes.len());
        for process in &mut self.processes {
            let status = match process.child.try_wait().with_context(|| {
                format!("failed to poll filter '{}'", process.name)
            })? {
                None => StageStatus::Running,
                Some(exit) => StageStatus::Exited(exit.code()),
            };
            report.push((process.name.clone(), status));
        }
        Ok(report)
    }

    /// Stops everything, re-reads the configuration file and starts again.
    pub async fn reload(&mut self) -> Result<()> {
        tracing::info!("reloading configuration from {}", self.config_path.display());
        self.stop_all().await?;
        self.config = load_config(&self.config_path)?;
        self.pipeline = Pipeline::from_config(&self.config);
        self.start_filters()
    }

    /// Runs until SIGTERM or Ctrl-C, then shuts the children down.
    pub async fn run(&mut self) -> Result<()> {
        self.start_filters()?;

        let mut sigterm =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .context("failed to install SIGTERM handler")?;
        tokio::select! {
            _ = tokio::signal::ctrl_c() => tracing::info!("interrupt received"),
            _ = sigterm.recv() => tracing::info!("SIGTERM received"),
        }

        self.stop_all().await
    }
}
