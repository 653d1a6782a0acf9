//! OS update through rpm-ostree
//!
//! Refreshes the cached update metadata, compares the default deployment
//! against `cached-update` from `rpm-ostree status --json`, and stages the
//! upgrade only when the cached update is newer.

use serde::Deserialize;
use std::future::Future;
use std::io;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::error::{AutoUpdateError, Result};
use crate::update_state::UpdateResult;
use crate::version::Version;

const RPM_OSTREE: &str = "rpm-ostree";

/// `rpm-ostree upgrade --check` exit status when nothing is available
const NO_UPDATE_EXIT: i32 = 77;

const STATUS_TIMEOUT: Duration = Duration::from_secs(120);
const UPGRADE_TIMEOUT: Duration = Duration::from_secs(60 * 60);

/// Captured result of a finished subprocess
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, `None` when killed by a signal
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }
}

/// Runs external programs; replaced by a scripted runner in tests
pub trait CommandRunner: Send + Sync {
    fn run(
        &self,
        program: &str,
        args: &[&str],
        timeout: Duration,
    ) -> impl Future<Output = io::Result<CommandOutput>> + Send;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    async fn run(&self, program: &str, args: &[&str], timeout: Duration) -> io::Result<CommandOutput> {
        debug!("Running {} {}", program, args.join(" "));

        let mut command = tokio::process::Command::new(program);
        command.args(args).kill_on_drop(true);

        let output = tokio::time::timeout(timeout, command.output())
            .await
            .map_err(|_| {
                io::Error::new(
                    io::ErrorKind::TimedOut,
                    format!("{} timed out after {}s", program, timeout.as_secs()),
                )
            })??;

        Ok(CommandOutput {
            status: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct RpmOstreeStatus {
    #[serde(default)]
    deployments: Vec<Deployment>,
    #[serde(rename = "cached-update", default)]
    cached_update: Option<CachedUpdate>,
}

#[derive(Debug, Deserialize)]
struct Deployment {
    #[serde(default)]
    version: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CachedUpdate {
    #[serde(default)]
    version: Option<String>,
}

pub struct RpmOstree<R = SystemRunner> {
    runner: R,
    program: String,
    status_timeout: Duration,
    upgrade_timeout: Duration,
}

impl Default for RpmOstree<SystemRunner> {
    fn default() -> Self {
        Self::with_runner(SystemRunner)
    }
}

impl<R: CommandRunner> RpmOstree<R> {
    pub fn with_runner(runner: R) -> Self {
        Self {
            runner,
            program: RPM_OSTREE.to_string(),
            status_timeout: STATUS_TIMEOUT,
            upgrade_timeout: UPGRADE_TIMEOUT,
        }
    }

    /// Run another executable in place of `rpm-ostree` from `PATH`
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    pub fn with_timeouts(mut self, status_timeout: Duration, upgrade_timeout: Duration) -> Self {
        self.status_timeout = status_timeout;
        self.upgrade_timeout = upgrade_timeout;
        self
    }

    pub async fn rpm_ostree_update(&self) -> UpdateResult {
        self.refresh_update_metadata().await;

        let (current_version, available_version) = self.versions().await;
        info!("Current OS version: {}", current_version);
        info!("Available OS version: {}", available_version);

        if available_version <= current_version {
            debug!("OS does not need an update");
            return UpdateResult::NotUpdated;
        }

        info!("Staging OS update {}", available_version);
        match self
            .runner
            .run(&self.program, &["upgrade"], self.upgrade_timeout)
            .await
        {
            Ok(output) if output.success() => {
                info!("OS update staged, reboot pending");
                UpdateResult::Updated
            }
            Ok(output) => {
                error!(
                    "rpm-ostree upgrade exited with {:?}: {}",
                    output.status,
                    output.stderr.trim()
                );
                UpdateResult::Failed
            }
            Err(e) => {
                error!("Failed to run rpm-ostree upgrade: {}", e);
                UpdateResult::Failed
            }
        }
    }

    /// (default deployment, cached update) versions; `ZERO` for anything
    /// that cannot be read
    pub async fn versions(&self) -> (Version, Version) {
        match self.status().await {
            Ok(status) => {
                let current = status.deployments.first().and_then(|d| d.version.as_deref());
                let available = status.cached_update.as_ref().and_then(|u| u.version.as_deref());
                (
                    Version::parse_or_zero(current),
                    Version::parse_or_zero(available),
                )
            }
            Err(e) => {
                warn!("Failed to read rpm-ostree status: {}", e);
                (Version::ZERO, Version::ZERO)
            }
        }
    }

    async fn refresh_update_metadata(&self) {
        match self
            .runner
            .run(&self.program, &["upgrade", "--check"], self.status_timeout)
            .await
        {
            Ok(output) if output.success() => debug!("rpm-ostree reports an available update"),
            Ok(output) if output.status == Some(NO_UPDATE_EXIT) => {
                debug!("rpm-ostree reports no available update")
            }
            Ok(output) => warn!(
                "rpm-ostree upgrade --check exited with {:?}: {}",
                output.status,
                output.stderr.trim()
            ),
            Err(e) => warn!("Failed to run rpm-ostree upgrade --check: {}", e),
        }
    }

    async fn status(&self) -> Result<RpmOstreeStatus> {
        let output = self
            .runner
            .run(&self.program, &["status", "--json"], self.status_timeout)
            .await?;

        if !output.success() {
            return Err(AutoUpdateError::Command(format!(
                "rpm-ostree status exited with {:?}: {}",
                output.status,
                output.stderr.trim()
            )));
        }

        Ok(serde_json::from_str(&output.stdout)?)
    }
}
