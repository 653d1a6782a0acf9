//! Update outcomes and restart coordination
//!
//! `UpdateResult` is what a single update routine reports. `UpdateStatus`
//! tracks where the loader and Steam are in their update cycle so the
//! front-end knows whether a client or system restart is due.

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info};

/// Outcome of one update routine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateResult {
    Failed,
    Updated,
    NotUpdated,
}

impl UpdateResult {
    /// Numeric form used by the front-end callables
    pub fn code(self) -> i32 {
        match self {
            Self::NotUpdated => 0,
            Self::Updated => 1,
            Self::Failed => 2,
        }
    }
}

impl fmt::Display for UpdateResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Failed => write!(f, "failed"),
            Self::Updated => write!(f, "updated"),
            Self::NotUpdated => write!(f, "not updated"),
        }
    }
}

/// Update cycle state of one component
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateStatus {
    #[default]
    UpToDate,
    InProgress,
    ClientRestartRequired,
    OsRestartRequired,
}

impl UpdateStatus {
    pub fn requires_restart(self) -> bool {
        matches!(self, Self::ClientRestartRequired | Self::OsRestartRequired)
    }
}

/// Restart the front-end should perform now
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RestartAction {
    None,
    RestartClient,
    RestartSystem,
}

/// Combines loader and Steam update states into a single restart decision
#[derive(Debug, Default)]
pub struct RestartCoordinator {
    loader: UpdateStatus,
    steam: UpdateStatus,
    /// An installed loader waits for a client restart until this process
    /// is replaced
    loader_installed: bool,
}

impl RestartCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn loader_status(&self) -> UpdateStatus {
        self.loader
    }

    pub fn steam_status(&self) -> UpdateStatus {
        self.steam
    }

    pub fn set_loader_status(&mut self, status: UpdateStatus) {
        debug!("Loader update status: {:?} -> {:?}", self.loader, status);
        self.loader = status;
    }

    /// A pending Steam restart is never cleared by a later "up to date"
    pub fn set_steam_status(&mut self, status: UpdateStatus) {
        if self.steam.requires_restart() && status == UpdateStatus::UpToDate {
            debug!("Keeping pending Steam status {:?}", self.steam);
            return;
        }
        debug!("Steam update status: {:?} -> {:?}", self.steam, status);
        self.steam = status;
    }

    /// Record the outcome of a loader update run
    pub fn record_loader_result(&mut self, result: UpdateResult) {
        if result == UpdateResult::Updated {
            self.loader_installed = true;
        }
        let status = if self.loader_installed {
            UpdateStatus::ClientRestartRequired
        } else {
            UpdateStatus::UpToDate
        };
        self.set_loader_status(status);
    }

    /// Record the outcome of an OS update run
    pub fn record_os_result(&mut self, result: UpdateResult) {
        if result == UpdateResult::Updated {
            info!("OS update staged, system restart required");
            self.steam = UpdateStatus::OsRestartRequired;
        }
    }

    pub fn pending_action(&self) -> RestartAction {
        let statuses = [self.loader, self.steam];

        if statuses.contains(&UpdateStatus::InProgress) {
            RestartAction::None
        } else if statuses.contains(&UpdateStatus::OsRestartRequired) {
            RestartAction::RestartSystem
        } else if statuses.contains(&UpdateStatus::ClientRestartRequired) {
            RestartAction::RestartClient
        } else {
            RestartAction::None
        }
    }
}

/// Updates may run when the battery is above the threshold or charging
pub fn ready_for_update(level: u8, charging: bool, min_battery: u8) -> bool {
    level >= min_battery || charging
}
