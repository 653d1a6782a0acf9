//! Daemon state management.

use std::sync::Arc;

use anyhow::{Context, Result};
use autoupdate_common::config::PluginConfig;
use autoupdate_common::github_releases::GitHubClient;
use autoupdate_common::loader_update::LoaderUpdater;
use autoupdate_common::power::BatteryReader;
use autoupdate_common::rpm_ostree::RpmOstree;
use autoupdate_common::update_state::{ready_for_update, RestartCoordinator, UpdateStatus};
use autoupdate_common::{DeckyPaths, UpdateResult};
use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};

/// Everything a request handler or the scheduler needs, passed explicitly
pub struct PluginState {
    pub paths: DeckyPaths,
    pub config: RwLock<PluginConfig>,
    pub battery: BatteryReader,
    pub loader: LoaderUpdater,
    pub rpm_ostree: RpmOstree,
    pub restart: Mutex<RestartCoordinator>,
}

pub type SharedState = Arc<PluginState>;

impl PluginState {
    pub fn new(
        paths: DeckyPaths,
        config: PluginConfig,
        battery: BatteryReader,
        loader: LoaderUpdater,
        rpm_ostree: RpmOstree,
    ) -> Self {
        Self {
            paths,
            config: RwLock::new(config),
            battery,
            loader,
            rpm_ostree,
            restart: Mutex::new(RestartCoordinator::new()),
        }
    }

    /// Production wiring: real sysfs, GitHub and rpm-ostree
    pub fn from_paths(paths: DeckyPaths) -> Result<Self> {
        let config = PluginConfig::load(&paths);
        let client = GitHubClient::for_loader().context("Failed to create GitHub client")?;
        let loader = LoaderUpdater::new(client, paths.clone());

        Ok(Self::new(
            paths,
            config,
            BatteryReader::default(),
            loader,
            RpmOstree::default(),
        ))
    }

    pub fn into_shared(self) -> SharedState {
        Arc::new(self)
    }

    pub async fn ready_for_update(&self) -> bool {
        let min_battery = self.config.read().await.min_battery();
        let battery = self.battery.status();

        let ready = ready_for_update(battery.level, battery.charging, min_battery);
        if !ready {
            warn!(
                "Battery level low ({}% < {}%) and not charging",
                battery.level, min_battery
            );
        }
        ready
    }

    /// Run the loader update unless one is already running
    pub async fn run_loader_update(&self) -> UpdateResult {
        {
            let mut restart = self.restart.lock().await;
            if restart.loader_status() == UpdateStatus::InProgress {
                info!("A Decky Loader update is already in progress, skipping");
                return UpdateResult::NotUpdated;
            }
            restart.set_loader_status(UpdateStatus::InProgress);
        }

        let result = self.loader.update_decky_loader().await;
        self.restart.lock().await.record_loader_result(result);
        result
    }

    pub async fn run_os_update(&self) -> UpdateResult {
        let result = self.rpm_ostree.rpm_ostree_update().await;
        self.restart.lock().await.record_os_result(result);
        result
    }
}
