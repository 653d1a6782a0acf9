//! Loader self-update
//!
//! Compares the installed loader against the newest GitHub release on the
//! configured channel and replaces the `PluginLoader` binary when the remote
//! is newer. Every failure is logged and folded into the returned
//! [`UpdateResult`]; nothing is propagated to the caller.

use anyhow::{Context, Result};
use std::path::Path;
use tracing::{debug, error, info, warn};

use crate::channel::{read_loader_channel, UpdateChannel};
use crate::github_releases::{select_release, GitHubClient, GitHubRelease};
use crate::paths::DeckyPaths;
use crate::update_state::UpdateResult;
use crate::version::Version;

pub const LOADER_ASSET_NAME: &str = "PluginLoader";

pub struct LoaderUpdater {
    client: GitHubClient,
    paths: DeckyPaths,
}

impl LoaderUpdater {
    pub fn new(client: GitHubClient, paths: DeckyPaths) -> Self {
        Self { client, paths }
    }

    pub async fn update_decky_loader(&self) -> UpdateResult {
        let (latest_version, release) = self.available_version().await;
        info!("Latest Decky Loader version: {}", latest_version);
        let current_version = self.current_version();
        info!("Current Decky Loader version: {}", current_version);

        let release = match release {
            Some(release) if latest_version > current_version => release,
            _ => {
                debug!("Decky Loader does not need an update");
                return UpdateResult::NotUpdated;
            }
        };

        info!("Updating Decky Loader to {}", release.tag_name);
        match self.install(&release).await {
            Ok(()) => {
                info!("Decky Loader updated to {}, restart pending", release.tag_name);
                UpdateResult::Updated
            }
            Err(e) => {
                error!("Failed to update Decky Loader: {:#}", e);
                UpdateResult::Failed
            }
        }
    }

    pub fn channel(&self) -> UpdateChannel {
        read_loader_channel(&self.paths.loader_config())
    }

    /// Installed version, or [`Version::ZERO`] when it cannot be determined
    pub fn current_version(&self) -> Version {
        let path = self.paths.loader_version_file();
        match std::fs::read_to_string(&path) {
            Ok(raw) => Version::parse_or_zero(Some(raw.trim())),
            Err(e) => {
                warn!("Failed to read {}: {}", path.display(), e);
                Version::ZERO
            }
        }
    }

    /// Newest release on the configured channel with its parsed version.
    /// Falls back to ([`Version::ZERO`], `None`) on any failure.
    pub async fn available_version(&self) -> (Version, Option<GitHubRelease>) {
        let channel = self.channel();

        let releases = match self.client.get_releases().await {
            Ok(releases) => releases,
            Err(e) => {
                warn!("Failed to fetch Decky Loader releases: {:#}", e);
                return (Version::ZERO, None);
            }
        };

        let Some(release) = select_release(&releases, channel) else {
            warn!("No {} Decky Loader release found", channel);
            return (Version::ZERO, None);
        };

        match Version::parse(&release.tag_name) {
            Ok(version) => (version, Some(release.clone())),
            Err(e) => {
                warn!("Unusable release tag: {}", e);
                (Version::ZERO, None)
            }
        }
    }

    async fn install(&self, release: &GitHubRelease) -> Result<()> {
        let asset = release.find_asset(LOADER_ASSET_NAME).with_context(|| {
            format!(
                "Release {} has no {} asset",
                release.tag_name, LOADER_ASSET_NAME
            )
        })?;

        let bytes = self.client.download_asset(asset).await?;
        if bytes.is_empty() {
            anyhow::bail!("Downloaded {} is empty", asset.name);
        }

        let binary = self.paths.loader_binary();
        write_executable(&binary, &bytes).await?;
        info!("Wrote {} bytes to {}", bytes.len(), binary.display());

        // The binary is already in place; a stale version file only means the
        // next check reinstalls the same release
        let version_file = self.paths.loader_version_file();
        if let Err(e) = tokio::fs::write(&version_file, format!("{}\n", release.tag_name)).await {
            warn!(
                "Installed {} but failed to record it in {}: {}",
                release.tag_name,
                version_file.display(),
                e
            );
        }

        Ok(())
    }
}

/// Replace `dest` through a temp file so a failed write never leaves a
/// truncated binary behind
async fn write_executable(dest: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    let tmp = dest.with_extension("new");
    tokio::fs::write(&tmp, bytes)
        .await
        .with_context(|| format!("Failed to write {}", tmp.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(&tmp, std::fs::Permissions::from_mode(0o755))
            .await
            .context("Failed to make loader executable")?;
    }

    tokio::fs::rename(&tmp, dest)
        .await
        .with_context(|| format!("Failed to replace {}", dest.display()))?;

    Ok(())
}
