// GitHub Releases API Client
//
// Fetches the loader's release list and downloads release assets

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::channel::UpdateChannel;

pub const GITHUB_API_URL: &str = "https://api.github.com";
pub const LOADER_REPO_OWNER: &str = "SteamDeckHomebrew";
pub const LOADER_REPO_NAME: &str = "decky-loader";

const API_TIMEOUT: Duration = Duration::from_secs(10);
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(300);

/// GitHub release information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubRelease {
    pub tag_name: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub prerelease: bool,
    #[serde(default)]
    pub published_at: Option<String>,
    #[serde(default)]
    pub assets: Vec<GitHubAsset>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubAsset {
    pub name: String,
    pub browser_download_url: String,
    #[serde(default)]
    pub size: u64,
}

impl GitHubRelease {
    /// Find asset by exact name
    pub fn find_asset(&self, name: &str) -> Option<&GitHubAsset> {
        self.assets.iter().find(|a| a.name == name)
    }
}

/// Newest release on `channel`; the API lists releases newest first
pub fn select_release(releases: &[GitHubRelease], channel: UpdateChannel) -> Option<&GitHubRelease> {
    releases
        .iter()
        .find(|release| channel == UpdateChannel::PreRelease || !release.prerelease)
}

/// GitHub API client
#[derive(Debug, Clone)]
pub struct GitHubClient {
    http: reqwest::Client,
    base_url: String,
    repo_owner: String,
    repo_name: String,
}

impl GitHubClient {
    /// Create new GitHub client
    pub fn new(repo_owner: impl Into<String>, repo_name: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(format!("autoupdated/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            http,
            base_url: GITHUB_API_URL.to_string(),
            repo_owner: repo_owner.into(),
            repo_name: repo_name.into(),
        })
    }

    /// Client for the loader repository
    pub fn for_loader() -> Result<Self> {
        Self::new(LOADER_REPO_OWNER, LOADER_REPO_NAME)
    }

    /// Point the client at another API root (mirrors, tests)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Get all releases (including prereleases), newest first
    pub async fn get_releases(&self) -> Result<Vec<GitHubRelease>> {
        let url = format!(
            "{}/repos/{}/{}/releases",
            self.base_url, self.repo_owner, self.repo_name
        );

        let response = self
            .http
            .get(&url)
            .header("Accept", "application/vnd.github.v3+json")
            .timeout(API_TIMEOUT)
            .send()
            .await
            .context("Failed to fetch releases from GitHub")?;

        if !response.status().is_success() {
            anyhow::bail!("GitHub API returned error: {}", response.status());
        }

        let releases: Vec<GitHubRelease> = response
            .json()
            .await
            .context("Failed to parse GitHub releases JSON")?;

        Ok(releases)
    }

    /// Download asset into memory
    pub async fn download_asset(&self, asset: &GitHubAsset) -> Result<Vec<u8>> {
        let response = self
            .http
            .get(&asset.browser_download_url)
            .timeout(DOWNLOAD_TIMEOUT)
            .send()
            .await
            .context("Failed to download asset")?;

        if !response.status().is_success() {
            anyhow::bail!("Download failed: {}", response.status());
        }

        let bytes = response
            .bytes()
            .await
            .context("Failed to read download bytes")?;

        Ok(bytes.to_vec())
    }
}
