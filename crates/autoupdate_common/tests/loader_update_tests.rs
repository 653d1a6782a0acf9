//! Loader update decision tests against a mocked GitHub API

use autoupdate_common::github_releases::GitHubClient;
use autoupdate_common::loader_update::LoaderUpdater;
use autoupdate_common::{DeckyPaths, UpdateChannel, UpdateResult, Version};
use serde_json::{json, Value};
use std::fs;
use tempfile::TempDir;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const RELEASES_PATH: &str = "/repos/SteamDeckHomebrew/decky-loader/releases";
const DOWNLOAD_PATH: &str = "/download/PluginLoader";

struct Fixture {
    _root: TempDir,
    paths: DeckyPaths,
    server: MockServer,
}

impl Fixture {
    async fn new(installed: Option<&str>, branch: Option<i64>) -> Self {
        let root = TempDir::new().unwrap();
        let paths = DeckyPaths::under(root.path());

        fs::create_dir_all(&paths.settings_dir).unwrap();
        fs::create_dir_all(paths.services_dir()).unwrap();
        if let Some(version) = installed {
            fs::write(paths.loader_version_file(), format!("{}\n", version)).unwrap();
        }
        if let Some(branch) = branch {
            fs::write(paths.loader_config(), json!({ "branch": branch }).to_string()).unwrap();
        }

        Self {
            _root: root,
            paths,
            server: MockServer::start().await,
        }
    }

    fn release(&self, tag: &str, prerelease: bool) -> Value {
        json!({
            "tag_name": tag,
            "prerelease": prerelease,
            "assets": [
                {"name": "PluginLoader.exe", "browser_download_url": format!("{}/download/PluginLoader.exe", self.server.uri())},
                {"name": "PluginLoader", "browser_download_url": format!("{}{}", self.server.uri(), DOWNLOAD_PATH), "size": 12}
            ]
        })
    }

    async fn serve_releases(&self, releases: Value) {
        Mock::given(method("GET"))
            .and(path(RELEASES_PATH))
            .and(header("Accept", "application/vnd.github.v3+json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(releases))
            .mount(&self.server)
            .await;
    }

    async fn serve_binary(&self, expected_calls: u64) {
        Mock::given(method("GET"))
            .and(path(DOWNLOAD_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"\x7fELF loader".to_vec()))
            .expect(expected_calls)
            .mount(&self.server)
            .await;
    }

    fn updater(&self) -> LoaderUpdater {
        let client = GitHubClient::for_loader()
            .unwrap()
            .with_base_url(self.server.uri());
        LoaderUpdater::new(client, self.paths.clone())
    }

    fn installed_binary(&self) -> Option<Vec<u8>> {
        fs::read(self.paths.loader_binary()).ok()
    }
}

#[tokio::test]
async fn test_newer_stable_release_is_installed() {
    let fx = Fixture::new(Some("v3.0.4"), Some(0)).await;
    fx.serve_releases(json!([fx.release("v3.0.5", false), fx.release("v3.0.4", false)]))
        .await;
    fx.serve_binary(1).await;

    let updater = fx.updater();
    assert_eq!(updater.update_decky_loader().await, UpdateResult::Updated);
    assert_eq!(fx.installed_binary().unwrap(), b"\x7fELF loader");
    assert_eq!(updater.current_version(), Version::parse("3.0.5").unwrap());
}

#[tokio::test]
async fn test_second_run_after_update_is_noop() {
    let fx = Fixture::new(Some("v3.0.4"), None).await;
    fx.serve_releases(json!([fx.release("v3.0.5", false)])).await;
    fx.serve_binary(1).await;

    let updater = fx.updater();
    assert_eq!(updater.update_decky_loader().await, UpdateResult::Updated);
    assert_eq!(updater.update_decky_loader().await, UpdateResult::NotUpdated);
}

#[tokio::test]
async fn test_update_iff_remote_newer() {
    let cases = [
        ("v3.0.5", "v3.0.5", false),
        ("v3.0.5", "v3.0.4", false),
        ("v3.0.5", "v3.0.5-pre3", false),
        ("v3.0.5-pre3", "v3.0.5", true),
        ("v2.10.14", "v3.0.0", true),
        ("v3.0.0", "v3.0.0.post1", true),
    ];

    for (installed, remote, expect_update) in cases {
        let fx = Fixture::new(Some(installed), Some(1)).await;
        fx.serve_releases(json!([fx.release(remote, true)])).await;
        fx.serve_binary(if expect_update { 1 } else { 0 }).await;

        let expected = if expect_update {
            UpdateResult::Updated
        } else {
            UpdateResult::NotUpdated
        };
        assert_eq!(
            fx.updater().update_decky_loader().await,
            expected,
            "installed {} remote {}",
            installed,
            remote
        );
        assert_eq!(fx.installed_binary().is_some(), expect_update);
    }
}

#[tokio::test]
async fn test_stable_channel_ignores_newer_prerelease() {
    let fx = Fixture::new(Some("v3.0.5"), Some(0)).await;
    fx.serve_releases(json!([fx.release("v3.1.0-pre1", true), fx.release("v3.0.5", false)]))
        .await;
    fx.serve_binary(0).await;

    let updater = fx.updater();
    assert_eq!(updater.channel(), UpdateChannel::Stable);
    assert_eq!(updater.update_decky_loader().await, UpdateResult::NotUpdated);
}

#[tokio::test]
async fn test_pre_release_channel_takes_newest() {
    let fx = Fixture::new(Some("v3.0.5"), Some(1)).await;
    fx.serve_releases(json!([fx.release("v3.1.0-pre1", true), fx.release("v3.0.5", false)]))
        .await;
    fx.serve_binary(1).await;

    let updater = fx.updater();
    assert_eq!(updater.channel(), UpdateChannel::PreRelease);
    assert_eq!(updater.update_decky_loader().await, UpdateResult::Updated);
}

#[tokio::test]
async fn test_missing_loader_config_uses_stable() {
    let fx = Fixture::new(Some("v3.0.5"), None).await;
    fx.serve_releases(json!([fx.release("v3.1.0-pre1", true)])).await;
    fx.serve_binary(0).await;

    assert_eq!(fx.updater().update_decky_loader().await, UpdateResult::NotUpdated);
}

#[tokio::test]
async fn test_api_error_is_not_an_update() {
    let fx = Fixture::new(Some("v3.0.4"), None).await;
    Mock::given(method("GET"))
        .and(path(RELEASES_PATH))
        .respond_with(ResponseTemplate::new(500))
        .mount(&fx.server)
        .await;
    fx.serve_binary(0).await;

    let updater = fx.updater();
    let (version, release) = updater.available_version().await;
    assert!(version.is_zero());
    assert!(release.is_none());
    assert_eq!(updater.update_decky_loader().await, UpdateResult::NotUpdated);
}

#[tokio::test]
async fn test_unparseable_tag_is_not_an_update() {
    // Nothing installed either: both sides are ZERO
    let fx = Fixture::new(None, None).await;
    fx.serve_releases(json!([fx.release("nightly", false)])).await;
    fx.serve_binary(0).await;

    assert_eq!(fx.updater().update_decky_loader().await, UpdateResult::NotUpdated);
}

#[tokio::test]
async fn test_unknown_installed_version_updates() {
    let fx = Fixture::new(None, None).await;
    fx.serve_releases(json!([fx.release("v3.0.5", false)])).await;
    fx.serve_binary(1).await;

    assert_eq!(fx.updater().update_decky_loader().await, UpdateResult::Updated);
}

#[tokio::test]
async fn test_missing_asset_fails() {
    let fx = Fixture::new(Some("v3.0.4"), None).await;
    fx.serve_releases(json!([{ "tag_name": "v3.0.5", "prerelease": false, "assets": [] }]))
        .await;

    assert_eq!(fx.updater().update_decky_loader().await, UpdateResult::Failed);
    assert!(fx.installed_binary().is_none());
}

#[tokio::test]
async fn test_download_error_fails() {
    let fx = Fixture::new(Some("v3.0.4"), None).await;
    fx.serve_releases(json!([fx.release("v3.0.5", false)])).await;
    Mock::given(method("GET"))
        .and(path(DOWNLOAD_PATH))
        .respond_with(ResponseTemplate::new(404))
        .mount(&fx.server)
        .await;

    let updater = fx.updater();
    assert_eq!(updater.update_decky_loader().await, UpdateResult::Failed);
    assert!(fx.installed_binary().is_none());
    assert_eq!(updater.current_version(), Version::parse("3.0.4").unwrap());
}

#[tokio::test]
async fn test_unwritable_version_file_still_reports_update() {
    let fx = Fixture::new(None, None).await;
    fs::create_dir_all(fx.paths.loader_version_file()).unwrap();
    fx.serve_releases(json!([fx.release("v3.0.5", false)])).await;
    fx.serve_binary(1).await;

    assert_eq!(fx.updater().update_decky_loader().await, UpdateResult::Updated);
    assert_eq!(fx.installed_binary().unwrap(), b"\x7fELF loader");
}
