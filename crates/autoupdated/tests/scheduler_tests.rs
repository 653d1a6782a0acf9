//! Scheduled checks, the scheduler loop and update bookkeeping in PluginState

use autoupdate_common::config::PluginConfig;
use autoupdate_common::github_releases::GitHubClient;
use autoupdate_common::loader_update::LoaderUpdater;
use autoupdate_common::power::BatteryReader;
use autoupdate_common::rpm_ostree::RpmOstree;
use autoupdate_common::{DeckyPaths, RestartAction, UpdateResult, UpdateStatus};
use autoupdated::scheduler::{run_scheduled_check, run_scheduler};
use autoupdated::state::{PluginState, SharedState};
use serde_json::json;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::watch;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const RELEASES_PATH: &str = "/repos/SteamDeckHomebrew/decky-loader/releases";
const DOWNLOAD_PATH: &str = "/download/PluginLoader";

/// Every-second schedule so loop tests do not wait long
const EVERY_SECOND: &str = "* * * * * *";

struct Fixture {
    _root: TempDir,
    server: MockServer,
    state: SharedState,
}

impl Fixture {
    /// `battery`: (capacity, status) of BAT0; `rpm_ostree`: fake executable
    async fn new(battery: Option<(&str, &str)>, rpm_ostree: Option<&str>) -> Self {
        let root = TempDir::new().unwrap();
        let paths = DeckyPaths::under(&root.path().join("homebrew"));
        fs::create_dir_all(paths.services_dir()).unwrap();
        fs::write(paths.loader_version_file(), "v3.0.4\n").unwrap();

        let sysfs = root.path().join("power_supply");
        fs::create_dir_all(&sysfs).unwrap();
        if let Some((capacity, status)) = battery {
            let bat = sysfs.join("BAT0");
            fs::create_dir_all(&bat).unwrap();
            fs::write(bat.join("capacity"), capacity).unwrap();
            fs::write(bat.join("status"), status).unwrap();
        }

        let mut os_updater = RpmOstree::default();
        if let Some(script) = rpm_ostree {
            os_updater = os_updater.with_program(write_script(&root, script).to_string_lossy());
        }

        let server = MockServer::start().await;
        let client = GitHubClient::for_loader()
            .unwrap()
            .with_base_url(server.uri());

        let state = PluginState::new(
            paths.clone(),
            PluginConfig::load(&paths),
            BatteryReader::new(&sysfs),
            LoaderUpdater::new(client, paths),
            os_updater,
        )
        .into_shared();

        Self {
            _root: root,
            server,
            state,
        }
    }

    /// v3.0.5 available, answered after `delay`
    async fn serve_newer_release(&self, delay: Duration, expected_calls: impl Into<wiremock::Times>) {
        let releases = json!([{
            "tag_name": "v3.0.5",
            "prerelease": false,
            "assets": [{
                "name": "PluginLoader",
                "browser_download_url": format!("{}{}", self.server.uri(), DOWNLOAD_PATH)
            }]
        }]);
        Mock::given(method("GET"))
            .and(path(RELEASES_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(releases).set_delay(delay))
            .expect(expected_calls)
            .mount(&self.server)
            .await;
        Mock::given(method("GET"))
            .and(path(DOWNLOAD_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"\x7fELF loader".to_vec()))
            .mount(&self.server)
            .await;
    }

    async fn set_cron(&self, expr: &str) {
        self.state
            .config
            .write()
            .await
            .set_config("cron", json!(expr))
            .unwrap();
    }

    async fn github_requests(&self) -> usize {
        self.server
            .received_requests()
            .await
            .map(|requests| requests.len())
            .unwrap_or(0)
    }

    async fn pending_action(&self) -> RestartAction {
        self.state.restart.lock().await.pending_action()
    }

    fn spawn_scheduler(&self) -> (watch::Sender<bool>, tokio::task::JoinHandle<()>) {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(run_scheduler(SharedState::clone(&self.state), shutdown_rx));
        (shutdown_tx, task)
    }
}

fn write_script(root: &TempDir, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let bin = root.path().join("bin");
    fs::create_dir_all(&bin).unwrap();
    let script = bin.join("rpm-ostree");
    fs::write(&script, format!("#!/bin/sh\n{}\n", body)).unwrap();
    fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();
    script
}

async fn wait_until<F, Fut>(mut condition: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    for _ in 0..100 {
        if condition().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    false
}

#[tokio::test]
async fn test_scheduled_check_skips_when_battery_low() {
    let fx = Fixture::new(Some(("20", "Discharging")), None).await;
    fx.serve_newer_release(Duration::ZERO, 0u64).await;

    assert_eq!(run_scheduled_check(&fx.state).await, None);
    assert_eq!(fx.pending_action().await, RestartAction::None);
}

#[tokio::test]
async fn test_scheduled_check_runs_while_charging() {
    let fx = Fixture::new(Some(("20", "Charging")), None).await;
    fx.serve_newer_release(Duration::ZERO, 1u64).await;

    assert_eq!(run_scheduled_check(&fx.state).await, Some(UpdateResult::Updated));
}

#[tokio::test]
async fn test_scheduled_update_requests_client_restart() {
    let fx = Fixture::new(None, None).await;
    fx.serve_newer_release(Duration::ZERO, 1u64).await;

    assert_eq!(run_scheduled_check(&fx.state).await, Some(UpdateResult::Updated));

    let restart = fx.state.restart.lock().await;
    assert_eq!(restart.loader_status(), UpdateStatus::ClientRestartRequired);
    assert_eq!(restart.pending_action(), RestartAction::RestartClient);
}

#[tokio::test]
async fn test_concurrent_loader_update_is_skipped() {
    let fx = Fixture::new(None, None).await;
    fx.serve_newer_release(Duration::from_millis(300), 1u64).await;

    let (first, second) = tokio::join!(
        fx.state.run_loader_update(),
        fx.state.run_loader_update()
    );
    assert_eq!(first, UpdateResult::Updated);
    assert_eq!(second, UpdateResult::NotUpdated);
    assert_eq!(fx.pending_action().await, RestartAction::RestartClient);
}

#[tokio::test]
async fn test_os_update_requests_system_restart() {
    let script = r#"case "$*" in
  "upgrade --check") exit 0 ;;
  "status --json") echo '{"deployments": [{"version": "3.6.19"}], "cached-update": {"version": "3.6.20"}}' ;;
  "upgrade") exit 0 ;;
  *) exit 1 ;;
esac"#;
    let fx = Fixture::new(None, Some(script)).await;

    assert_eq!(fx.state.run_os_update().await, UpdateResult::Updated);
    assert_eq!(fx.pending_action().await, RestartAction::RestartSystem);

    // A pending loader restart never outranks a staged OS update
    fx.state
        .restart
        .lock()
        .await
        .set_loader_status(UpdateStatus::ClientRestartRequired);
    assert_eq!(fx.pending_action().await, RestartAction::RestartSystem);
}

#[tokio::test]
async fn test_failed_os_update_requests_nothing() {
    let script = r#"case "$*" in
  "upgrade --check") exit 0 ;;
  "status --json") echo '{"deployments": [{"version": "3.6.19"}], "cached-update": {"version": "3.6.20"}}' ;;
  *) exit 1 ;;
esac"#;
    let fx = Fixture::new(None, Some(script)).await;

    assert_eq!(fx.state.run_os_update().await, UpdateResult::Failed);
    assert_eq!(fx.pending_action().await, RestartAction::None);
}

#[tokio::test]
async fn test_scheduler_stops_on_shutdown() {
    let fx = Fixture::new(None, None).await;
    let (shutdown_tx, task) = fx.spawn_scheduler();

    shutdown_tx.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(2), task)
        .await
        .expect("scheduler did not stop")
        .unwrap();
}

#[tokio::test]
async fn test_scheduler_stops_when_shutdown_sender_dropped() {
    let fx = Fixture::new(None, None).await;
    let (shutdown_tx, task) = fx.spawn_scheduler();

    drop(shutdown_tx);
    tokio::time::timeout(Duration::from_secs(2), task)
        .await
        .expect("scheduler did not stop")
        .unwrap();
}

#[tokio::test]
async fn test_invalid_cron_waits_for_config_change() {
    let fx = Fixture::new(None, None).await;
    fx.serve_newer_release(Duration::ZERO, 1u64..).await;
    fx.set_cron("whenever you like").await;

    let fx = &fx;
    let (shutdown_tx, task) = fx.spawn_scheduler();
    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert_eq!(fx.github_requests().await, 0);

    fx.set_cron(EVERY_SECOND).await;
    assert!(
        wait_until(|| async move { fx.pending_action().await == RestartAction::RestartClient }).await,
        "rescheduled check never ran"
    );

    shutdown_tx.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(2), task)
        .await
        .expect("scheduler did not stop")
        .unwrap();
}

#[tokio::test]
async fn test_shutdown_interrupts_running_check() {
    let fx = Fixture::new(None, None).await;
    fx.serve_newer_release(Duration::from_secs(60), 1u64..).await;
    fx.set_cron(EVERY_SECOND).await;

    let fx = &fx;
    let (shutdown_tx, task) = fx.spawn_scheduler();
    assert!(
        wait_until(|| async move { fx.github_requests().await > 0 }).await,
        "scheduled check never started"
    );

    shutdown_tx.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(2), task)
        .await
        .expect("scheduler waited for the update check")
        .unwrap();
}
