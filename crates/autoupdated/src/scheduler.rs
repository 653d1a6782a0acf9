//! Cron-driven loader update checks
//!
//! The schedule lives in the `cron` config key and is re-read whenever the
//! config changes. Standard five-field expressions are accepted alongside the
//! six/seven-field form with seconds.

use anyhow::{Context, Result};
use autoupdate_common::UpdateResult;
use chrono::{DateTime, Local};
use cron::Schedule;
use std::str::FromStr;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info};

use crate::state::SharedState;

/// Prepend a zero seconds field to five-field expressions
pub fn normalize_cron(expr: &str) -> String {
    let expr = expr.trim();
    if expr.split_whitespace().count() == 5 {
        format!("0 {}", expr)
    } else {
        expr.to_string()
    }
}

pub fn parse_schedule(expr: &str) -> Result<Schedule> {
    Schedule::from_str(&normalize_cron(expr))
        .with_context(|| format!("Failed to parse cron expression '{}'", expr))
}

pub fn next_run(schedule: &Schedule, now: DateTime<Local>) -> Option<DateTime<Local>> {
    schedule.after(&now).next()
}

/// One scheduled tick: check readiness, then update the loader
pub async fn run_scheduled_check(state: &SharedState) -> Option<UpdateResult> {
    if !state.ready_for_update().await {
        info!("System not ready for update, skipping...");
        return None;
    }

    info!("Checking for Decky Loader updates...");
    let result = state.run_loader_update().await;
    match result {
        UpdateResult::Updated => info!("Decky Loader updated successfully, pending restart"),
        UpdateResult::Failed => error!("Failed to update Decky Loader"),
        UpdateResult::NotUpdated => debug!("Decky Loader does not need update"),
    }
    Some(result)
}

/// Run until `shutdown` flips to true or its sender is dropped
pub async fn run_scheduler(state: SharedState, mut shutdown: watch::Receiver<bool>) {
    let mut config_changes = state.config.read().await.subscribe();

    loop {
        let expr = state.config.read().await.cron();
        let next = match parse_schedule(&expr) {
            Ok(schedule) => next_run(&schedule, Local::now()),
            Err(e) => {
                error!("{:#}", e);
                None
            }
        };

        let wait = match next {
            Some(at) => {
                info!("Cron schedule '{}': next check at {}", expr, at);
                Some((at - Local::now()).to_std().unwrap_or(Duration::ZERO))
            }
            None => {
                info!("No upcoming check scheduled, waiting for config change");
                None
            }
        };

        tokio::select! {
            _ = sleep_or_wait(wait) => {
                tokio::select! {
                    _ = run_scheduled_check(&state) => {}
                    _ = shutdown_requested(&mut shutdown) => {
                        info!("Shutdown requested, abandoning update check");
                        break;
                    }
                }
            }
            changed = config_changes.changed() => {
                if changed.is_err() {
                    break;
                }
                debug!("Config changed, rescheduling");
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }

    info!("Scheduler stopped");
}

/// Resolves once `shutdown` holds true or its sender is gone
async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    while !*shutdown.borrow_and_update() {
        if shutdown.changed().await.is_err() {
            return;
        }
    }
}

async fn sleep_or_wait(wait: Option<Duration>) {
    match wait {
        Some(duration) => tokio::time::sleep(duration).await,
        None => std::future::pending().await,
    }
}
