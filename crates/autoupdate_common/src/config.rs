//! Plugin configuration store
//!
//! Defaults ship with the plugin as `default_config.json`; user changes are
//! kept in `config.json` under the plugin settings directory. Reads always
//! see defaults overlaid with stored values.

use serde_json::{json, Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use tokio::sync::watch;
use tracing::{info, warn};

use crate::error::{AutoUpdateError, Result};
use crate::paths::DeckyPaths;

pub const CRON_KEY: &str = "cron";
pub const MIN_BATTERY_KEY: &str = "min_battery";

/// Daily at 04:00
pub const DEFAULT_CRON: &str = "0 4 * * *";
pub const DEFAULT_MIN_BATTERY: u8 = 50;

fn builtin_defaults() -> Map<String, Value> {
    let mut defaults = Map::new();
    defaults.insert(CRON_KEY.to_string(), json!(DEFAULT_CRON));
    defaults.insert(MIN_BATTERY_KEY.to_string(), json!(DEFAULT_MIN_BATTERY));
    defaults
}

pub struct PluginConfig {
    config_file: PathBuf,
    defaults: Map<String, Value>,
    values: Map<String, Value>,
    changes: watch::Sender<u64>,
}

impl PluginConfig {
    pub fn load(paths: &DeckyPaths) -> Self {
        Self::load_from(&paths.default_config_file(), &paths.config_file())
    }

    pub fn load_from(default_file: &Path, config_file: &Path) -> Self {
        let mut defaults = builtin_defaults();
        if let Some(shipped) = read_object(default_file) {
            defaults.extend(shipped);
        }

        let values = read_object(config_file).unwrap_or_default();
        let (changes, _) = watch::channel(0);

        info!(
            "Loaded plugin config from {} ({} stored keys)",
            config_file.display(),
            values.len()
        );

        Self {
            config_file: config_file.to_path_buf(),
            defaults,
            values,
            changes,
        }
    }

    /// Defaults overlaid with stored values
    pub fn get_config(&self) -> Map<String, Value> {
        let mut merged = self.defaults.clone();
        merged.extend(self.values.iter().map(|(k, v)| (k.clone(), v.clone())));
        merged
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key).or_else(|| self.defaults.get(key))
    }

    /// Store `value` under `key` and persist it
    pub fn set_config(&mut self, key: &str, value: Value) -> Result<()> {
        if key.is_empty() {
            return Err(AutoUpdateError::Config("empty config key".to_string()));
        }

        let mut updated = self.values.clone();
        updated.insert(key.to_string(), value);
        write_object(&self.config_file, &updated)?;

        self.values = updated;
        self.changes.send_modify(|generation| *generation += 1);
        info!("Config key '{}' updated", key);
        Ok(())
    }

    /// Receiver bumped after every successful `set_config`
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.changes.subscribe()
    }

    pub fn cron(&self) -> String {
        match self.get(CRON_KEY).and_then(Value::as_str) {
            Some(expr) => expr.to_string(),
            None => DEFAULT_CRON.to_string(),
        }
    }

    pub fn min_battery(&self) -> u8 {
        self.get(MIN_BATTERY_KEY)
            .and_then(|v| v.as_u64().or_else(|| v.as_f64().map(|f| f.max(0.0) as u64)))
            .map(|n| n.min(100) as u8)
            .unwrap_or(DEFAULT_MIN_BATTERY)
    }
}

fn read_object(path: &Path) -> Option<Map<String, Value>> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
        Err(e) => {
            warn!("Failed to read {}: {}", path.display(), e);
            return None;
        }
    };

    match serde_json::from_str::<Value>(&content) {
        Ok(Value::Object(map)) => Some(map),
        Ok(_) => {
            warn!("Ignoring {}: not a JSON object", path.display());
            None
        }
        Err(e) => {
            warn!("Ignoring {}: {}", path.display(), e);
            None
        }
    }
}

fn write_object(path: &Path, map: &Map<String, Value>) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, serde_json::to_string_pretty(map)?)?;
    fs::rename(&tmp, path)?;
    Ok(())
}
