//! Battery detection
//!
//! Reads the first `BAT*` supply under /sys/class/power_supply. Desktops and
//! docked devices without a battery are normal; they report a level of 101
//! and "charging" so nothing downstream waits on them.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const POWER_SUPPLY_DIR: &str = "/sys/class/power_supply";

/// Level reported when there is no battery to read
pub const NO_BATTERY_LEVEL: u8 = 101;

/// Snapshot of the battery as seen by the front-end
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatteryStatus {
    /// Charge percentage (0-100), or 101 without a battery
    pub level: u8,
    pub charging: bool,
}

#[derive(Debug, Clone)]
pub struct BatteryReader {
    power_supply_dir: PathBuf,
}

impl Default for BatteryReader {
    fn default() -> Self {
        Self::new(POWER_SUPPLY_DIR)
    }
}

impl BatteryReader {
    pub fn new(power_supply_dir: impl Into<PathBuf>) -> Self {
        Self {
            power_supply_dir: power_supply_dir.into(),
        }
    }

    /// First battery by name, e.g. BAT0 before BAT1
    pub fn battery_path(&self) -> Option<PathBuf> {
        let entries = fs::read_dir(&self.power_supply_dir).ok()?;

        let mut batteries: Vec<PathBuf> = entries
            .flatten()
            .filter(|entry| entry.file_name().to_string_lossy().starts_with("BAT"))
            .map(|entry| entry.path())
            .collect();
        batteries.sort();

        batteries.into_iter().next()
    }

    pub fn battery_level(&self) -> u8 {
        let level = self
            .battery_path()
            .and_then(|path| read_attribute(&path, "capacity"))
            .and_then(|raw| raw.parse::<u8>().ok());

        match level {
            Some(level) => level,
            None => {
                debug!("No readable battery capacity, reporting {}", NO_BATTERY_LEVEL);
                NO_BATTERY_LEVEL
            }
        }
    }

    pub fn is_charging(&self) -> bool {
        self.battery_path()
            .and_then(|path| read_attribute(&path, "status"))
            .map(|status| status != "Discharging")
            .unwrap_or(true)
    }

    pub fn status(&self) -> BatteryStatus {
        BatteryStatus {
            level: self.battery_level(),
            charging: self.is_charging(),
        }
    }
}

fn read_attribute(battery: &Path, name: &str) -> Option<String> {
    fs::read_to_string(battery.join(name))
        .ok()
        .map(|s| s.trim().to_string())
}
