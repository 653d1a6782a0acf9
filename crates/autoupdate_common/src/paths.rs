//! Filesystem locations handed to the plugin by the loader
//!
//! The loader starts plugin back-ends with `DECKY_*` environment variables.
//! Fallbacks mirror the loader's default `~/homebrew` layout.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

pub const PLUGIN_NAME: &str = "auto-update";
pub const SOCKET_NAME: &str = "autoupdated.sock";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeckyPaths {
    pub decky_home: PathBuf,
    pub plugin_dir: PathBuf,
    pub settings_dir: PathBuf,
    pub runtime_dir: PathBuf,
    pub log_dir: PathBuf,
}

impl DeckyPaths {
    /// Resolve paths from the `DECKY_*` environment
    pub fn from_env() -> Self {
        let decky_home = env::var_os("DECKY_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|| {
                let home = env::var_os("HOME").map(PathBuf::from).unwrap_or_default();
                home.join("homebrew")
            });

        let var_or = |name: &str, fallback: PathBuf| -> PathBuf {
            env::var_os(name).map(PathBuf::from).unwrap_or(fallback)
        };

        Self {
            plugin_dir: var_or("DECKY_PLUGIN_DIR", PathBuf::from(".")),
            settings_dir: var_or(
                "DECKY_PLUGIN_SETTINGS_DIR",
                decky_home.join("settings").join(PLUGIN_NAME),
            ),
            runtime_dir: var_or(
                "DECKY_PLUGIN_RUNTIME_DIR",
                decky_home.join("data").join(PLUGIN_NAME),
            ),
            log_dir: var_or(
                "DECKY_PLUGIN_LOG_DIR",
                decky_home.join("logs").join(PLUGIN_NAME),
            ),
            decky_home,
        }
    }

    /// Lay every directory out under one root (tests, portable installs)
    pub fn under(root: &Path) -> Self {
        let decky_home = root.to_path_buf();
        Self {
            plugin_dir: decky_home.join("plugins").join(PLUGIN_NAME),
            settings_dir: decky_home.join("settings").join(PLUGIN_NAME),
            runtime_dir: decky_home.join("data").join(PLUGIN_NAME),
            log_dir: decky_home.join("logs").join(PLUGIN_NAME),
            decky_home,
        }
    }

    /// Loader settings, one level above the plugin settings directory.
    /// Symlinks are resolved first; a missing directory falls back to the
    /// lexical parent.
    pub fn loader_config(&self) -> PathBuf {
        let settings_dir = fs::canonicalize(&self.settings_dir)
            .unwrap_or_else(|_| self.settings_dir.clone());
        match settings_dir.parent() {
            Some(parent) => parent.join("loader.json"),
            None => settings_dir.join("..").join("loader.json"),
        }
    }

    pub fn services_dir(&self) -> PathBuf {
        self.decky_home.join("services")
    }

    pub fn loader_binary(&self) -> PathBuf {
        self.services_dir().join("PluginLoader")
    }

    pub fn loader_version_file(&self) -> PathBuf {
        self.services_dir().join(".loader.version")
    }

    pub fn config_file(&self) -> PathBuf {
        self.settings_dir.join("config.json")
    }

    pub fn default_config_file(&self) -> PathBuf {
        self.plugin_dir.join("default_config.json")
    }

    pub fn socket_path(&self) -> PathBuf {
        self.runtime_dir.join(SOCKET_NAME)
    }
}
