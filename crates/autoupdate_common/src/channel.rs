//! Update channel selection
//!
//! The loader keeps its own settings in `loader.json` next to the plugin
//! settings directories. Its `branch` field picks the release track:
//! 0 = stable, 1 = pre-release, 2 = testing (not published as GitHub
//! releases, so it follows stable here).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use tracing::{debug, warn};

use crate::error::Result;

const PRE_RELEASE_BRANCH: i64 = 1;

/// Release track followed by the loader
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateChannel {
    #[default]
    Stable,
    PreRelease,
}

impl fmt::Display for UpdateChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stable => write!(f, "stable"),
            Self::PreRelease => write!(f, "pre-release"),
        }
    }
}

#[derive(Debug, Deserialize)]
struct LoaderSettings {
    #[serde(default)]
    branch: Option<serde_json::Value>,
}

/// Read the loader channel, defaulting to stable on any failure
pub fn read_loader_channel(path: &Path) -> UpdateChannel {
    match try_read_loader_channel(path) {
        Ok(channel) => {
            debug!("Loader channel from {}: {}", path.display(), channel);
            channel
        }
        Err(e) => {
            warn!(
                "Failed to read loader channel from {}: {}",
                path.display(),
                e
            );
            UpdateChannel::Stable
        }
    }
}

fn try_read_loader_channel(path: &Path) -> Result<UpdateChannel> {
    let content = std::fs::read_to_string(path)?;
    let settings: LoaderSettings = serde_json::from_str(&content)?;

    let branch = settings.branch.as_ref().and_then(|b| b.as_i64());
    if branch == Some(PRE_RELEASE_BRANCH) {
        Ok(UpdateChannel::PreRelease)
    } else {
        Ok(UpdateChannel::Stable)
    }
}
