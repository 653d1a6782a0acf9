//! Shared types and logic for the Steam Deck auto-update plugin back-end.
//!
//! Battery status, plugin configuration, and the two update routines
//! (loader self-update and rpm-ostree OS update). Every routine degrades to
//! a safe default on failure and never propagates errors to its caller.

pub mod channel;
pub mod config;
pub mod error;
pub mod github_releases;
pub mod loader_update;
pub mod paths;
pub mod power;
pub mod rpc;
pub mod rpm_ostree;
pub mod update_state;
pub mod version;

pub use channel::UpdateChannel;
pub use error::AutoUpdateError;
pub use paths::DeckyPaths;
pub use update_state::{RestartAction, UpdateResult, UpdateStatus};
pub use version::Version;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
