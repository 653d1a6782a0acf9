//! Error types for the auto-update back-end.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AutoUpdateError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid version: {0}")]
    InvalidVersion(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Command error: {0}")]
    Command(String),

    #[error("Invalid params: {0}")]
    InvalidParams(String),

    #[error("Unknown method: {0}")]
    UnknownMethod(String),
}

impl AutoUpdateError {
    /// JSON-RPC error code reported to the front-end.
    pub fn code(&self) -> i32 {
        match self {
            AutoUpdateError::Io(_) => -32006,
            AutoUpdateError::Json(_) => -32700,
            AutoUpdateError::Http(_) => -32007,
            AutoUpdateError::InvalidVersion(_) => -32008,
            AutoUpdateError::Config(_) => -32009,
            AutoUpdateError::Command(_) => -32010,
            AutoUpdateError::InvalidParams(_) => -32602,
            AutoUpdateError::UnknownMethod(_) => -32601,
        }
    }
}

pub type Result<T> = std::result::Result<T, AutoUpdateError>;
