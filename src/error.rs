//! Top-level error types for bugbot.

use std::sync::Arc;

/// Crate-wide result type alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error enum wrapping domain-specific errors.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Dialog(#[from] DialogError),

    #[error(transparent)]
    Tracker(#[from] TrackerError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Configuration loading errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to load config from {path}: {source}")]
    Load {
        path: String,
        source: Arc<std::io::Error>,
    },

    #[error("failed to parse config file {path}: {message}")]
    Parse { path: String, message: String },

    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("missing required config key: {0}")]
    MissingKey(String),
}

/// Dialog definition invariant violations.
#[derive(Debug, thiserror::Error)]
pub enum DialogError {
    #[error("dialog field name `{name}` is used more than once")]
    DuplicateField { name: String },

    #[error("select field `{name}` has no options")]
    EmptySelect { name: String },
}

/// Issue tracker request errors.
#[derive(Debug, thiserror::Error)]
pub enum TrackerError {
    #[error("invalid issue tracker URL: {0}")]
    InvalidUrl(String),

    #[error("issue tracker request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("issue tracker returned status {status}")]
    Status { status: u16 },

    #[error("issue tracker response is missing `web_url`")]
    MissingWebUrl,
}
