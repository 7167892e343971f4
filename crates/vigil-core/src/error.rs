//! Error types for vigil-core

use thiserror::Error;

/// Errors surfaced by the core poller machinery.
///
/// Expected probe-level failures never appear here; they are folded into
/// [`crate::ProbeResult`] so a failing probe cannot abort a round. This
/// enum covers configuration and local-I/O problems that must fail fast.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Target address is empty or malformed
    #[error("invalid target address: {0}")]
    InvalidTarget(String),

    /// A required configuration value is absent
    #[error("missing required configuration: {0}")]
    MissingConfig(String),

    /// IO error (audit log, report document)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP client construction error
    #[error("HTTP error: {0}")]
    Http(String),
}

impl From<reqwest::Error> for CoreError {
    fn from(err: reqwest::Error) -> Self {
        CoreError::Http(err.to_string())
    }
}

/// Convenience result alias for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
