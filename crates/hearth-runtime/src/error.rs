//! Error types for runtime operations.

use thiserror::Error;

/// Errors that can occur while driving the local runtime.
///
/// These never cross the published operation boundary: every operation on
/// [`crate::RuntimeManager`] resolves them locally into a boolean or an
/// outcome carrying a human-readable message.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Runtime answered with a non-success status.
    #[error("API error: {0}")]
    Api(String),

    /// Runtime is not running or not reachable.
    #[error("Runtime not reachable at {0}")]
    NotReachable(String),

    /// Runtime binary could not be located.
    #[error("Runtime executable not found")]
    NotInstalled,

    /// An external command exited unsuccessfully.
    #[error("`{program}` failed: {message}")]
    CommandFailed { program: String, message: String },

    /// An external command did not finish in time.
    #[error("`{0}` timed out")]
    CommandTimeout(String),

    /// Installer artifact could not be downloaded.
    #[error("Failed to download installer: {0}")]
    DownloadFailed(String),

    /// Model name was empty or malformed.
    #[error("Invalid model name: {0}")]
    InvalidModelName(String),

    /// No strategy is available for this platform.
    #[error("Unsupported platform: {0}")]
    Unsupported(String),
}

impl RuntimeError {
    pub(crate) fn command_failed(program: impl Into<String>, message: impl Into<String>) -> Self {
        Self::CommandFailed {
            program: program.into(),
            message: message.into(),
        }
    }
}
