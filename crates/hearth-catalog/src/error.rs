//! Error types for catalog resolution.

use thiserror::Error;

/// Errors raised by a single catalog tier or the snapshot cache.
///
/// The resolver treats every one of them as "this tier produced nothing" and
/// moves on; none reaches callers of [`crate::CatalogResolver`].
#[derive(Debug, Error)]
pub enum CatalogError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The hub answered with a non-success status.
    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    /// The response had no recognizable list of model records.
    #[error("No model records found in {0}")]
    NoRecords(String),
}
