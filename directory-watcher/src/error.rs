//! Error types for the directory observation engine.

use thiserror::Error;

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, WatcherError>;

/// Errors that can occur while loading, watching, or exporting directories.
///
/// Per-entry walk failures are not represented here: the scanner counts and
/// logs them instead of surfacing them.
#[derive(Error, Debug)]
pub enum WatcherError {
    /// A configured include/exclude pattern is not a valid regular expression.
    #[error("invalid pattern {pattern:?} for directory {dir}: {source}")]
    InvalidPattern {
        dir: String,
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// Directory not found.
    #[error("directory not found: {0}")]
    DirectoryNotFound(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Notify error.
    #[error("notify error: {0}")]
    Notify(#[from] notify::Error),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Metrics registration or encoding error.
    #[error("metrics error: {0}")]
    Metrics(#[from] prometheus::Error),
}
