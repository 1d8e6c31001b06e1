//! Error types for arxivsummary.
//!
//! Library crates use [`ArxivSummaryError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all arxivsummary operations.
#[derive(Debug, thiserror::Error)]
pub enum ArxivSummaryError {
    /// Configuration file or environment error.
    #[error("config error: {message}")]
    Config { message: String },

    /// The catalog source was unreachable or returned a malformed top-level response.
    #[error("catalog source error: {0}")]
    Source(String),

    /// Network/HTTP error outside the catalog source (client construction, etc.).
    #[error("network error: {0}")]
    Network(String),

    /// Cursor or artifact persistence error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, ArxivSummaryError>;

impl ArxivSummaryError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a catalog source error from any displayable message.
    pub fn source(msg: impl Into<String>) -> Self {
        Self::Source(msg.into())
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
