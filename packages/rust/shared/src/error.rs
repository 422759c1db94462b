//! Error types for the program collections tools.
//!
//! Library crates use [`CollectionsError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all collections operations.
#[derive(Debug, thiserror::Error)]
pub enum CollectionsError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Network/HTTP error talking to the catalog API or a remote source.
    #[error("network error: {0}")]
    Network(String),

    /// Malformed input (API response, spreadsheet row, code table file).
    #[error("parse error: {message}")]
    Parse { message: String },

    /// An external data source could not provide its data.
    #[error("source error: {0}")]
    Source(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (shadowed code table, invalid row, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },

    /// Correction artifact rendering or persistence error.
    #[error("artifact error: {0}")]
    Artifact(String),
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, CollectionsError>;

impl CollectionsError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
