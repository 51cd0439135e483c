//! Error types for docketrace.
//!
//! Library crates use [`DocketError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all docketrace operations.
#[derive(Debug, thiserror::Error)]
pub enum DocketError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// An HTTP collaborator could not be reached.
    #[error("network error: {0}")]
    Network(String),

    /// The case-search source could not be reached at all.
    #[error("extraction error: {0}")]
    Extraction(String),

    /// The phone-lookup service rejected or failed a request.
    #[error("lookup error: {0}")]
    Lookup(String),

    /// Record store unavailable or query failed.
    #[error("storage error: {0}")]
    Storage(String),

    /// Markup or response body could not be interpreted.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Invalid client input (unknown region, bad environment name, ...).
    #[error("validation error: {message}")]
    Validation { message: String },

    /// Unknown job id or docket number.
    #[error("not found: {message}")]
    NotFound { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, DocketError>;

impl DocketError {
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

    /// Create a not-found error from any displayable message.
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound {
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

    /// Whether this error was caused by caller input rather than an execution failure.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::Validation { .. } | Self::NotFound { .. })
    }
}
