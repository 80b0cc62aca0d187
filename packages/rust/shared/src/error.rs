//! Error types for stacshift.
//!
//! Library crates use [`StacshiftError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.
//!
//! The taxonomy is closed on purpose: the batch handler classifies every
//! per-key failure through [`StacshiftError::classify`] to decide between
//! message redelivery and acknowledgement, so new kinds must pick a side.

use std::path::PathBuf;

/// Top-level error type for all stacshift operations.
#[derive(Debug, thiserror::Error)]
pub enum StacshiftError {
    /// Retryable infrastructure error from the object store or queue
    /// (throttling, connection resets, 5xx responses).
    #[error("transient store error: {0}")]
    TransientStore(String),

    /// The object store has no object at the given key.
    #[error("object not found: {key}")]
    NotFound { key: String },

    /// A referenced external URL could not be fetched after bounded retries.
    #[error("unable to access {url}: {message}")]
    SourceUnreachable { url: String, message: String },

    /// Invalid JSON, invalid YAML/workflow-graph structure, or invalid patch.
    #[error("malformed input: {message}")]
    MalformedInput { message: String },

    /// A computed value (typically a self link) failed validation.
    #[error("validation error: {message}")]
    Validation { message: String },

    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, StacshiftError>;

/// How the batch handler should react to a per-key failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Failure may resolve on redelivery; negatively acknowledge the message.
    Retry,
    /// Failure is terminal for this key; report it and move on.
    Permanent,
}

impl StacshiftError {
    /// Create a malformed-input error from any displayable message.
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedInput {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a not-found error for a store key.
    pub fn not_found(key: impl Into<String>) -> Self {
        Self::NotFound { key: key.into() }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Map this error kind to its retry/permanent class.
    ///
    /// Only transient store trouble earns a redelivery; a source URL that
    /// stayed unreachable through bounded retries will not fix itself within
    /// a useful redelivery window, and malformed or invalid input never will.
    pub fn classify(&self) -> ErrorClass {
        match self {
            Self::TransientStore(_) => ErrorClass::Retry,
            Self::NotFound { .. }
            | Self::SourceUnreachable { .. }
            | Self::MalformedInput { .. }
            | Self::Validation { .. }
            | Self::Config { .. }
            | Self::Io { .. } => ErrorClass::Permanent,
        }
    }
}
