//! Error types for fdrdict.
//!
//! Library crates use [`FdrError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all fdrdict operations.
#[derive(Debug, thiserror::Error)]
pub enum FdrError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Credentials were rejected (HTTP 401 or failed token exchange).
    #[error("authentication error: {0}")]
    Authentication(String),

    /// Credentials are valid but lack the scope for the requested resource (HTTP 403).
    #[error("permission error: {0}")]
    Permission(String),

    /// Network failure, timeout, or unexpected HTTP status.
    #[error("transport error: {message}")]
    Transport {
        message: String,
        /// HTTP status, when the server answered at all.
        status: Option<u16>,
        /// Server-provided hint for how long to wait before retrying.
        retry_after: Option<std::time::Duration>,
    },

    /// A single catalog entry could not be hydrated.
    #[error("detail fetch error for {id}: {message}")]
    DetailFetch { id: String, message: String },

    /// The assembled catalog came back empty despite a non-empty id list.
    #[error("assembly error: {0}")]
    Assembly(String),

    /// A keyword source could not be parsed.
    #[error("tag load error at {path:?}: {message}")]
    TagLoad { path: PathBuf, message: String },

    /// JSON or response-body decoding error.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error.
    #[error("validation error: {message}")]
    Validation { message: String },

    /// The operation was cancelled before completion.
    #[error("operation cancelled")]
    Cancelled,
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, FdrError>;

impl FdrError {
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

    /// Create a transport error with no HTTP status (connection, timeout, body read).
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport {
            message: msg.into(),
            status: None,
            retry_after: None,
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether this error ends the whole operation rather than a single item.
    ///
    /// Authentication and permission failures mean every further request
    /// will fail the same way.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Authentication(_) | Self::Permission(_) | Self::Cancelled
        )
    }

    /// Whether a retry of the same request might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = FdrError::config("missing client id");
        assert_eq!(err.to_string(), "config error: missing client id");

        let err = FdrError::DetailFetch {
            id: "42".into(),
            message: "HTTP 500".into(),
        };
        assert_eq!(err.to_string(), "detail fetch error for 42: HTTP 500");
    }

    #[test]
    fn error_classes() {
        assert!(FdrError::Authentication("bad secret".into()).is_fatal());
        assert!(FdrError::Permission("missing scope".into()).is_fatal());
        assert!(!FdrError::transport("connection reset").is_fatal());
        assert!(FdrError::transport("connection reset").is_retryable());
        assert!(!FdrError::Permission("missing scope".into()).is_retryable());
        assert!(!FdrError::parse("bad json").is_retryable());
    }
}
