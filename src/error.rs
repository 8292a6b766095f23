//! Store Errors
//!
//! TigerStyle: Explicit error types with context.
//!
//! A missing record is never an error: `get` answers `Ok(None)`. Everything
//! here is a real failure the caller must handle.

use thiserror::Error;

/// Errors from store operations and bus dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// A required argument is absent
    #[error("missing parameter: {message}")]
    MissingParameter {
        /// What was missing, and for which operation
        message: String,
    },

    /// An argument is present but has the wrong shape
    #[error("invalid parameter: {message}")]
    InvalidParameter {
        /// What was wrong with it
        message: String,
    },

    /// The underlying store call failed
    #[error("{backend} backend error: {message}")]
    Backend {
        /// Adapter name (memory, dynamodb, riak, search)
        backend: String,
        /// Backend-native failure text
        message: String,
    },

    /// No registration matches the requested pattern
    #[error("no handler registered for pattern {pattern}")]
    NoHandler {
        /// Rendered request pattern
        pattern: String,
    },

    /// Entity or attribute marshaling failed
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Configuration could not be loaded or is inconsistent
    #[error("config error: {0}")]
    Config(String),
}

impl StoreError {
    /// Create a missing parameter error.
    #[must_use]
    pub fn missing(message: impl Into<String>) -> Self {
        Self::MissingParameter {
            message: message.into(),
        }
    }

    /// Create an invalid parameter error.
    #[must_use]
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidParameter {
            message: message.into(),
        }
    }

    /// Create a backend error.
    #[must_use]
    pub fn backend(backend: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Backend {
            backend: backend.into(),
            message: message.into(),
        }
    }

    /// Create a no handler error.
    #[must_use]
    pub fn no_handler(pattern: impl Into<String>) -> Self {
        Self::NoHandler {
            pattern: pattern.into(),
        }
    }

    /// True for errors caused by the caller's arguments (4xx class).
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::MissingParameter { .. } | Self::InvalidParameter { .. }
        )
    }

    /// True for errors a caller-side retry policy may retry.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Backend { .. })
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
