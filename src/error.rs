//! Error types for rate limiting operations.
//!
//! The hierarchy has two concerns: storage failures (the backing store could
//! not be reached or answered with something unexpected) and configuration
//! failures (bad profiles, unreadable profile files). Storage errors surface
//! from the store adapter unmodified; the resolver wraps them into
//! [`RateLimitError::Storage`] on the way out.

use std::time::Duration;
use thiserror::Error;

/// Result type for rate limiting operations.
pub type Result<T> = std::result::Result<T, RateLimitError>;

/// Main error type for rate limiting operations.
#[derive(Debug, Error)]
pub enum RateLimitError {
    /// Storage backend failure.
    #[error("storage failure: {0}")]
    Storage(#[from] StorageError),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Backing-store errors.
///
/// Every variant means the same thing to callers: the store could not
/// complete an operation. The admission filter treats all of them as a
/// fail-open signal.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The store could not be reached or the operation did not complete.
    #[error("{message}")]
    Unavailable {
        /// Error message from the underlying client.
        message: String,
    },

    /// The operation did not complete within its deadline.
    #[error("storage operation timed out after {0:?}")]
    Timeout(Duration),

    /// Connection pool exhausted.
    #[error("connection pool exhausted")]
    PoolExhausted,

    /// The store answered with a reply the adapter did not expect.
    #[error("unexpected reply from store: {0}")]
    Protocol(String),
}

impl StorageError {
    /// Create a new unavailable error.
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    /// Create a new protocol error.
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol(message.into())
    }

    /// Check if a future request might succeed where this one failed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Unavailable { .. } => true,
            Self::Timeout(_) => true,
            Self::PoolExhausted => true,
            Self::Protocol(_) => false,
        }
    }
}

/// Configuration errors. Fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The token profile file could not be read.
    #[error("cannot read token profile file {path}: {message}")]
    ProfileFile {
        /// Path that was attempted.
        path: String,
        /// Error message from the filesystem.
        message: String,
    },

    /// The token profile file did not parse.
    #[error("malformed token profile file {path}: {message}")]
    ProfileMalformed {
        /// Path that was read.
        path: String,
        /// Error message from the parser.
        message: String,
    },

    /// A quota profile failed validation.
    #[error("invalid quota profile: {0}")]
    InvalidProfile(String),
}
