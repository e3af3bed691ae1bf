//! Error types for Reqbin

use std::io;
use thiserror::Error;

/// Result type for Reqbin operations
pub type Result<T> = std::result::Result<T, ReqbinError>;

/// Errors that can occur in Reqbin
#[derive(Debug, Error)]
pub enum ReqbinError {
    /// I/O error (listener bind, runtime creation)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Configuration error, fatal and raised before any socket is bound
    #[error("Configuration error: {0}")]
    Config(String),

    /// Session used outside of its lifecycle
    #[error("Invalid session state: {0}")]
    InvalidState(String),

    /// Request body could not be read in full
    #[error("Failed to read request body: {0}")]
    BodyRead(String),

    /// Request body exceeded the configured limit
    #[error("Body too large: exceeds limit of {limit} bytes")]
    BodyTooLarge {
        /// Size limit
        limit: usize,
    },

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}
