//! Error types for the core domain.

use thiserror::Error;

/// Core domain error type.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("unknown {kind} code: {code}")]
    UnknownCode { kind: &'static str, code: i64 },

    #[error("invalid chunk name: {0}")]
    InvalidChunkName(String),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;
