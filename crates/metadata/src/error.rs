//! Metadata store error types.

use thiserror::Error;

/// Metadata store operation errors.
#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("connection error: {0}")]
    Connection(#[source] sqlx::Error),

    #[error("database error: {0}")]
    Database(#[source] sqlx::Error),

    #[error("unsupported type `{rust_type}` for field {table}.{field}")]
    UnsupportedType {
        table: &'static str,
        field: &'static str,
        rust_type: &'static str,
    },

    #[error("unknown column `{column}` for table {table}")]
    UnknownColumn { table: &'static str, column: String },

    #[error("cannot decode {table}.{column}: {reason}")]
    Decode {
        table: &'static str,
        column: String,
        reason: String,
    },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Core(#[from] coldvault_core::Error),
}

impl MetadataError {
    /// Whether the error means the store itself could not be reached.
    pub fn is_connection(&self) -> bool {
        matches!(self, MetadataError::Connection(_))
    }
}

/// Classifies a driver error: transport and pool failures become
/// [`MetadataError::Connection`], everything else is a statement failure.
impl From<sqlx::Error> for MetadataError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed => MetadataError::Connection(err),
            other => MetadataError::Database(other),
        }
    }
}

/// Result type for metadata operations.
pub type MetadataResult<T> = std::result::Result<T, MetadataError>;
