//! Pipeline error types.

use coldvault_metadata::MetadataError;
use coldvault_storage::StorageError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors from preparation, distribution and restore.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("no provider has at least {floor} bytes free")]
    NoValidProvider { floor: i64 },

    #[error("every provider is at capacity for {required} bytes")]
    AllProvidersAtCapacity { required: i64 },

    #[error("encryption failed: {0}")]
    Encryption(String),

    #[error("key material error: {0}")]
    KeyMaterial(String),

    #[error("checksum mismatch for {chunk}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        chunk: String,
        expected: String,
        actual: String,
    },

    #[error("metadata row not recorded: {0}")]
    NotRecorded(String),

    #[error("cancelled")]
    Cancelled,

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Metadata(#[from] MetadataError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Core(#[from] coldvault_core::Error),
}

impl PipelineError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        if source.kind() == std::io::ErrorKind::NotFound {
            let path = path.into();
            return PipelineError::NotFound(path.display().to_string());
        }
        PipelineError::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether the store or a provider could not be reached.
    pub fn is_connection(&self) -> bool {
        match self {
            PipelineError::Metadata(e) => e.is_connection(),
            PipelineError::Storage(StorageError::Connection { .. }) => true,
            _ => false,
        }
    }
}

/// Result type for pipeline operations.
pub type PipelineResult<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_not_found_maps_to_not_found() {
        let err = PipelineError::io(
            "/nope",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        assert!(matches!(err, PipelineError::NotFound(p) if p == "/nope"));
    }

    #[test]
    fn test_connection_classification() {
        let err: PipelineError = MetadataError::Connection(sqlx::Error::PoolTimedOut).into();
        assert!(err.is_connection());
        assert!(!PipelineError::Cancelled.is_connection());
    }
}
