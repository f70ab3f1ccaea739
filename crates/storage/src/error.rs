//! Storage error types.

use coldvault_core::ProviderKind;
use thiserror::Error;

/// Provider adapter errors.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("object not found: {0}")]
    NotFound(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("S3 error: {0}")]
    S3(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid {kind} credential: {reason}")]
    Credential { kind: ProviderKind, reason: String },

    #[error("no connector registered for {0} providers")]
    BackendUnavailable(ProviderKind),

    #[error("{backend} unreachable: {reason}")]
    Connection {
        backend: &'static str,
        reason: String,
    },

    #[error("upload to {backend} failed: {source}")]
    UploadFailed {
        backend: &'static str,
        #[source]
        source: Box<StorageError>,
    },
}

impl StorageError {
    /// Wrap a transfer failure with the backend that produced it.
    pub fn upload_failed(backend: &'static str, source: StorageError) -> Self {
        match source {
            already @ StorageError::UploadFailed { .. } => already,
            other => StorageError::UploadFailed {
                backend,
                source: Box::new(other),
            },
        }
    }
}

/// Result type for storage operations.
pub type StorageResult<T> = std::result::Result<T, StorageError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upload_failed_wraps_once() {
        let inner = StorageError::NotFound("a".to_string());
        let wrapped = StorageError::upload_failed("s3", inner);
        let rewrapped = StorageError::upload_failed("filesystem", wrapped);
        match rewrapped {
            StorageError::UploadFailed { backend, source } => {
                assert_eq!(backend, "s3");
                assert!(matches!(*source, StorageError::NotFound(_)));
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
