//! Provider adapters for coldvault.
//!
//! This crate provides:
//! - Credential decoding for each provider kind
//! - The `ProviderUploader` capability (upload, download, health check)
//! - Backends: local directory and S3-compatible, with a connector seam for
//!   Google Drive and Dropbox clients

pub mod backends;
pub mod credentials;
pub mod error;
pub mod factory;
pub mod traits;

pub use backends::{filesystem::FilesystemUploader, s3::S3Uploader};
pub use credentials::{
    DropboxSecret, FilesystemSecret, GoogleDriveSecret, ProviderBackend, S3Secret,
};
pub use error::{StorageError, StorageResult};
pub use factory::{BackendConnector, DefaultUploaderFactory, UploaderFactory};
pub use traits::{ProviderUploader, UploadReceipt};

use coldvault_core::ProviderKind;
use std::sync::Arc;

/// Build an uploader for a stored provider credential with the default factory.
pub async fn from_credential(
    kind: ProviderKind,
    credential: &str,
) -> StorageResult<Arc<dyn ProviderUploader>> {
    DefaultUploaderFactory::new()
        .build_from_blob(kind, credential)
        .await
}
