//! Provider adapter trait definitions.

use crate::error::{StorageError, StorageResult};
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// What a provider handed back for a stored chunk file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadReceipt {
    /// Provider-side identifier used to fetch the object back.
    pub remote_id: String,
    /// Bytes transferred.
    pub bytes: u64,
}

/// A connection to one storage provider.
///
/// Adapters are built from a decoded credential and may be shared across
/// concurrent uploads.
#[async_trait]
pub trait ProviderUploader: Send + Sync {
    /// Upload a local file, keeping its file name on the provider side.
    async fn upload(&self, local: &Path) -> StorageResult<UploadReceipt>;

    /// Fetch a previously uploaded object into `destination_dir/destination_name`,
    /// overwriting any existing file, and return the written path.
    async fn download(
        &self,
        remote_id: &str,
        destination_name: &str,
        destination_dir: &Path,
    ) -> StorageResult<PathBuf>;

    /// Check that the provider is reachable with the configured credential.
    async fn health_check(&self) -> StorageResult<()>;

    /// Short backend name used in logs and errors.
    fn backend_name(&self) -> &'static str;
}

/// File name component of an upload source.
pub(crate) fn upload_name(local: &Path) -> StorageResult<String> {
    local
        .file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .ok_or_else(|| StorageError::InvalidKey(format!("no file name in {}", local.display())))
}

/// Destination path for a download, creating the directory and refusing
/// names that would land outside it.
pub(crate) async fn download_target(
    destination_name: &str,
    destination_dir: &Path,
) -> StorageResult<PathBuf> {
    let name = Path::new(destination_name);
    let plain = name.file_name().and_then(|n| n.to_str()) == Some(destination_name);
    if destination_name.is_empty() || !plain {
        return Err(StorageError::InvalidKey(format!(
            "not a plain file name: {destination_name}"
        )));
    }
    tokio::fs::create_dir_all(destination_dir).await?;
    Ok(destination_dir.join(name))
}
