//! Directory-backed provider, e.g. a locally mounted sync folder.

use crate::error::{StorageError, StorageResult};
use crate::traits::{ProviderUploader, UploadReceipt, download_target, upload_name};
use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tracing::{debug, instrument};
use uuid::Uuid;

/// Stores chunk files as plain files under a root directory.
pub struct FilesystemUploader {
    root: PathBuf,
}

impl FilesystemUploader {
    /// Create the adapter, creating `root` if needed.
    pub async fn new(root: impl AsRef<Path>) -> StorageResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).await?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a remote id to a path inside the root.
    async fn object_path(&self, remote_id: &str) -> StorageResult<PathBuf> {
        let root = self.root.clone();
        let remote_id = remote_id.to_string();
        tokio::task::spawn_blocking(move || resolve_within(&root, &remote_id))
            .await
            .map_err(|e| {
                StorageError::Io(std::io::Error::other(format!("spawn_blocking failed: {e}")))
            })?
    }
}

/// Map `remote_id` under `root`, refusing anything that escapes it.
///
/// Remote ids are flat file names, so any separator or special component is
/// rejected outright. An existing entry is canonicalized to catch symlinks
/// pointing outside the root.
fn resolve_within(root: &Path, remote_id: &str) -> StorageResult<PathBuf> {
    let mut components = Path::new(remote_id).components();
    let single_normal = matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    );
    if !single_normal || remote_id.contains('/') || remote_id.contains('\\') {
        return Err(StorageError::InvalidKey(format!(
            "not a plain file name: {remote_id}"
        )));
    }

    let path = root.join(remote_id);
    match std::fs::symlink_metadata(&path) {
        Ok(meta) => {
            let root_canonical = root.canonicalize()?;
            let canonical = path.canonicalize().map_err(|e| {
                if meta.file_type().is_symlink() {
                    StorageError::InvalidKey(format!("dangling symlink: {remote_id}"))
                } else {
                    StorageError::Io(e)
                }
            })?;
            if !canonical.starts_with(&root_canonical) {
                return Err(StorageError::InvalidKey(format!(
                    "resolved path escapes provider root: {remote_id}"
                )));
            }
            Ok(path)
        }
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(path),
        Err(err) => Err(StorageError::Io(err)),
    }
}

fn not_found_or_io(remote_id: &str, err: std::io::Error) -> StorageError {
    if err.kind() == std::io::ErrorKind::NotFound {
        StorageError::NotFound(remote_id.to_string())
    } else {
        StorageError::Io(err)
    }
}

#[async_trait]
impl ProviderUploader for FilesystemUploader {
    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn upload(&self, local: &Path) -> StorageResult<UploadReceipt> {
        let name = upload_name(local)?;
        let target = self.object_path(&name).await?;

        // Copy beside the target, fsync, then rename so readers never see a
        // partial chunk file.
        let temp = self.root.join(format!(".{name}.tmp.{}", Uuid::new_v4()));
        let copied = async {
            let bytes = fs::copy(local, &temp).await?;
            fs::File::open(&temp).await?.sync_all().await?;
            fs::rename(&temp, &target).await?;
            Ok::<u64, std::io::Error>(bytes)
        }
        .await;

        match copied {
            Ok(bytes) => {
                debug!(remote_id = %name, bytes, "stored chunk file");
                Ok(UploadReceipt {
                    remote_id: name,
                    bytes,
                })
            }
            Err(err) => {
                let _ = fs::remove_file(&temp).await;
                Err(StorageError::upload_failed(
                    self.backend_name(),
                    not_found_or_io(&local.display().to_string(), err),
                ))
            }
        }
    }

    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn download(
        &self,
        remote_id: &str,
        destination_name: &str,
        destination_dir: &Path,
    ) -> StorageResult<PathBuf> {
        let source = self.object_path(remote_id).await?;
        let destination = download_target(destination_name, destination_dir).await?;
        fs::copy(&source, &destination)
            .await
            .map_err(|e| not_found_or_io(remote_id, e))?;
        Ok(destination)
    }

    async fn health_check(&self) -> StorageResult<()> {
        let meta = fs::metadata(&self.root).await.map_err(|e| StorageError::Connection {
            backend: self.backend_name(),
            reason: format!("{}: {e}", self.root.display()),
        })?;
        if meta.is_dir() {
            Ok(())
        } else {
            Err(StorageError::Connection {
                backend: self.backend_name(),
                reason: format!("{} is not a directory", self.root.display()),
            })
        }
    }

    fn backend_name(&self) -> &'static str {
        "filesystem"
    }
}
