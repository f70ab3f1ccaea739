mod common;

use async_trait::async_trait;
use coldvault_core::ProviderKind;
use coldvault_storage::{
    BackendConnector, DefaultUploaderFactory, ProviderBackend, ProviderUploader, StorageError,
    StorageResult, UploadReceipt, UploaderFactory, from_credential,
};
use common::{seeded_bytes, write_chunk};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

#[tokio::test]
async fn test_filesystem_credential_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("sync-folder");
    let credential = serde_json::json!({ "Root": root }).to_string();

    let uploader = from_credential(ProviderKind::Filesystem, &credential)
        .await
        .unwrap();
    assert_eq!(uploader.backend_name(), "filesystem");
    uploader.health_check().await.unwrap();

    let body = seeded_bytes(7, 4096);
    let local = write_chunk(&dir.path().join("staging"), "f00d-3.shas", &body).await;
    let receipt = uploader.upload(&local).await.unwrap();
    assert_eq!(receipt.bytes, 4096);
    assert!(root.join(&receipt.remote_id).exists());

    let out = uploader
        .download(&receipt.remote_id, "f00d-3.shas", &dir.path().join("out"))
        .await
        .unwrap();
    assert_eq!(tokio::fs::read(out).await.unwrap(), body);
}

#[tokio::test]
async fn test_credential_for_wrong_kind_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let credential = serde_json::json!({ "Root": dir.path() }).to_string();
    let err = from_credential(ProviderKind::S3, &credential)
        .await
        .err()
        .unwrap();
    assert!(matches!(err, StorageError::Credential { kind: ProviderKind::S3, .. }));
}

/// Keeps uploads in memory and counts how often it was connected.
struct MemoryConnector {
    connects: AtomicUsize,
}

struct MemoryUploader;

#[async_trait]
impl ProviderUploader for MemoryUploader {
    async fn upload(&self, local: &Path) -> StorageResult<UploadReceipt> {
        let bytes = tokio::fs::metadata(local).await?.len();
        Ok(UploadReceipt {
            remote_id: "memory-object".to_string(),
            bytes,
        })
    }

    async fn download(
        &self,
        remote_id: &str,
        _destination_name: &str,
        _destination_dir: &Path,
    ) -> StorageResult<PathBuf> {
        Err(StorageError::NotFound(remote_id.to_string()))
    }

    async fn health_check(&self) -> StorageResult<()> {
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[async_trait]
impl BackendConnector for MemoryConnector {
    async fn connect(&self, backend: &ProviderBackend) -> StorageResult<Arc<dyn ProviderUploader>> {
        assert_eq!(backend.kind(), ProviderKind::Dropbox);
        self.connects.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(MemoryUploader))
    }
}

#[tokio::test]
async fn test_registered_connector_serves_its_kind() {
    let connector = Arc::new(MemoryConnector {
        connects: AtomicUsize::new(0),
    });
    let factory =
        DefaultUploaderFactory::new().with_connector(ProviderKind::Dropbox, connector.clone());
    assert!(factory.supports(ProviderKind::Dropbox));
    assert!(!factory.supports(ProviderKind::GoogleDrive));

    let credential = serde_json::json!({
        "RefreshToken": "r",
        "AppKey": "k",
        "AppSecret": "s",
        "Folder": "/vault"
    })
    .to_string();
    let uploader = factory
        .build_from_blob(ProviderKind::Dropbox, &credential)
        .await
        .unwrap();
    assert_eq!(uploader.backend_name(), "memory");
    assert_eq!(connector.connects.load(Ordering::SeqCst), 1);

    let dir = tempfile::tempdir().unwrap();
    let local = write_chunk(dir.path(), "aa-0.shas", b"abc").await;
    assert_eq!(uploader.upload(&local).await.unwrap().bytes, 3);
}
