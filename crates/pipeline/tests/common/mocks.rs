//! Test doubles for the store and provider seams.

use async_trait::async_trait;
use coldvault_metadata::sql::{Dialect, Statement};
use coldvault_metadata::{
    MetadataError, MetadataResult, MetadataStore, Provider, ProviderRepo, RecordRepo, RecordRow,
    TableDescriptor,
};
use coldvault_storage::{
    BackendConnector, ProviderBackend, ProviderUploader, StorageError, StorageResult,
    UploadReceipt,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Delegates to a real store but fails the first `failures` provider lookups
/// and the first `release_failures` releases with a connection error.
/// Optionally cancels a token as soon as a reservation is taken.
pub struct FlakyStore {
    inner: Arc<dyn MetadataStore>,
    failures: usize,
    release_failures: usize,
    cancel_on_reserve: Option<CancellationToken>,
    pub lookups: AtomicUsize,
    pub releases: AtomicUsize,
}

impl FlakyStore {
    pub fn new(inner: Arc<dyn MetadataStore>, failures: usize) -> Arc<Self> {
        Arc::new(Self::wrapping(inner, failures))
    }

    pub fn failing_releases(inner: Arc<dyn MetadataStore>, release_failures: usize) -> Arc<Self> {
        Arc::new(Self {
            release_failures,
            ..Self::wrapping(inner, 0)
        })
    }

    pub fn cancelling_on_reserve(inner: Arc<dyn MetadataStore>, token: CancellationToken) -> Arc<Self> {
        Arc::new(Self {
            cancel_on_reserve: Some(token),
            ..Self::wrapping(inner, 0)
        })
    }

    fn wrapping(inner: Arc<dyn MetadataStore>, failures: usize) -> Self {
        Self {
            inner,
            failures,
            release_failures: 0,
            cancel_on_reserve: None,
            lookups: AtomicUsize::new(0),
            releases: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl RecordRepo for FlakyStore {
    fn dialect(&self) -> Dialect {
        self.inner.dialect()
    }

    async fn execute(&self, statement: Statement) -> MetadataResult<u64> {
        self.inner.execute(statement).await
    }

    async fn fetch(
        &self,
        table: &'static TableDescriptor,
        statement: Statement,
    ) -> MetadataResult<Vec<RecordRow>> {
        self.inner.fetch(table, statement).await
    }

    async fn table_exists(&self, name: &str) -> MetadataResult<bool> {
        self.inner.table_exists(name).await
    }
}

#[async_trait]
impl ProviderRepo for FlakyStore {
    async fn eligible_providers(&self, floor: i64) -> MetadataResult<Vec<Provider>> {
        let seen = self.lookups.fetch_add(1, Ordering::SeqCst);
        if seen < self.failures {
            return Err(MetadataError::Connection(sqlx::Error::PoolTimedOut));
        }
        self.inner.eligible_providers(floor).await
    }

    async fn reserve_capacity(&self, id: Uuid, bytes: i64) -> MetadataResult<bool> {
        let applied = self.inner.reserve_capacity(id, bytes).await?;
        if let Some(token) = &self.cancel_on_reserve {
            token.cancel();
        }
        Ok(applied)
    }

    async fn release_capacity(&self, id: Uuid, bytes: i64) -> MetadataResult<()> {
        let seen = self.releases.fetch_add(1, Ordering::SeqCst);
        if seen < self.release_failures {
            return Err(MetadataError::Connection(sqlx::Error::PoolTimedOut));
        }
        self.inner.release_capacity(id, bytes).await
    }

    async fn set_capacity(&self, id: Uuid, capacity: i64) -> MetadataResult<bool> {
        self.inner.set_capacity(id, capacity).await
    }

    async fn get_provider(&self, id: Uuid) -> MetadataResult<Option<Provider>> {
        self.inner.get_provider(id).await
    }
}

#[async_trait]
impl MetadataStore for FlakyStore {
    async fn health_check(&self) -> MetadataResult<()> {
        self.inner.health_check().await
    }
}

/// Uploader whose transfers always fail, optionally after a delay.
pub struct FailingUploader {
    pub delay: Duration,
    pub attempts: AtomicUsize,
}

#[async_trait]
impl ProviderUploader for FailingUploader {
    async fn upload(&self, _local: &Path) -> StorageResult<UploadReceipt> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        Err(StorageError::upload_failed(
            "dropbox",
            StorageError::Connection {
                backend: "dropbox",
                reason: "connection reset".to_string(),
            },
        ))
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
        "dropbox"
    }
}

/// Uploader that stores nothing and reports a fixed transferred size.
pub struct MisreportingUploader {
    pub bytes: u64,
}

#[async_trait]
impl ProviderUploader for MisreportingUploader {
    async fn upload(&self, local: &Path) -> StorageResult<UploadReceipt> {
        let name = local
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();
        Ok(UploadReceipt {
            remote_id: name,
            bytes: self.bytes,
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
        "dropbox"
    }
}

/// Connector handing out one shared uploader for every provider of its kind.
pub struct FixedConnector {
    pub uploader: Arc<dyn ProviderUploader>,
}

#[async_trait]
impl BackendConnector for FixedConnector {
    async fn connect(&self, _backend: &ProviderBackend) -> StorageResult<Arc<dyn ProviderUploader>> {
        Ok(self.uploader.clone())
    }
}

pub fn dropbox_credential() -> String {
    r#"{"RefreshToken":"r","AppKey":"k","AppSecret":"s","Folder":"/cold"}"#.to_string()
}
