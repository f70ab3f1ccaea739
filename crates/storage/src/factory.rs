//! Provider adapter construction.

use crate::backends::{filesystem::FilesystemUploader, s3::S3Uploader};
use crate::credentials::ProviderBackend;
use crate::error::{StorageError, StorageResult};
use crate::traits::ProviderUploader;
use async_trait::async_trait;
use coldvault_core::ProviderKind;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Connects one backend kind whose client lives outside this crate.
#[async_trait]
pub trait BackendConnector: Send + Sync {
    async fn connect(&self, backend: &ProviderBackend) -> StorageResult<Arc<dyn ProviderUploader>>;
}

/// Builds an uploader for a provider's kind and credential.
#[async_trait]
pub trait UploaderFactory: Send + Sync {
    async fn build(&self, backend: &ProviderBackend) -> StorageResult<Arc<dyn ProviderUploader>>;

    /// Decode a stored credential blob, then build.
    async fn build_from_blob(
        &self,
        kind: ProviderKind,
        credential: &str,
    ) -> StorageResult<Arc<dyn ProviderUploader>> {
        let backend = ProviderBackend::decode(kind, credential)?;
        self.build(&backend).await
    }
}

/// Builds S3 and filesystem adapters directly and hands other kinds to
/// registered connectors.
#[derive(Default, Clone)]
pub struct DefaultUploaderFactory {
    connectors: HashMap<ProviderKind, Arc<dyn BackendConnector>>,
}

impl DefaultUploaderFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connector for `kind`, replacing any earlier one.
    pub fn with_connector(mut self, kind: ProviderKind, connector: Arc<dyn BackendConnector>) -> Self {
        self.connectors.insert(kind, connector);
        self
    }

    pub fn supports(&self, kind: ProviderKind) -> bool {
        matches!(kind, ProviderKind::S3 | ProviderKind::Filesystem) || self.connectors.contains_key(&kind)
    }
}

#[async_trait]
impl UploaderFactory for DefaultUploaderFactory {
    async fn build(&self, backend: &ProviderBackend) -> StorageResult<Arc<dyn ProviderUploader>> {
        let kind = backend.kind();
        if let Some(connector) = self.connectors.get(&kind) {
            debug!(%kind, "building uploader through connector");
            return connector.connect(backend).await;
        }
        match backend {
            ProviderBackend::S3(secret) => Ok(Arc::new(S3Uploader::new(secret)?)),
            ProviderBackend::Filesystem(secret) => {
                Ok(Arc::new(FilesystemUploader::new(&secret.root).await?))
            }
            ProviderBackend::GoogleDrive(_) | ProviderBackend::Dropbox(_) => {
                Err(StorageError::BackendUnavailable(kind))
            }
        }
    }
}
