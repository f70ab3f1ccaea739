//! Reassembly of prepared files from their placed chunks.

use crate::checksum::file_checksum;
use crate::encryption::{EncryptionKeys, encryptor_for};
use crate::error::{PipelineError, PipelineResult};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use coldvault_core::SerializedName;
use coldvault_metadata::{
    ChunkInformation, MetadataStore, Placement, ProviderRepo, RecordStore, WhereClause,
};
use coldvault_storage::{ProviderUploader, UploaderFactory};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// Downloads, verifies, decodes and decrypts a prepared file.
pub struct Restorer {
    store: Arc<dyn MetadataStore>,
    chunk_info: RecordStore<ChunkInformation>,
    placements: RecordStore<Placement>,
    factory: Arc<dyn UploaderFactory>,
    keys: Option<EncryptionKeys>,
}

impl Restorer {
    pub fn new(store: Arc<dyn MetadataStore>, factory: Arc<dyn UploaderFactory>) -> Self {
        Self {
            chunk_info: RecordStore::new(store.clone()),
            placements: RecordStore::new(store.clone()),
            store,
            factory,
            keys: None,
        }
    }

    pub fn with_keys(mut self, keys: EncryptionKeys) -> Self {
        self.keys = Some(keys);
        self
    }

    /// Rebuild the file prepared as `serialized` inside `destination_dir`,
    /// under its original name. Returns the written path.
    #[instrument(skip(self), fields(serialized = %serialized))]
    pub async fn restore(
        &self,
        serialized: &SerializedName,
        destination_dir: &Path,
    ) -> PipelineResult<PathBuf> {
        let info = self
            .chunk_info
            .search(&[WhereClause::eq("serialized_name", serialized.as_str())])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| PipelineError::NotFound(format!("chunk information for {serialized}")))?;
        let target = plain_target(&info.file_name, destination_dir)?;
        let encryptor = encryptor_for(info.encryption, self.keys.as_ref())?;

        let work_dir = destination_dir.join(format!(".restore-{serialized}"));
        fs::create_dir_all(&work_dir)
            .await
            .map_err(|e| PipelineError::io(&work_dir, e))?;
        let gathered = self.gather(&info, &work_dir).await;
        if let Err(e) = fs::remove_dir_all(&work_dir).await {
            warn!(dir = %work_dir.display(), error = %e, "Could not remove restore scratch directory");
        }
        let encoded = gathered?;

        let plaintext = tokio::task::spawn_blocking(move || {
            let ciphertext = STANDARD.decode(&encoded).map_err(|e| {
                PipelineError::InvalidArgument(format!("reassembled payload is not base64: {e}"))
            })?;
            encryptor.decrypt(&ciphertext)
        })
        .await
        .map_err(|e| PipelineError::Encryption(format!("decryption task failed: {e}")))??;

        fs::write(&target, &plaintext)
            .await
            .map_err(|e| PipelineError::io(&target, e))?;
        info!(
            file = %target.display(),
            chunks = info.total_chunks,
            bytes = plaintext.len(),
            "Restored file"
        );
        Ok(target)
    }

    /// Download every chunk in index order and concatenate their contents.
    async fn gather(&self, info: &ChunkInformation, work_dir: &Path) -> PipelineResult<Vec<u8>> {
        let mut uploaders: HashMap<Uuid, Arc<dyn ProviderUploader>> = HashMap::new();
        let mut encoded = Vec::new();

        for chunk in info.chunk_names()? {
            let name = chunk.to_string();
            let placement = self
                .placements
                .search(&[WhereClause::eq("chunk_name", name.as_str())])
                .await?
                .into_iter()
                .next()
                .ok_or_else(|| PipelineError::NotFound(format!("placement of {name}")))?;

            let uploader = match uploaders.get(&placement.provider_id) {
                Some(uploader) => uploader.clone(),
                None => {
                    let provider = self
                        .store
                        .get_provider(placement.provider_id)
                        .await?
                        .ok_or_else(|| {
                            PipelineError::NotFound(format!("provider {}", placement.provider_id))
                        })?;
                    let uploader = self
                        .factory
                        .build_from_blob(provider.kind, &provider.credential)
                        .await?;
                    uploaders.insert(provider.id, uploader.clone());
                    uploader
                }
            };

            let remote_id = placement.remote_id.as_deref().unwrap_or(name.as_str());
            let local = uploader.download(remote_id, &name, work_dir).await?;
            if let Some(expected) = &placement.checksum {
                let (actual, _) = file_checksum(&local).await?;
                if &actual != expected {
                    return Err(PipelineError::ChecksumMismatch {
                        chunk: name,
                        expected: expected.clone(),
                        actual,
                    });
                }
            }
            let body = fs::read(&local)
                .await
                .map_err(|e| PipelineError::io(&local, e))?;
            debug!(chunk = %name, bytes = body.len(), "Fetched chunk");
            encoded.extend_from_slice(&body);
        }
        Ok(encoded)
    }
}

fn plain_target(file_name: &str, destination_dir: &Path) -> PipelineResult<PathBuf> {
    let plain = Path::new(file_name).file_name().and_then(|n| n.to_str()) == Some(file_name);
    if file_name.is_empty() || !plain {
        return Err(PipelineError::InvalidArgument(format!(
            "recorded file name is not a plain name: {file_name}"
        )));
    }
    Ok(destination_dir.join(file_name))
}
