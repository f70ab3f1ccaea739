//! Encrypt-then-chunk preparation of files into a staging directory.

use crate::encryption::{EncryptionKeys, Encryptor, encryptor_for};
use crate::error::{PipelineError, PipelineResult};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use coldvault_core::config::PreparationConfig;
use coldvault_core::{EncryptionScheme, InputKind, SerializedName};
use coldvault_metadata::{ChunkInformation, MetadataStore, RecordStore};
use futures::{StreamExt, stream};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use time::OffsetDateTime;
use tokio::fs;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// One input file that could not be prepared.
#[derive(Debug)]
pub struct PreparationFailure {
    pub path: PathBuf,
    pub error: PipelineError,
}

/// Result of preparing a file or folder.
#[derive(Debug)]
pub struct PreparationReport {
    /// Directory holding the chunk files, ready for distribution.
    pub staging_dir: PathBuf,
    pub folder_name: String,
    pub prepared: Vec<ChunkInformation>,
    pub failed: Vec<PreparationFailure>,
}

impl PreparationReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Turns input files into chunk files plus one chunk information row each.
pub struct ColdStoragePreparator {
    chunk_info: RecordStore<ChunkInformation>,
    config: PreparationConfig,
    keys: Option<EncryptionKeys>,
}

impl ColdStoragePreparator {
    pub fn new(store: Arc<dyn MetadataStore>, config: PreparationConfig) -> Self {
        Self {
            chunk_info: RecordStore::new(store),
            config,
            keys: None,
        }
    }

    /// Key material used when AES is requested.
    pub fn with_keys(mut self, keys: EncryptionKeys) -> Self {
        self.keys = Some(keys);
        self
    }

    pub fn config(&self) -> &PreparationConfig {
        &self.config
    }

    /// Prepare `path` with the encryptor for `scheme`.
    ///
    /// `chunk_size` overrides the configured size when given.
    pub async fn prepare(
        &self,
        path: &Path,
        kind: InputKind,
        scheme: EncryptionScheme,
        chunk_size: Option<usize>,
    ) -> PipelineResult<PreparationReport> {
        let encryptor = encryptor_for(scheme, self.keys.as_ref())?;
        self.prepare_with(path, kind, encryptor, chunk_size.unwrap_or(self.config.chunk_size))
            .await
    }

    /// Prepare `path` with a caller-supplied encryptor.
    ///
    /// A file that fails is reported in the result and leaves no chunk files
    /// behind; the remaining files are still prepared.
    #[instrument(skip(self, encryptor), fields(scheme = %encryptor.scheme()))]
    pub async fn prepare_with(
        &self,
        path: &Path,
        kind: InputKind,
        encryptor: Arc<dyn Encryptor>,
        chunk_size: usize,
    ) -> PipelineResult<PreparationReport> {
        if chunk_size == 0 {
            return Err(PipelineError::InvalidArgument(
                "chunk size must be positive".to_string(),
            ));
        }
        let (folder_name, inputs) = collect_inputs(path, kind).await?;

        let staging_dir = self.config.staging_root.join(Uuid::new_v4().to_string());
        fs::create_dir_all(&staging_dir)
            .await
            .map_err(|e| PipelineError::io(&staging_dir, e))?;
        info!(
            staging = %staging_dir.display(),
            folder = %folder_name,
            files = inputs.len(),
            chunk_size,
            "Preparing files"
        );

        let results: Vec<(PathBuf, PipelineResult<ChunkInformation>)> = stream::iter(inputs)
            .map(|input| {
                let encryptor = encryptor.clone();
                let staging_dir = &staging_dir;
                let folder_name = &folder_name;
                async move {
                    let result = self
                        .prepare_file(&input, folder_name, staging_dir, encryptor, chunk_size)
                        .await;
                    (input, result)
                }
            })
            .buffer_unordered(self.config.parallelism())
            .collect()
            .await;

        let mut report = PreparationReport {
            staging_dir,
            folder_name,
            prepared: Vec::new(),
            failed: Vec::new(),
        };
        for (path, result) in results {
            match result {
                Ok(info) => report.prepared.push(info),
                Err(error) => {
                    warn!(path = %path.display(), error = %error, "File preparation failed");
                    report.failed.push(PreparationFailure { path, error });
                }
            }
        }
        info!(
            prepared = report.prepared.len(),
            failed = report.failed.len(),
            "Preparation finished"
        );
        Ok(report)
    }

    async fn prepare_file(
        &self,
        input: &Path,
        folder_name: &str,
        staging_dir: &Path,
        encryptor: Arc<dyn Encryptor>,
        chunk_size: usize,
    ) -> PipelineResult<ChunkInformation> {
        let file_name = input
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                PipelineError::InvalidArgument(format!("unusable file name: {}", input.display()))
            })?
            .to_string();
        let plaintext = fs::read(input)
            .await
            .map_err(|e| PipelineError::io(input, e))?;
        let original_bytes = i64::try_from(plaintext.len()).map_err(|_| {
            PipelineError::InvalidArgument(format!("{} is too large", input.display()))
        })?;

        let scheme = encryptor.scheme();
        let encoded = tokio::task::spawn_blocking(move || {
            encryptor
                .encrypt(&plaintext)
                .map(|ciphertext| STANDARD.encode(ciphertext))
        })
        .await
        .map_err(|e| PipelineError::Encryption(format!("encryption task failed: {e}")))??;
        let total_chunks = chunk_total(encoded.len(), chunk_size)?;

        let serialized_name = SerializedName::generate();
        let written = self
            .write_chunks(&serialized_name, encoded.as_bytes(), staging_dir, chunk_size)
            .await;
        let paths = match written {
            Ok(paths) => paths,
            Err((paths, error)) => {
                remove_all(&paths).await;
                return Err(error);
            }
        };

        let info = ChunkInformation {
            file_name,
            folder_name: folder_name.to_string(),
            total_chunks: i64::from(total_chunks),
            encryption: scheme,
            serialized_name,
            original_bytes: Some(original_bytes),
            prepared_at: OffsetDateTime::now_utc(),
        };

        match self.chunk_info.insert(std::slice::from_ref(&info)).await {
            Ok(1) => {
                debug!(
                    file = %info.file_name,
                    serialized = %info.serialized_name,
                    chunks = info.total_chunks,
                    "Prepared file"
                );
                Ok(info)
            }
            Ok(_) => {
                remove_all(&paths).await;
                Err(PipelineError::NotRecorded(format!(
                    "chunk information for {}",
                    info.file_name
                )))
            }
            Err(e) => {
                remove_all(&paths).await;
                Err(e.into())
            }
        }
    }

    /// Write one file per chunk. On failure, returns the files written so far.
    async fn write_chunks(
        &self,
        serialized_name: &SerializedName,
        encoded: &[u8],
        staging_dir: &Path,
        chunk_size: usize,
    ) -> Result<Vec<PathBuf>, (Vec<PathBuf>, PipelineError)> {
        let pieces = match coldvault_core::chunk(encoded, chunk_size) {
            Ok(pieces) => pieces,
            Err(e) => return Err((Vec::new(), PipelineError::from(e))),
        };
        let mut paths = Vec::with_capacity(pieces.len());
        for (piece, index) in pieces.zip(0u32..) {
            let name = serialized_name
                .chunk(index)
                .file_name(&self.config.chunk_extension);
            let path = staging_dir.join(name);
            if let Err(e) = fs::write(&path, piece).await {
                return Err((paths, PipelineError::io(&path, e)));
            }
            paths.push(path);
        }
        Ok(paths)
    }
}

/// Files to prepare and the folder name they are recorded under.
///
/// A single file is recorded under its stem. A folder contributes its
/// top-level regular files, in name order.
async fn collect_inputs(path: &Path, kind: InputKind) -> PipelineResult<(String, Vec<PathBuf>)> {
    let meta = fs::metadata(path)
        .await
        .map_err(|e| PipelineError::io(path, e))?;
    let stem_or_name = |p: &Path, stem: bool| {
        let part = if stem { p.file_stem() } else { p.file_name() };
        part.and_then(|n| n.to_str()).map(str::to_string)
    };

    match kind {
        InputKind::SingleFile => {
            if !meta.is_file() {
                return Err(PipelineError::InvalidArgument(format!(
                    "{} is not a file",
                    path.display()
                )));
            }
            let folder = stem_or_name(path, true).ok_or_else(|| {
                PipelineError::InvalidArgument(format!("unusable file name: {}", path.display()))
            })?;
            Ok((folder, vec![path.to_path_buf()]))
        }
        InputKind::Folder => {
            if !meta.is_dir() {
                return Err(PipelineError::InvalidArgument(format!(
                    "{} is not a directory",
                    path.display()
                )));
            }
            let folder = stem_or_name(path, false).unwrap_or_else(|| "root".to_string());
            let mut entries = fs::read_dir(path)
                .await
                .map_err(|e| PipelineError::io(path, e))?;
            let mut files = Vec::new();
            while let Some(entry) = entries
                .next_entry()
                .await
                .map_err(|e| PipelineError::io(path, e))?
            {
                let file_type = entry
                    .file_type()
                    .await
                    .map_err(|e| PipelineError::io(entry.path(), e))?;
                if file_type.is_file() {
                    files.push(entry.path());
                }
            }
            files.sort();
            Ok((folder, files))
        }
    }
}

async fn remove_all(paths: &[PathBuf]) {
    for path in paths {
        if let Err(e) = fs::remove_file(path).await {
            warn!(path = %path.display(), error = %e, "Could not remove partial chunk file");
        }
    }
}

/// Chunk count for an encoded payload, bounded by the chunk index width.
fn chunk_total(len: usize, chunk_size: usize) -> PipelineResult<u32> {
    let count = coldvault_core::chunk_count(len, chunk_size)?;
    u32::try_from(count).map_err(|_| {
        PipelineError::InvalidArgument(format!(
            "{count} chunks exceed the chunk index range; raise the chunk size"
        ))
    })
}
