//! Capacity-aware distribution of staged chunk files across providers.
//!
//! Each file is matched to a provider by rotating through the batch's
//! eligible providers, skipping any whose working usage plus the per-chunk
//! estimate would exceed capacity. Before the transfer starts, the file's
//! real size is reserved with a conditional update in the store, so
//! concurrent batches can never commit past a provider's capacity. A failed
//! transfer gives the reservation back.

use crate::checksum::file_checksum;
use crate::error::{PipelineError, PipelineResult};
use coldvault_core::config::DistributionConfig;
use coldvault_metadata::{MetadataStore, Placement, Provider, ProviderRepo, RecordStore};
use coldvault_storage::{ProviderUploader, UploaderFactory};
use futures::{StreamExt, stream};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use time::OffsetDateTime;
use tokio::fs;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

/// What happened to one staged file.
#[derive(Debug)]
pub enum FileOutcome {
    Uploaded {
        provider_id: Uuid,
        remote_id: String,
        bytes: i64,
    },
    Failed(PipelineError),
    /// Skipped because the batch was cancelled first. Safe to resubmit.
    NotAttempted,
}

impl FileOutcome {
    pub fn is_uploaded(&self) -> bool {
        matches!(self, FileOutcome::Uploaded { .. })
    }
}

/// Per-file accounting for one distribution run. Every staged file appears
/// exactly once.
#[derive(Debug, Default)]
pub struct BatchReport {
    outcomes: BTreeMap<PathBuf, FileOutcome>,
}

impl BatchReport {
    pub fn outcomes(&self) -> &BTreeMap<PathBuf, FileOutcome> {
        &self.outcomes
    }

    pub fn get(&self, path: &Path) -> Option<&FileOutcome> {
        self.outcomes.get(path)
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn uploaded(&self) -> usize {
        self.outcomes.values().filter(|o| o.is_uploaded()).count()
    }

    pub fn failed(&self) -> impl Iterator<Item = (&PathBuf, &PipelineError)> {
        self.outcomes.iter().filter_map(|(path, outcome)| match outcome {
            FileOutcome::Failed(e) => Some((path, e)),
            _ => None,
        })
    }

    pub fn not_attempted(&self) -> impl Iterator<Item = &PathBuf> {
        self.outcomes
            .iter()
            .filter(|(_, o)| matches!(o, FileOutcome::NotAttempted))
            .map(|(path, _)| path)
    }

    /// Collapse to `path -> uploaded`.
    pub fn into_success_map(self) -> HashMap<PathBuf, bool> {
        self.outcomes
            .into_iter()
            .map(|(path, outcome)| (path, outcome.is_uploaded()))
            .collect()
    }
}

/// Engine state shared by the workers of one batch.
struct Batch {
    providers: Mutex<Vec<Provider>>,
    uploaders: HashMap<Uuid, Arc<dyn ProviderUploader>>,
    cursor: AtomicUsize,
    cancel: CancellationToken,
}

/// Places staged chunk files on providers and records where they went.
pub struct DistributionEngine {
    store: Arc<dyn MetadataStore>,
    placements: RecordStore<Placement>,
    factory: Arc<dyn UploaderFactory>,
    config: DistributionConfig,
}

impl DistributionEngine {
    pub fn new(
        store: Arc<dyn MetadataStore>,
        factory: Arc<dyn UploaderFactory>,
        config: DistributionConfig,
    ) -> Self {
        Self {
            placements: RecordStore::new(store.clone()),
            store,
            factory,
            config,
        }
    }

    pub fn config(&self) -> &DistributionConfig {
        &self.config
    }

    /// Distribute every file in `staging_dir`.
    ///
    /// Fails as a whole only when the batch cannot start: unreadable staging
    /// directory, no eligible provider, unusable provider credential.
    /// Everything after that is reported per file.
    #[instrument(skip(self, cancel), fields(staging = %staging_dir.display()))]
    pub async fn upload_folder(
        &self,
        staging_dir: &Path,
        cancel: CancellationToken,
    ) -> PipelineResult<BatchReport> {
        let files = staged_files(staging_dir).await?;
        let providers = self.eligible_providers(&cancel).await?;
        if providers.is_empty() {
            error!(floor = self.config.batch_eligibility_floor, "No eligible provider");
            return Err(PipelineError::NoValidProvider {
                floor: self.config.batch_eligibility_floor,
            });
        }

        let mut uploaders = HashMap::with_capacity(providers.len());
        for provider in &providers {
            let uploader = self
                .factory
                .build_from_blob(provider.kind, &provider.credential)
                .await?;
            uploaders.insert(provider.id, uploader);
        }
        info!(
            providers = providers.len(),
            files = files.len(),
            "Starting distribution"
        );

        let batch = Batch {
            providers: Mutex::new(providers),
            uploaders,
            cursor: AtomicUsize::new(0),
            cancel,
        };

        let outcomes: BTreeMap<PathBuf, FileOutcome> = stream::iter(files)
            .map(|path| {
                let batch = &batch;
                async move {
                    let outcome = self.distribute_file(batch, &path).await;
                    (path, outcome)
                }
            })
            .buffer_unordered(self.config.parallelism())
            .collect()
            .await;

        let report = BatchReport { outcomes };
        info!(
            uploaded = report.uploaded(),
            total = report.len(),
            "Distribution finished"
        );
        Ok(report)
    }

    /// Eligible providers, retrying with exponential backoff while the store
    /// is unreachable.
    async fn eligible_providers(&self, cancel: &CancellationToken) -> PipelineResult<Vec<Provider>> {
        let floor = self.config.batch_eligibility_floor;
        let attempts = self.config.provider_fetch_attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.store.eligible_providers(floor).await {
                Ok(providers) => return Ok(providers),
                Err(e) if e.is_connection() && attempt < attempts => {
                    let delay = self.config.retry_delay(attempt);
                    warn!(
                        attempt,
                        attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Provider lookup failed, retrying"
                    );
                    tokio::select! {
                        _ = cancel.cancelled() => return Err(PipelineError::Cancelled),
                        _ = tokio::time::sleep(delay) => {}
                    }
                    attempt += 1;
                }
                Err(e) => {
                    error!(attempt, error = %e, "Provider lookup failed");
                    return Err(e.into());
                }
            }
        }
    }

    async fn distribute_file(&self, batch: &Batch, path: &Path) -> FileOutcome {
        if batch.cancel.is_cancelled() {
            return FileOutcome::NotAttempted;
        }
        let start = batch.cursor.fetch_add(1, Ordering::Relaxed);
        match self.place(batch, path, start).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(file = %path.display(), error = %e, "Chunk file not placed");
                FileOutcome::Failed(e)
            }
        }
    }

    async fn place(&self, batch: &Batch, path: &Path, start: usize) -> PipelineResult<FileOutcome> {
        let chunk_name = chunk_name_of(path)?;
        let (checksum, size) = file_checksum(path).await?;
        let size = i64::try_from(size)
            .map_err(|_| PipelineError::InvalidArgument(format!("{} is too large", path.display())))?;

        let provider = self.claim(batch, start, size).await?;
        if batch.cancel.is_cancelled() {
            self.give_back(batch, provider.id, size).await;
            return Ok(FileOutcome::NotAttempted);
        }
        let Some(uploader) = batch.uploaders.get(&provider.id) else {
            self.give_back(batch, provider.id, size).await;
            return Err(PipelineError::NotFound(format!("uploader for provider {}", provider.id)));
        };

        let transfer = tokio::select! {
            _ = batch.cancel.cancelled() => Err(PipelineError::Cancelled),
            result = uploader.upload(path) => result.map_err(PipelineError::from),
        };
        let receipt = match transfer {
            Ok(receipt) => receipt,
            Err(e) => {
                self.give_back(batch, provider.id, size).await;
                return Err(e);
            }
        };

        let size = self.settle(batch, provider.id, size, receipt.bytes).await;

        let placement = Placement {
            chunk_name: chunk_name.clone(),
            provider_id: provider.id,
            remote_id: Some(receipt.remote_id.clone()),
            size_bytes: size,
            checksum: Some(checksum),
            placed_at: OffsetDateTime::now_utc(),
        };
        let recorded = match self.placements.insert(std::slice::from_ref(&placement)).await {
            Ok(1) => Ok(()),
            Ok(_) => Err(PipelineError::NotRecorded(format!("placement of {chunk_name}"))),
            Err(e) => Err(e.into()),
        };
        if let Err(e) = recorded {
            // Without a placement row the uploaded object cannot be found again.
            self.give_back(batch, provider.id, size).await;
            return Err(e);
        }

        debug!(
            chunk = %chunk_name,
            provider = %provider.id,
            bytes = size,
            "Placed chunk"
        );
        Ok(FileOutcome::Uploaded {
            provider_id: provider.id,
            remote_id: receipt.remote_id,
            bytes: size,
        })
    }

    /// Pick a provider starting at `start` and reserve `size` bytes on it.
    ///
    /// Tries at most twice per provider. The working view of a provider is
    /// refreshed from the store whenever the store refuses a reservation.
    async fn claim(&self, batch: &Batch, start: usize, size: i64) -> PipelineResult<Provider> {
        let required = self.config.per_chunk_required_space;
        let mut providers = batch.providers.lock().await;
        let count = providers.len();

        for attempt in 0..count * 2 {
            let index = (start + attempt) % count;
            let candidate = &providers[index];
            if !candidate.can_fit(required) {
                continue;
            }
            let id = candidate.id;
            if self.store.reserve_capacity(id, size).await? {
                providers[index].consumed_bytes += size;
                return Ok(providers[index].clone());
            }
            debug!(provider = %id, size, "Reservation refused, refreshing provider");
            match self.store.get_provider(id).await? {
                Some(fresh) => providers[index] = fresh,
                None => providers[index].consumed_bytes = providers[index].capacity_bytes,
            }
        }

        error!(required, size, "All providers are at capacity");
        Err(PipelineError::AllProvidersAtCapacity { required })
    }

    /// Bring the reservation in line with the bytes the backend reports
    /// having stored. Returns the size now accounted on the provider.
    async fn settle(&self, batch: &Batch, id: Uuid, reserved: i64, transferred: u64) -> i64 {
        let Ok(transferred) = i64::try_from(transferred) else {
            warn!(provider = %id, reserved, transferred, "Transferred size out of range, keeping reservation");
            return reserved;
        };
        if transferred == reserved {
            return reserved;
        }
        warn!(provider = %id, reserved, transferred, "Transferred size differs from staged file");

        if transferred < reserved {
            self.give_back(batch, id, reserved - transferred).await;
            return transferred;
        }
        let extra = transferred - reserved;
        match self.store.reserve_capacity(id, extra).await {
            Ok(true) => {
                let mut providers = batch.providers.lock().await;
                if let Some(provider) = providers.iter_mut().find(|p| p.id == id) {
                    provider.consumed_bytes += extra;
                }
                transferred
            }
            Ok(false) => {
                warn!(provider = %id, extra, "Provider cannot account the extra bytes");
                reserved
            }
            Err(e) => {
                error!(provider = %id, extra, error = %e, "Could not account the extra bytes");
                reserved
            }
        }
    }

    /// Release a reservation taken by [`claim`](Self::claim).
    ///
    /// Connection failures are retried with the provider lookup backoff.
    async fn give_back(&self, batch: &Batch, id: Uuid, size: i64) {
        let attempts = self.config.provider_fetch_attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.store.release_capacity(id, size).await {
                Ok(()) => break,
                Err(e) if e.is_connection() && attempt < attempts => {
                    let delay = self.config.retry_delay(attempt);
                    warn!(provider = %id, size, attempt, error = %e, "Release failed, retrying");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    error!(
                        provider = %id,
                        size,
                        error = %e,
                        "Could not release reservation; provider usage stays inflated"
                    );
                    return;
                }
            }
        }
        let mut providers = batch.providers.lock().await;
        if let Some(provider) = providers.iter_mut().find(|p| p.id == id) {
            provider.consumed_bytes = (provider.consumed_bytes - size).max(0);
        }
    }
}

/// Chunk name recorded for a staged file: its name without the extension.
fn chunk_name_of(path: &Path) -> PipelineResult<String> {
    path.file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .ok_or_else(|| {
            PipelineError::InvalidArgument(format!("unusable chunk file name: {}", path.display()))
        })
}

/// Regular files directly inside the staging directory, in name order.
async fn staged_files(staging_dir: &Path) -> PipelineResult<Vec<PathBuf>> {
    let mut entries = fs::read_dir(staging_dir)
        .await
        .map_err(|e| PipelineError::io(staging_dir, e))?;
    let mut files = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| PipelineError::io(staging_dir, e))?
    {
        let is_file = entry
            .file_type()
            .await
            .map_err(|e| PipelineError::io(entry.path(), e))?
            .is_file();
        if is_file {
            files.push(entry.path());
        }
    }
    files.sort();
    Ok(files)
}
