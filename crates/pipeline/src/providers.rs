//! Provider registration and capacity management.

use crate::error::{PipelineError, PipelineResult};
use coldvault_core::ProviderKind;
use coldvault_metadata::{MetadataStore, Provider, ProviderRepo, RecordStore};
use coldvault_storage::ProviderBackend;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// Adds, lists and resizes storage providers.
pub struct ProviderRegistry {
    store: Arc<dyn MetadataStore>,
    providers: RecordStore<Provider>,
}

impl ProviderRegistry {
    pub fn new(store: Arc<dyn MetadataStore>) -> Self {
        Self {
            providers: RecordStore::new(store.clone()),
            store,
        }
    }

    /// Register a provider after checking its credential decodes for `kind`.
    pub async fn register(
        &self,
        kind: ProviderKind,
        credential: &str,
        capacity_bytes: i64,
        label: Option<String>,
    ) -> PipelineResult<Provider> {
        if capacity_bytes < 0 {
            return Err(PipelineError::InvalidArgument(format!(
                "capacity must not be negative ({capacity_bytes})"
            )));
        }
        ProviderBackend::decode(kind, credential)?;

        let mut provider = Provider::new(kind, credential, capacity_bytes);
        provider.label = label.filter(|l| !l.trim().is_empty());
        match self.providers.insert(std::slice::from_ref(&provider)).await? {
            1 => {
                info!(provider = %provider.id, %kind, capacity_bytes, "Registered provider");
                Ok(provider)
            }
            _ => Err(PipelineError::NotRecorded(format!("provider {}", provider.id))),
        }
    }

    pub async fn list(&self) -> PipelineResult<Vec<Provider>> {
        Ok(self.providers.search(&[]).await?)
    }

    pub async fn get(&self, id: Uuid) -> PipelineResult<Provider> {
        self.store
            .get_provider(id)
            .await?
            .ok_or_else(|| PipelineError::NotFound(format!("provider {id}")))
    }

    /// Change a provider's capacity. Shrinking below current usage is refused.
    pub async fn resize(&self, id: Uuid, capacity_bytes: i64) -> PipelineResult<Provider> {
        if capacity_bytes < 0 {
            return Err(PipelineError::InvalidArgument(format!(
                "capacity must not be negative ({capacity_bytes})"
            )));
        }
        if !self.store.set_capacity(id, capacity_bytes).await? {
            let current = self.get(id).await?;
            return Err(PipelineError::InvalidArgument(format!(
                "provider {id} already uses {} bytes, more than {capacity_bytes}",
                current.consumed_bytes
            )));
        }
        info!(provider = %id, capacity_bytes, "Resized provider");
        self.get(id).await
    }
}
