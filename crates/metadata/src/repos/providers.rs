//! Provider registry repository.

use crate::error::MetadataResult;
use crate::models::Provider;
use async_trait::async_trait;
use uuid::Uuid;

/// Capacity queries and accounting for providers.
///
/// Usage counters only move through the conditional updates here, so two
/// writers can never both commit past a provider's capacity.
#[async_trait]
pub trait ProviderRepo: Send + Sync {
    /// Providers with at least `floor` bytes free.
    async fn eligible_providers(&self, floor: i64) -> MetadataResult<Vec<Provider>>;

    /// Add `bytes` to a provider's usage if the result stays within capacity.
    ///
    /// Returns whether the reservation applied.
    async fn reserve_capacity(&self, id: Uuid, bytes: i64) -> MetadataResult<bool>;

    /// Give back `bytes` of a provider's usage, never going below zero.
    async fn release_capacity(&self, id: Uuid, bytes: i64) -> MetadataResult<()>;

    /// Change a provider's capacity. Refused (returns false) when the new
    /// capacity is below current usage or the provider does not exist.
    async fn set_capacity(&self, id: Uuid, capacity: i64) -> MetadataResult<bool>;

    /// Current row for one provider.
    async fn get_provider(&self, id: Uuid) -> MetadataResult<Option<Provider>>;
}
