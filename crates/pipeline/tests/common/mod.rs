//! Shared helpers for pipeline integration tests.

#![allow(dead_code)]

pub mod mocks;

use coldvault_core::ProviderKind;
use coldvault_core::config::{AppConfig, DistributionConfig};
use coldvault_metadata::{MetadataStore, Provider, RecordStore, SqliteStore, TableRegistry};
use coldvault_storage::DefaultUploaderFactory;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

/// A scratch workspace with a migrated SQLite store.
pub struct TestVault {
    pub store: Arc<dyn MetadataStore>,
    pub config: AppConfig,
    pub temp_dir: TempDir,
}

impl TestVault {
    pub async fn new() -> Self {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
        let config = AppConfig::for_testing(temp_dir.path());
        let store: Arc<dyn MetadataStore> = Arc::new(
            SqliteStore::new(temp_dir.path().join("vault.db"))
                .await
                .expect("Failed to open store"),
        );
        TableRegistry::standard()
            .create_tables_if_not_exist(store.as_ref())
            .await
            .expect("Failed to create tables");
        Self {
            store,
            config,
            temp_dir,
        }
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Distribution settings with small numbers suited to byte-sized files.
    pub fn distribution(&self, floor: i64, per_chunk: i64) -> DistributionConfig {
        DistributionConfig {
            batch_eligibility_floor: floor,
            per_chunk_required_space: per_chunk,
            ..self.config.distribution.clone()
        }
    }

    /// Insert a directory-backed provider rooted at `<tmp>/providers/<name>`.
    pub async fn filesystem_provider(&self, name: &str, capacity: i64, consumed: i64) -> Provider {
        let root = self.provider_root(name);
        let credential = serde_json::json!({ "Root": root }).to_string();
        self.insert_provider(ProviderKind::Filesystem, &credential, capacity, consumed)
            .await
    }

    pub async fn insert_provider(
        &self,
        kind: ProviderKind,
        credential: &str,
        capacity: i64,
        consumed: i64,
    ) -> Provider {
        let mut provider = Provider::new(kind, credential, capacity);
        provider.consumed_bytes = consumed;
        let inserted = RecordStore::<Provider>::new(self.store.clone())
            .insert(std::slice::from_ref(&provider))
            .await
            .expect("Failed to insert provider");
        assert_eq!(inserted, 1);
        provider
    }

    /// Id of the filesystem provider created for `name`.
    pub async fn filesystem_provider_id(&self, name: &str) -> uuid::Uuid {
        let root = serde_json::json!({ "Root": self.provider_root(name) }).to_string();
        RecordStore::<Provider>::new(self.store.clone())
            .search(&[])
            .await
            .unwrap()
            .into_iter()
            .find(|p| p.credential == root)
            .expect("provider for name")
            .id
    }

    pub fn provider_root(&self, name: &str) -> PathBuf {
        self.path().join("providers").join(name)
    }

    /// A staging directory holding `count` files of `size` bytes each.
    pub async fn staging_with(&self, name: &str, count: usize, size: usize) -> PathBuf {
        let dir = self.path().join("staged").join(name);
        tokio::fs::create_dir_all(&dir).await.unwrap();
        for i in 0..count {
            let body = vec![b'a' + (i % 26) as u8; size];
            tokio::fs::write(dir.join(format!("{name}-{i}.shas")), body)
                .await
                .unwrap();
        }
        dir
    }

    pub async fn provider(&self, id: uuid::Uuid) -> Provider {
        use coldvault_metadata::ProviderRepo;
        self.store
            .get_provider(id)
            .await
            .unwrap()
            .expect("provider row")
    }

    pub fn factory(&self) -> Arc<DefaultUploaderFactory> {
        Arc::new(DefaultUploaderFactory::new())
    }
}
