//! Shared helpers for metadata integration tests.

#![allow(dead_code)]

pub mod fixtures;

use coldvault_metadata::{MetadataResult, MetadataStore, SqliteStore, TableRegistry};
use std::sync::Arc;
use tempfile::TempDir;

/// A file-backed SQLite store that is removed on drop.
pub struct TestMetadata {
    pub store: Arc<dyn MetadataStore>,
    pub sqlite: Arc<SqliteStore>,
    _temp_dir: TempDir,
}

impl TestMetadata {
    /// Empty database without any tables.
    pub async fn new() -> MetadataResult<Self> {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
        let sqlite = Arc::new(SqliteStore::new(temp_dir.path().join("test.db")).await?);
        Ok(Self {
            store: sqlite.clone(),
            sqlite,
            _temp_dir: temp_dir,
        })
    }

    /// Database with the standard tables created.
    pub async fn with_schema() -> MetadataResult<Self> {
        let test = Self::new().await?;
        TableRegistry::standard()
            .create_tables_if_not_exist(test.store.as_ref())
            .await?;
        Ok(test)
    }

    pub fn store(&self) -> Arc<dyn MetadataStore> {
        self.store.clone()
    }
}
