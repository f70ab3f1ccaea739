//! Metadata store abstraction and implementations for coldvault.
//!
//! This crate provides the persisted data model:
//! - A generic record store driven by static table descriptors
//! - Conjunctive predicates with parameterized execution
//! - Chunk information, placement and provider records
//! - Provider capacity accounting with conditional updates

pub mod error;
pub mod models;
pub mod postgres;
pub mod predicate;
pub mod record;
pub mod repos;
pub mod sql;
pub mod store;
pub mod table;

pub use error::{MetadataError, MetadataResult};
pub use models::{ChunkInformation, Placement, Provider};
pub use postgres::PostgresStore;
pub use predicate::{Operator, WhereClause, render_where};
pub use record::{FieldDescriptor, FieldType, FieldValue, Record, RecordRow, TableDescriptor};
pub use repos::{ProviderRepo, RecordRepo};
pub use store::{MetadataStore, SqliteStore};
pub use table::{RecordStore, TableRegistry};

use coldvault_core::config::MetadataConfig;
use std::sync::Arc;

/// Create a metadata store from configuration.
pub async fn from_config(config: &MetadataConfig) -> MetadataResult<Arc<dyn MetadataStore>> {
    config.validate().map_err(MetadataError::Config)?;
    match config {
        MetadataConfig::Sqlite { path } => {
            let store = SqliteStore::new(path).await?;
            Ok(Arc::new(store) as Arc<dyn MetadataStore>)
        }
        MetadataConfig::Postgres {
            url,
            host,
            port,
            username,
            password,
            database,
            max_connections,
        } => {
            let store = if let Some(url) = url {
                // URL takes precedence over individual fields
                tracing::info!("Connecting to PostgreSQL using connection URL");
                PostgresStore::from_url(url, *max_connections).await?
            } else if let (Some(host), Some(database)) = (host.as_ref(), database.as_ref()) {
                PostgresStore::from_params(
                    host,
                    port.unwrap_or(5432),
                    username.as_deref(),
                    password.as_deref(),
                    database,
                    *max_connections,
                )
                .await?
            } else {
                return Err(MetadataError::Config(
                    "postgres config requires either 'url' or 'host' + 'database'".to_string(),
                ));
            };
            Ok(Arc::new(store) as Arc<dyn MetadataStore>)
        }
    }
}
