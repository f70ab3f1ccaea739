//! Metadata store trait and the SQLite implementation.

use crate::error::{MetadataError, MetadataResult};
use crate::record::{FieldType, FieldValue, Record, RecordRow, TableDescriptor};
use crate::repos::{ProviderRepo, RecordRepo};
use crate::sql::{Dialect, Statement};
use async_trait::async_trait;
use sqlx::query::Query;
use sqlx::sqlite::{SqliteArguments, SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Pool, Row, Sqlite};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use time::OffsetDateTime;
use uuid::Uuid;

/// Combined metadata store trait.
#[async_trait]
pub trait MetadataStore: RecordRepo + ProviderRepo + Send + Sync {
    /// Check database connectivity and health.
    async fn health_check(&self) -> MetadataResult<()>;
}

/// SQLite-based metadata store.
pub struct SqliteStore {
    pool: Pool<Sqlite>,
}

impl SqliteStore {
    /// Open (creating if missing) a SQLite database file.
    pub async fn new(path: impl AsRef<Path>) -> MetadataResult<Self> {
        let path = path.as_ref();

        // Ensure parent directory exists
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let opts = SqliteConnectOptions::from_str(&format!("sqlite:{}?mode=rwc", path.display()))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            // Prevent transient "database is locked" errors under concurrent access.
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            // A single connection serializes writers; capacity reservations
            // rely on each UPDATE being applied on its own.
            .max_connections(1)
            .connect_with(opts)
            .await?;

        tracing::debug!(path = %path.display(), "Opened SQLite metadata store");
        Ok(Self { pool })
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    /// Close the pool; later calls fail with a connection error.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl MetadataStore for SqliteStore {
    async fn health_check(&self) -> MetadataResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

fn bind_value<'q>(
    query: Query<'q, Sqlite, SqliteArguments<'q>>,
    value: FieldValue,
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    match value {
        FieldValue::Null => query.bind(None::<String>),
        FieldValue::Integer(v) => query.bind(v),
        FieldValue::Text(v) => query.bind(v),
        FieldValue::Boolean(v) => query.bind(v),
        FieldValue::Float(v) => query.bind(v),
        FieldValue::Timestamp(v) => query.bind(v),
        FieldValue::Uuid(v) => query.bind(v),
    }
}

fn decode_row(table: &'static TableDescriptor, row: &SqliteRow) -> MetadataResult<RecordRow> {
    let mut values = Vec::with_capacity(table.fields.len());
    for (i, field) in table.fields.iter().enumerate() {
        let value = match field.ty {
            FieldType::Integer | FieldType::Enum => row
                .try_get::<Option<i64>, _>(i)?
                .map_or(FieldValue::Null, FieldValue::Integer),
            FieldType::Text => row
                .try_get::<Option<String>, _>(i)?
                .map_or(FieldValue::Null, FieldValue::Text),
            FieldType::Boolean => row
                .try_get::<Option<bool>, _>(i)?
                .map_or(FieldValue::Null, FieldValue::Boolean),
            FieldType::Float => row
                .try_get::<Option<f64>, _>(i)?
                .map_or(FieldValue::Null, FieldValue::Float),
            FieldType::Timestamp => row
                .try_get::<Option<OffsetDateTime>, _>(i)?
                .map_or(FieldValue::Null, FieldValue::Timestamp),
            FieldType::Uuid => row
                .try_get::<Option<Uuid>, _>(i)?
                .map_or(FieldValue::Null, FieldValue::Uuid),
            FieldType::Unmapped(rust_type) => {
                return Err(MetadataError::UnsupportedType {
                    table: table.name,
                    field: field.name,
                    rust_type,
                });
            }
        };
        values.push(value);
    }
    Ok(RecordRow::new(table, values))
}

// Implement the repository traits for SqliteStore
mod sqlite_impl {
    use super::*;
    use crate::models::Provider;

    #[async_trait]
    impl RecordRepo for SqliteStore {
        fn dialect(&self) -> Dialect {
            Dialect::Sqlite
        }

        async fn execute(&self, statement: Statement) -> MetadataResult<u64> {
            let Statement { sql, binds } = statement;
            let mut query = sqlx::query(&sql);
            for value in binds {
                query = bind_value(query, value);
            }
            let result = query.execute(&self.pool).await?;
            Ok(result.rows_affected())
        }

        async fn fetch(
            &self,
            table: &'static TableDescriptor,
            statement: Statement,
        ) -> MetadataResult<Vec<RecordRow>> {
            let Statement { sql, binds } = statement;
            let mut query = sqlx::query(&sql);
            for value in binds {
                query = bind_value(query, value);
            }
            let rows = query.fetch_all(&self.pool).await?;
            rows.iter().map(|row| decode_row(table, row)).collect()
        }

        async fn table_exists(&self, name: &str) -> MetadataResult<bool> {
            let exists: bool = sqlx::query_scalar(
                "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?)",
            )
            .bind(name)
            .fetch_one(&self.pool)
            .await?;
            Ok(exists)
        }
    }

    #[async_trait]
    impl ProviderRepo for SqliteStore {
        async fn eligible_providers(&self, floor: i64) -> MetadataResult<Vec<Provider>> {
            let table = Provider::TABLE;
            let sql = format!(
                "SELECT {} FROM {} WHERE capacity_bytes - consumed_bytes >= ?",
                table.column_list(),
                table.name
            );
            let rows = self
                .fetch(
                    table,
                    Statement {
                        sql,
                        binds: vec![FieldValue::Integer(floor)],
                    },
                )
                .await?;
            rows.iter().map(Provider::from_row).collect()
        }

        async fn reserve_capacity(&self, id: Uuid, bytes: i64) -> MetadataResult<bool> {
            if bytes < 0 {
                return Err(MetadataError::InvalidArgument(format!(
                    "cannot reserve a negative amount ({bytes})"
                )));
            }
            let result = sqlx::query(
                "UPDATE provider SET consumed_bytes = consumed_bytes + ? \
                 WHERE id = ? AND consumed_bytes + ? <= capacity_bytes",
            )
            .bind(bytes)
            .bind(id)
            .bind(bytes)
            .execute(&self.pool)
            .await?;
            Ok(result.rows_affected() == 1)
        }

        async fn release_capacity(&self, id: Uuid, bytes: i64) -> MetadataResult<()> {
            if bytes < 0 {
                return Err(MetadataError::InvalidArgument(format!(
                    "cannot release a negative amount ({bytes})"
                )));
            }
            sqlx::query(
                "UPDATE provider SET consumed_bytes = \
                 CASE WHEN consumed_bytes < ? THEN 0 ELSE consumed_bytes - ? END \
                 WHERE id = ?",
            )
            .bind(bytes)
            .bind(bytes)
            .bind(id)
            .execute(&self.pool)
            .await?;
            Ok(())
        }

        async fn set_capacity(&self, id: Uuid, capacity: i64) -> MetadataResult<bool> {
            let result = sqlx::query(
                "UPDATE provider SET capacity_bytes = ? WHERE id = ? AND consumed_bytes <= ?",
            )
            .bind(capacity)
            .bind(id)
            .bind(capacity)
            .execute(&self.pool)
            .await?;
            Ok(result.rows_affected() == 1)
        }

        async fn get_provider(&self, id: Uuid) -> MetadataResult<Option<Provider>> {
            let table = Provider::TABLE;
            let sql = format!(
                "SELECT {} FROM {} WHERE id = ?",
                table.column_list(),
                table.name
            );
            let rows = self
                .fetch(
                    table,
                    Statement {
                        sql,
                        binds: vec![FieldValue::Uuid(id)],
                    },
                )
                .await?;
            rows.first().map(Provider::from_row).transpose()
        }
    }
}
