//! PostgreSQL-based metadata store implementation.

use crate::error::{MetadataError, MetadataResult};
use crate::models::Provider;
use crate::record::{FieldType, FieldValue, Record, RecordRow, TableDescriptor};
use crate::repos::{ProviderRepo, RecordRepo};
use crate::sql::{Dialect, Statement};
use crate::store::MetadataStore;
use async_trait::async_trait;
use sqlx::postgres::{PgArguments, PgConnectOptions, PgPoolOptions, PgRow};
use sqlx::query::Query;
use sqlx::{Pool, Postgres, Row};
use std::str::FromStr;
use time::OffsetDateTime;
use uuid::Uuid;

/// PostgreSQL-based metadata store.
pub struct PostgresStore {
    pool: Pool<Postgres>,
}

impl PostgresStore {
    /// Create a new PostgreSQL store from a connection URL.
    pub async fn from_url(url: &str, max_connections: u32) -> MetadataResult<Self> {
        let opts = PgConnectOptions::from_str(url)?;
        Self::connect(opts, max_connections).await
    }

    /// Create a new PostgreSQL store from individual connection parameters.
    ///
    /// This allows credentials to be passed separately, e.g. the password
    /// through an environment variable.
    pub async fn from_params(
        host: &str,
        port: u16,
        username: Option<&str>,
        password: Option<&str>,
        database: &str,
        max_connections: u32,
    ) -> MetadataResult<Self> {
        let mut opts = PgConnectOptions::new()
            .host(host)
            .port(port)
            .database(database);

        if let Some(user) = username {
            opts = opts.username(user);
        }

        if let Some(pass) = password {
            opts = opts.password(pass);
        }

        // Log connection info without password
        tracing::info!(
            host = host,
            port = port,
            database = database,
            username = username.unwrap_or("<none>"),
            "Connecting to PostgreSQL with individual parameters"
        );

        Self::connect(opts, max_connections).await
    }

    async fn connect(opts: PgConnectOptions, max_connections: u32) -> MetadataResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect_with(opts)
            .await?;
        Ok(Self { pool })
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &Pool<Postgres> {
        &self.pool
    }
}

#[async_trait]
impl MetadataStore for PostgresStore {
    async fn health_check(&self) -> MetadataResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

fn bind_value<'q>(
    query: Query<'q, Postgres, PgArguments>,
    value: FieldValue,
) -> Query<'q, Postgres, PgArguments> {
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

fn decode_row(table: &'static TableDescriptor, row: &PgRow) -> MetadataResult<RecordRow> {
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

#[async_trait]
impl RecordRepo for PostgresStore {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
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
            "SELECT EXISTS(SELECT 1 FROM information_schema.tables \
             WHERE table_schema = current_schema() AND table_name = $1)",
        )
        .bind(name)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }
}

#[async_trait]
impl ProviderRepo for PostgresStore {
    async fn eligible_providers(&self, floor: i64) -> MetadataResult<Vec<Provider>> {
        let table = Provider::TABLE;
        let sql = format!(
            "SELECT {} FROM {} WHERE capacity_bytes - consumed_bytes >= $1",
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
        // Row lock taken by UPDATE makes the check and increment one step.
        let result = sqlx::query(
            "UPDATE provider SET consumed_bytes = consumed_bytes + $1 \
             WHERE id = $2 AND consumed_bytes + $1 <= capacity_bytes",
        )
        .bind(bytes)
        .bind(id)
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
            "UPDATE provider SET consumed_bytes = GREATEST(consumed_bytes - $1, 0) WHERE id = $2",
        )
        .bind(bytes)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn set_capacity(&self, id: Uuid, capacity: i64) -> MetadataResult<bool> {
        let result = sqlx::query(
            "UPDATE provider SET capacity_bytes = $1 WHERE id = $2 AND consumed_bytes <= $1",
        )
        .bind(capacity)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn get_provider(&self, id: Uuid) -> MetadataResult<Option<Provider>> {
        let table = Provider::TABLE;
        let sql = format!(
            "SELECT {} FROM {} WHERE id = $1",
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
