//! Typed record store and the table registry.

use crate::error::MetadataResult;
use crate::models::{ChunkInformation, Placement, Provider};
use crate::predicate::{WhereClause, render_where};
use crate::record::{Record, RecordRow, TableDescriptor};
use crate::repos::RecordRepo;
use crate::sql;
use crate::store::MetadataStore;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::{debug, warn};

/// Insert, search and delete rows of one record type.
pub struct RecordStore<R: Record> {
    store: Arc<dyn MetadataStore>,
    _record: PhantomData<fn() -> R>,
}

impl<R: Record> Clone for RecordStore<R> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            _record: PhantomData,
        }
    }
}

impl<R: Record> RecordStore<R> {
    pub fn new(store: Arc<dyn MetadataStore>) -> Self {
        Self {
            store,
            _record: PhantomData,
        }
    }

    pub fn table(&self) -> &'static TableDescriptor {
        R::TABLE
    }

    pub async fn create_table(&self) -> MetadataResult<()> {
        create_table(self.store.as_ref(), R::TABLE).await
    }

    pub async fn drop_table(&self) -> MetadataResult<()> {
        drop_table(self.store.as_ref(), R::TABLE).await
    }

    pub async fn table_exists(&self) -> MetadataResult<bool> {
        self.store.table_exists(R::TABLE.name).await
    }

    /// Insert each row with its own statement and return how many landed.
    ///
    /// A row that is rejected (blank required field, constraint violation) is
    /// logged and skipped. Losing the connection aborts the batch with
    /// [`crate::MetadataError::Connection`].
    pub async fn insert(&self, rows: &[R]) -> MetadataResult<usize> {
        let table = R::TABLE;
        let dialect = self.store.dialect();
        let mut inserted = 0;
        for (index, row) in rows.iter().enumerate() {
            let statement = match sql::insert(dialect, table, row.to_values()) {
                Ok(statement) => statement,
                Err(e) => {
                    warn!(table = table.name, index, error = %e, "Skipping invalid row");
                    continue;
                }
            };
            match self.store.execute(statement).await {
                Ok(_) => inserted += 1,
                Err(e) if e.is_connection() => return Err(e),
                Err(e) => {
                    warn!(table = table.name, index, error = %e, "Row insert failed");
                }
            }
        }
        debug!(
            table = table.name,
            requested = rows.len(),
            inserted,
            "Inserted rows"
        );
        Ok(inserted)
    }

    /// Rows matching every predicate, in store order. No predicates returns
    /// the whole table.
    pub async fn search(&self, predicates: &[WhereClause]) -> MetadataResult<Vec<R>> {
        self.search_with(predicates, R::from_row).await
    }

    /// Like [`search`](Self::search) with a caller-supplied row deserializer.
    pub async fn search_with<F>(
        &self,
        predicates: &[WhereClause],
        deserialize: F,
    ) -> MetadataResult<Vec<R>>
    where
        F: Fn(&RecordRow) -> MetadataResult<R> + Send,
    {
        let table = R::TABLE;
        let statement = sql::select(self.store.dialect(), table, predicates)?;
        debug!(table = table.name, filter = %render_where(predicates), "Searching rows");
        let rows = self.store.fetch(table, statement).await?;
        rows.iter().map(deserialize).collect()
    }

    /// Delete rows matching every predicate; true if any row went.
    ///
    /// An empty predicate list deletes nothing. Use
    /// [`truncate`](Self::truncate) to empty the table.
    pub async fn delete(&self, predicates: &[WhereClause]) -> MetadataResult<bool> {
        let table = R::TABLE;
        let Some(statement) = sql::delete(self.store.dialect(), table, predicates)? else {
            debug!(table = table.name, "Delete without predicates ignored");
            return Ok(false);
        };
        let removed = self.store.execute(statement).await?;
        debug!(table = table.name, filter = %render_where(predicates), removed, "Deleted rows");
        Ok(removed > 0)
    }

    /// Remove every row of the table.
    pub async fn truncate(&self) -> MetadataResult<u64> {
        let removed = self.store.execute(sql::truncate(R::TABLE)).await?;
        warn!(table = R::TABLE.name, removed, "Truncated table");
        Ok(removed)
    }
}

async fn create_table(store: &dyn MetadataStore, table: &'static TableDescriptor) -> MetadataResult<()> {
    let statement = sql::create_table(store.dialect(), table)?;
    store.execute(statement).await?;
    debug!(table = table.name, "Created table");
    Ok(())
}

async fn drop_table(store: &dyn MetadataStore, table: &'static TableDescriptor) -> MetadataResult<()> {
    store.execute(sql::drop_table(table)).await?;
    debug!(table = table.name, "Dropped table");
    Ok(())
}

/// Explicit list of the tables an application owns.
#[derive(Debug, Clone, Default)]
pub struct TableRegistry {
    tables: Vec<&'static TableDescriptor>,
}

impl TableRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The coldvault tables: chunk information, placements and providers.
    pub fn standard() -> Self {
        Self::new()
            .register::<ChunkInformation>()
            .register::<Placement>()
            .register::<Provider>()
    }

    pub fn register<R: Record>(mut self) -> Self {
        if !self.tables.iter().any(|t| t.name == R::TABLE.name) {
            self.tables.push(R::TABLE);
        }
        self
    }

    pub fn tables(&self) -> &[&'static TableDescriptor] {
        &self.tables
    }

    /// Create every registered table that does not exist yet.
    ///
    /// All descriptors are checked before any statement runs, so an
    /// unsupported field type leaves the schema untouched.
    pub async fn create_tables_if_not_exist(&self, store: &dyn MetadataStore) -> MetadataResult<()> {
        for table in &self.tables {
            table.check_supported()?;
        }
        for &table in &self.tables {
            create_table(store, table).await?;
        }
        tracing::info!(tables = self.tables.len(), "Schema ready");
        Ok(())
    }

    /// Drop every registered table that exists.
    pub async fn drop_tables_if_exist(&self, store: &dyn MetadataStore) -> MetadataResult<()> {
        for &table in self.tables.iter().rev() {
            drop_table(store, table).await?;
        }
        tracing::info!(tables = self.tables.len(), "Schema dropped");
        Ok(())
    }
}
