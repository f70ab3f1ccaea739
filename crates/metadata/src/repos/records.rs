//! Backend primitives behind the generic record store.

use crate::error::MetadataResult;
use crate::record::{RecordRow, TableDescriptor};
use crate::sql::{Dialect, Statement};
use async_trait::async_trait;

/// Statement execution for one SQL backend.
///
/// Everything typed lives in [`crate::table::RecordStore`]; a backend only
/// binds values, runs statements and decodes rows by descriptor.
#[async_trait]
pub trait RecordRepo: Send + Sync {
    /// SQL dialect used to build statements for this backend.
    fn dialect(&self) -> Dialect;

    /// Run a statement, returning the number of rows affected.
    async fn execute(&self, statement: Statement) -> MetadataResult<u64>;

    /// Run a query whose columns follow `table`'s declaration order.
    async fn fetch(
        &self,
        table: &'static TableDescriptor,
        statement: Statement,
    ) -> MetadataResult<Vec<RecordRow>>;

    /// Whether a table with this name exists.
    async fn table_exists(&self, name: &str) -> MetadataResult<bool>;
}
