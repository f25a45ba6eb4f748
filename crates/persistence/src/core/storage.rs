//! Row storage trait.
//!
//! [`RowStorage`] is the SQL execution collaborator behind the HTTP handlers.
//! It reads and writes rows without applying any authorization; the access
//! interceptor filters its input and output.

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::StorageResult;
use crate::schema::TableDefinition;

use super::row::Row;

/// Paging for list operations. Pages are numbered from 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListQuery {
    pub page: usize,
    pub size: usize,
}

impl ListQuery {
    pub fn new(page: usize, size: usize) -> Self {
        Self {
            page: page.max(1),
            size,
        }
    }

    /// Number of rows skipped before this page, saturating for pages past
    /// any addressable row.
    pub fn offset(&self) -> usize {
        (self.page.max(1) - 1).saturating_mul(self.size)
    }
}

impl Default for ListQuery {
    fn default() -> Self {
        Self::new(1, 20)
    }
}

/// CRUD over the rows of governed tables.
///
/// Foreign-key columns hold numeric ids in storage. Writes accept either the
/// numeric id or the reference id of the target row.
#[async_trait]
pub trait RowStorage: Send + Sync {
    /// Returns a human-readable name for this storage backend.
    fn backend_name(&self) -> &'static str;

    /// Lists one page of rows ordered by id.
    async fn list(&self, table: &TableDefinition, query: ListQuery) -> StorageResult<Vec<Row>>;

    /// Lists every row of a table.
    async fn list_all(&self, table: &TableDefinition) -> StorageResult<Vec<Row>>;

    /// Counts the rows of a table.
    async fn count(&self, table: &TableDefinition) -> StorageResult<u64>;

    /// Reads one row by reference id.
    async fn get(&self, table: &TableDefinition, reference_id: &str) -> StorageResult<Row>;

    /// Inserts a row.
    ///
    /// The backend assigns `reference_id`, `permission` (the table default
    /// unless the payload carries one), timestamps and, when
    /// `owner_reference_id` is given, the owner column. The new row is shared
    /// with the table's default groups.
    async fn insert(
        &self,
        table: &TableDefinition,
        owner_reference_id: Option<&str>,
        values: Map<String, Value>,
    ) -> StorageResult<Row>;

    /// Updates the given columns of one row and returns the stored row.
    async fn update(
        &self,
        table: &TableDefinition,
        reference_id: &str,
        values: Map<String, Value>,
    ) -> StorageResult<Row>;

    /// Deletes one row and its group memberships.
    async fn delete(&self, table: &TableDefinition, reference_id: &str) -> StorageResult<()>;
}
