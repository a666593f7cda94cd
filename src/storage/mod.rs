// Storage Collaborator Boundary
//
// The storage layer is external to row execution. These traits are the
// narrow contract this layer programs against: partition iteration, row
// mutation, key lookup, and index-backed range access. `MemTable` is the
// in-memory implementation used throughout the test suite.

pub mod mem;

pub use mem::MemTable;

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::{QueryError, QueryResult};
use crate::row::{DataValue, Row, Schema};

/// Identifier of one storage partition of a table
pub type PartitionId = u32;

/// A stream of rows produced by the storage collaborator
pub type RowStream = Box<dyn Iterator<Item = QueryResult<Row>> + Send>;

/// The table contract the execution layer consumes.
///
/// Mutations must surface unique/primary-key conflicts as
/// `QueryError::DuplicateKey` carrying the conflicting key, so the
/// ON DUPLICATE KEY UPDATE, REPLACE, and IGNORE paths can recover.
pub trait Table: Send + Sync {
    fn name(&self) -> &str;

    fn schema(&self) -> &Schema;

    fn partitions(&self) -> QueryResult<Vec<PartitionId>>;

    fn partition_rows(&self, partition: PartitionId) -> QueryResult<RowStream>;

    fn insert(&self, row: &Row) -> QueryResult<()>;

    fn update(&self, old: &Row, new: &Row) -> QueryResult<()>;

    fn delete(&self, row: &Row) -> QueryResult<()>;

    /// Look up the row with the given primary/unique key, if any.
    fn lookup_key(&self, key: &[DataValue]) -> QueryResult<Option<Row>>;

    /// Index-backed range access over one column, rows ordered ascending
    /// by that column with NULLs first.
    fn index_range(
        &self,
        column: usize,
        low: Option<&DataValue>,
        high: Option<&DataValue>,
    ) -> QueryResult<RowStream>;

    /// Reserve the next auto-increment value, if the table has an
    /// auto-increment column.
    fn next_auto_value(&self) -> QueryResult<Option<i64>> {
        Ok(None)
    }
}

/// Resolves table names for plan compilation and for correlated subtrees
/// rebuilt at runtime. Passed explicitly through the execution context,
/// never reached through a global.
#[derive(Default)]
pub struct TableRegistry {
    tables: RwLock<HashMap<String, Arc<dyn Table>>>,
}

impl TableRegistry {
    pub fn new() -> Self {
        TableRegistry {
            tables: RwLock::new(HashMap::new()),
        }
    }

    pub fn register(&self, table: Arc<dyn Table>) {
        self.tables.write().insert(table.name().to_string(), table);
    }

    pub fn table(&self, name: &str) -> QueryResult<Arc<dyn Table>> {
        self.tables
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| QueryError::TableNotFound(name.to_string()))
    }
}
