// In-Memory Table
//
// A single-partition `Table` implementation backed by a Vec of rows. It
// enforces key uniqueness and assigns auto-increment values, which is all
// the execution-layer tests need from storage.

use parking_lot::RwLock;

use crate::error::{QueryError, QueryResult};
use crate::row::{DataValue, Row, Schema};
use crate::storage::{PartitionId, RowStream, Table};

struct MemTableInner {
    rows: Vec<Row>,
    next_auto: i64,
}

/// In-memory table with one partition
pub struct MemTable {
    name: String,
    schema: Schema,
    inner: RwLock<MemTableInner>,
}

impl MemTable {
    pub fn new(name: impl Into<String>, schema: Schema) -> Self {
        MemTable {
            name: name.into(),
            schema,
            inner: RwLock::new(MemTableInner {
                rows: Vec::new(),
                next_auto: 1,
            }),
        }
    }

    /// Build a table pre-populated with rows, bypassing key checks.
    /// Intended for test fixtures.
    pub fn with_rows(name: impl Into<String>, schema: Schema, rows: Vec<Row>) -> Self {
        let next_auto = 1 + max_key_value(&schema, &rows);
        MemTable {
            name: name.into(),
            schema,
            inner: RwLock::new(MemTableInner { rows, next_auto }),
        }
    }

    pub fn row_count(&self) -> usize {
        self.inner.read().rows.len()
    }

    /// Snapshot of all rows, for test assertions.
    pub fn snapshot(&self) -> Vec<Row> {
        self.inner.read().rows.clone()
    }

    fn position_of_key(&self, rows: &[Row], key: &[DataValue]) -> Option<usize> {
        if self.schema.key().is_empty() {
            return None;
        }
        rows.iter().position(|r| self.schema.key_of(r) == key)
    }
}

fn max_key_value(schema: &Schema, rows: &[Row]) -> i64 {
    let auto_col = schema
        .columns()
        .iter()
        .position(|c| c.is_auto_increment());
    match auto_col {
        Some(idx) => rows
            .iter()
            .filter_map(|r| r.get(idx).and_then(|v| v.as_integer()))
            .max()
            .unwrap_or(0),
        None => 0,
    }
}

impl Table for MemTable {
    fn name(&self) -> &str {
        &self.name
    }

    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn partitions(&self) -> QueryResult<Vec<PartitionId>> {
        Ok(vec![0])
    }

    fn partition_rows(&self, partition: PartitionId) -> QueryResult<RowStream> {
        if partition != 0 {
            return Err(QueryError::StorageError(format!(
                "Table '{}' has no partition {}",
                self.name, partition
            )));
        }
        let rows = self.inner.read().rows.clone();
        Ok(Box::new(rows.into_iter().map(Ok)))
    }

    fn insert(&self, row: &Row) -> QueryResult<()> {
        if row.len() != self.schema.len() {
            return Err(QueryError::ExecutionError(format!(
                "Row width {} does not match schema width {} of table '{}'",
                row.len(),
                self.schema.len(),
                self.name
            )));
        }
        let mut inner = self.inner.write();
        if !self.schema.key().is_empty() {
            let key = self.schema.key_of(row);
            if self.position_of_key(&inner.rows, &key).is_some() {
                return Err(QueryError::DuplicateKey(key));
            }
        }
        inner.rows.push(row.clone());
        Ok(())
    }

    fn update(&self, old: &Row, new: &Row) -> QueryResult<()> {
        let mut inner = self.inner.write();
        let pos = inner
            .rows
            .iter()
            .position(|r| r == old)
            .ok_or_else(|| {
                QueryError::StorageError(format!(
                    "Row to update not found in table '{}'",
                    self.name
                ))
            })?;
        if !self.schema.key().is_empty() {
            let new_key = self.schema.key_of(new);
            if let Some(other) = self.position_of_key(&inner.rows, &new_key) {
                if other != pos {
                    return Err(QueryError::DuplicateKey(new_key));
                }
            }
        }
        inner.rows[pos] = new.clone();
        Ok(())
    }

    fn delete(&self, row: &Row) -> QueryResult<()> {
        let mut inner = self.inner.write();
        let pos = inner
            .rows
            .iter()
            .position(|r| r == row)
            .ok_or_else(|| {
                QueryError::StorageError(format!(
                    "Row to delete not found in table '{}'",
                    self.name
                ))
            })?;
        inner.rows.remove(pos);
        Ok(())
    }

    fn lookup_key(&self, key: &[DataValue]) -> QueryResult<Option<Row>> {
        let inner = self.inner.read();
        Ok(self
            .position_of_key(&inner.rows, key)
            .map(|pos| inner.rows[pos].clone()))
    }

    fn index_range(
        &self,
        column: usize,
        low: Option<&DataValue>,
        high: Option<&DataValue>,
    ) -> QueryResult<RowStream> {
        let mut rows: Vec<Row> = Vec::new();
        for row in self.inner.read().rows.iter() {
            let value = row.get(column).ok_or_else(|| {
                QueryError::ExecutionError(format!(
                    "Index column {} out of bounds for table '{}'",
                    column, self.name
                ))
            })?;
            let above_low = match low {
                Some(low) => value.compare(low)? != std::cmp::Ordering::Less,
                None => true,
            };
            let below_high = match high {
                Some(high) => value.compare(high)? != std::cmp::Ordering::Greater,
                None => true,
            };
            if above_low && below_high {
                rows.push(row.clone());
            }
        }
        // Ascending by indexed column, NULLs first
        let mut keyed: Vec<(Row, DataValue)> = rows
            .into_iter()
            .map(|r| {
                let k = r[column].clone();
                (r, k)
            })
            .collect();
        keyed.sort_by(|(_, a), (_, b)| a.compare(b).unwrap_or(std::cmp::Ordering::Equal));
        Ok(Box::new(keyed.into_iter().map(|(r, _)| Ok(r))))
    }

    fn next_auto_value(&self) -> QueryResult<Option<i64>> {
        if !self
            .schema
            .columns()
            .iter()
            .any(|c| c.is_auto_increment())
        {
            return Ok(None);
        }
        let mut inner = self.inner.write();
        let value = inner.next_auto;
        inner.next_auto += 1;
        Ok(Some(value))
    }
}
