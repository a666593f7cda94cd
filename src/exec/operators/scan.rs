// Table Scan Operator
//
// Pulls rows from the storage collaborator partition by partition. The
// scan owns no storage state beyond the current partition stream.

use std::sync::Arc;

use crate::error::QueryResult;
use crate::exec::{ExecContext, RowIterator};
use crate::row::Row;
use crate::storage::{PartitionId, RowStream, Table};

pub struct TableScanIter {
    table: Arc<dyn Table>,
    partitions: Option<Vec<PartitionId>>,
    current: Option<RowStream>,
}

impl TableScanIter {
    pub fn new(table: Arc<dyn Table>) -> Self {
        log::trace!("table scan over '{}'", table.name());
        TableScanIter {
            table,
            partitions: None,
            current: None,
        }
    }
}

impl RowIterator for TableScanIter {
    fn next(&mut self, ctx: &mut ExecContext) -> QueryResult<Option<Row>> {
        if self.partitions.is_none() {
            let mut parts = self.table.partitions()?;
            // Pop from the back as we advance
            parts.reverse();
            self.partitions = Some(parts);
        }
        loop {
            ctx.check_cancelled()?;
            if let Some(stream) = self.current.as_mut() {
                match stream.next() {
                    Some(row) => return Ok(Some(row?)),
                    None => self.current = None,
                }
            }
            let partitions = self.partitions.as_mut().unwrap();
            match partitions.pop() {
                Some(partition) => {
                    self.current = Some(self.table.partition_rows(partition)?);
                }
                None => return Ok(None),
            }
        }
    }

    fn close(&mut self, _ctx: &mut ExecContext) -> QueryResult<()> {
        self.current = None;
        self.partitions = None;
        Ok(())
    }
}

/// Index-backed range scan over one column of a table, rows ordered
/// ascending by that column.
pub struct IndexRangeIter {
    table: Arc<dyn Table>,
    column: usize,
    low: Option<crate::row::DataValue>,
    high: Option<crate::row::DataValue>,
    stream: Option<RowStream>,
}

impl IndexRangeIter {
    pub fn new(
        table: Arc<dyn Table>,
        column: usize,
        low: Option<crate::row::DataValue>,
        high: Option<crate::row::DataValue>,
    ) -> Self {
        IndexRangeIter {
            table,
            column,
            low,
            high,
            stream: None,
        }
    }
}

impl RowIterator for IndexRangeIter {
    fn next(&mut self, _ctx: &mut ExecContext) -> QueryResult<Option<Row>> {
        if self.stream.is_none() {
            self.stream = Some(self.table.index_range(
                self.column,
                self.low.as_ref(),
                self.high.as_ref(),
            )?);
        }
        match self.stream.as_mut().unwrap().next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    fn close(&mut self, _ctx: &mut ExecContext) -> QueryResult<()> {
        self.stream = None;
        Ok(())
    }
}
