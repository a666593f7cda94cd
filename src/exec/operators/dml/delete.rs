// Delete Operator Implementation
//
// Pulls target rows from its child and deletes each through storage,
// emitting the deleted row so RETURNING and trigger plans can observe it.

use std::sync::Arc;

use crate::error::QueryResult;
use crate::exec::{BoxedIterator, ExecContext, RowIterator};
use crate::row::Row;
use crate::storage::Table;

use super::RowEffect;

pub struct DeleteIter {
    table: Arc<dyn Table>,
    child: BoxedIterator,
    /// Offset of the target table's columns inside the child row
    target_offset: usize,
    closed: bool,
}

impl DeleteIter {
    pub fn new(table: Arc<dyn Table>, child: BoxedIterator, target_offset: usize) -> Self {
        DeleteIter {
            table,
            child,
            target_offset,
            closed: false,
        }
    }
}

impl RowIterator for DeleteIter {
    fn next(&mut self, ctx: &mut ExecContext) -> QueryResult<Option<Row>> {
        ctx.check_cancelled()?;
        let Some(source) = self.child.next(ctx)? else {
            return Ok(None);
        };
        let width = self.table.schema().len();
        let row = source.slice(self.target_offset, self.target_offset + width);
        self.table.delete(&row)?;
        ctx.set_effect(RowEffect::Deleted);
        Ok(Some(row))
    }

    fn close(&mut self, ctx: &mut ExecContext) -> QueryResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.child.close(ctx)
    }
}
