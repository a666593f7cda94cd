// Update Operator Implementation
//
// Pulls target rows from its child (a scan, filter, or join pipeline),
// applies the SET assignments, validates the changed columns, and writes
// through storage only when something actually changed. Emits the combined
// `old ‖ new` pair so RETURNING and trigger plans can see both versions.
//
// For update-via-join the child row is wider than the table: the target
// table's columns sit at `target_offset` and the assignments may reference
// any column of the full child row.

use std::sync::Arc;

use crate::error::QueryResult;
use crate::exec::{BoxedIterator, ExecContext, RowIterator};
use crate::row::Row;
use crate::storage::Table;

use super::convert::{check_constraints, coerce_value};
use super::{Assignment, RowEffect};

pub struct UpdateIter {
    table: Arc<dyn Table>,
    child: BoxedIterator,
    /// Offset of the target table's columns inside the child row
    target_offset: usize,
    assignments: Vec<Assignment>,
    ignore: bool,
    closed: bool,
}

impl UpdateIter {
    pub fn new(
        table: Arc<dyn Table>,
        child: BoxedIterator,
        target_offset: usize,
        assignments: Vec<Assignment>,
        ignore: bool,
    ) -> Self {
        UpdateIter {
            table,
            child,
            target_offset,
            assignments,
            ignore,
            closed: false,
        }
    }
}

impl RowIterator for UpdateIter {
    fn next(&mut self, ctx: &mut ExecContext) -> QueryResult<Option<Row>> {
        ctx.check_cancelled()?;
        let Some(source) = self.child.next(ctx)? else {
            return Ok(None);
        };
        let schema = self.table.schema().clone();
        let old = source.slice(self.target_offset, self.target_offset + schema.len());

        let mut new = old.clone();
        for (offset, expr) in &self.assignments {
            let value = expr.eval(ctx, &source)?;
            let column = &schema.columns()[*offset];
            new.set(*offset, coerce_value(ctx, column, value, self.ignore)?);
        }
        check_constraints(ctx, &schema, &new)?;

        let changed = !schema.rows_equal(&old, &new);
        if changed {
            self.table.update(&old, &new)?;
        }
        ctx.set_effect(RowEffect::Updated { changed });
        Ok(Some(old.concat(&new)))
    }

    fn close(&mut self, ctx: &mut ExecContext) -> QueryResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.child.close(ctx)
    }
}
