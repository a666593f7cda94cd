// Filter Operator Implementation
//
// Filters rows by a condition expression under SQL three-valued logic:
// NULL and FALSE both drop the row.

use std::sync::Arc;

use crate::error::QueryResult;
use crate::exec::{BoxedIterator, ExecContext, RowIterator};
use crate::expr::{Expression, eval_condition};
use crate::row::Row;

pub struct FilterIter {
    child: BoxedIterator,
    predicate: Arc<dyn Expression>,
    closed: bool,
}

impl FilterIter {
    pub fn new(child: BoxedIterator, predicate: Arc<dyn Expression>) -> Self {
        FilterIter {
            child,
            predicate,
            closed: false,
        }
    }
}

impl RowIterator for FilterIter {
    fn next(&mut self, ctx: &mut ExecContext) -> QueryResult<Option<Row>> {
        loop {
            ctx.check_cancelled()?;
            match self.child.next(ctx)? {
                Some(row) => {
                    if eval_condition(Some(&self.predicate), ctx, &row)? {
                        return Ok(Some(row));
                    }
                }
                None => return Ok(None),
            }
        }
    }

    fn close(&mut self, ctx: &mut ExecContext) -> QueryResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.child.close(ctx)
    }
}
