// Projection Operator
//
// Evaluates a list of expressions against each input row, producing the
// output row layout fixed at plan-compile time.

use std::sync::Arc;

use crate::error::QueryResult;
use crate::exec::{BoxedIterator, ExecContext, RowIterator};
use crate::expr::Expression;
use crate::row::Row;

pub struct ProjectIter {
    child: BoxedIterator,
    exprs: Vec<Arc<dyn Expression>>,
    closed: bool,
}

impl ProjectIter {
    pub fn new(child: BoxedIterator, exprs: Vec<Arc<dyn Expression>>) -> Self {
        ProjectIter {
            child,
            exprs,
            closed: false,
        }
    }
}

impl RowIterator for ProjectIter {
    fn next(&mut self, ctx: &mut ExecContext) -> QueryResult<Option<Row>> {
        match self.child.next(ctx)? {
            Some(row) => {
                let mut values = Vec::with_capacity(self.exprs.len());
                for expr in &self.exprs {
                    values.push(expr.eval(ctx, &row)?);
                }
                Ok(Some(Row::from_values(values)))
            }
            None => Ok(None),
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
