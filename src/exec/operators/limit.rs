// Limit/Offset Operator

use crate::error::QueryResult;
use crate::exec::{BoxedIterator, ExecContext, RowIterator};
use crate::row::Row;

pub struct LimitIter {
    child: BoxedIterator,
    offset: usize,
    limit: Option<usize>,
    skipped: usize,
    emitted: usize,
    closed: bool,
}

impl LimitIter {
    pub fn new(child: BoxedIterator, offset: usize, limit: Option<usize>) -> Self {
        LimitIter {
            child,
            offset,
            limit,
            skipped: 0,
            emitted: 0,
            closed: false,
        }
    }
}

impl RowIterator for LimitIter {
    fn next(&mut self, ctx: &mut ExecContext) -> QueryResult<Option<Row>> {
        if let Some(limit) = self.limit {
            if self.emitted >= limit {
                return Ok(None);
            }
        }
        while self.skipped < self.offset {
            ctx.check_cancelled()?;
            if self.child.next(ctx)?.is_none() {
                return Ok(None);
            }
            self.skipped += 1;
        }
        match self.child.next(ctx)? {
            Some(row) => {
                self.emitted += 1;
                Ok(Some(row))
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
