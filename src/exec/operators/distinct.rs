// Distinct Operator
//
// Deduplicates rows by row-hash, streaming the first occurrence of each.

use std::collections::HashSet;

use crate::error::QueryResult;
use crate::exec::{BoxedIterator, ExecContext, RowIterator};
use crate::row::{Row, row_hash};

pub struct DistinctIter {
    child: BoxedIterator,
    seen: HashSet<u64>,
    closed: bool,
}

impl DistinctIter {
    pub fn new(child: BoxedIterator) -> Self {
        DistinctIter {
            child,
            seen: HashSet::new(),
            closed: false,
        }
    }
}

impl RowIterator for DistinctIter {
    fn next(&mut self, ctx: &mut ExecContext) -> QueryResult<Option<Row>> {
        loop {
            ctx.check_cancelled()?;
            match self.child.next(ctx)? {
                Some(row) => {
                    if self.seen.insert(row_hash(row.values())) {
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
