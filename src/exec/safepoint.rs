// Periodic Safepoint Decorator
//
// Wraps any iterator that may be pulled a very large number of times
// during a single write or DDL operation. Every SAFEPOINT_INTERVAL pulls
// it invokes the session safepoint hook, giving the surrounding system a
// chance to checkpoint. Row output and ordering are unchanged.

use crate::error::QueryResult;
use crate::exec::{BoxedIterator, ExecContext, RowIterator, SwappableChild};
use crate::row::Row;

/// Pulls between safepoint hook invocations
pub const SAFEPOINT_INTERVAL: u64 = 1024;

pub struct SafepointIter {
    child: BoxedIterator,
    interval: u64,
    pulls: u64,
    closed: bool,
}

impl SafepointIter {
    pub fn new(child: BoxedIterator) -> Self {
        SafepointIter::with_interval(child, SAFEPOINT_INTERVAL)
    }

    pub fn with_interval(child: BoxedIterator, interval: u64) -> Self {
        assert!(interval > 0, "safepoint interval must be positive");
        SafepointIter {
            child,
            interval,
            pulls: 0,
            closed: false,
        }
    }
}

impl RowIterator for SafepointIter {
    fn next(&mut self, ctx: &mut ExecContext) -> QueryResult<Option<Row>> {
        self.pulls += 1;
        if self.pulls % self.interval == 0 {
            ctx.reach_safepoint()?;
        }
        self.child.next(ctx)
    }

    fn close(&mut self, ctx: &mut ExecContext) -> QueryResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.child.close(ctx)
    }
}

impl SwappableChild for SafepointIter {
    fn child(&self) -> &dyn RowIterator {
        self.child.as_ref()
    }

    fn replace_child(&mut self, child: BoxedIterator) -> BoxedIterator {
        std::mem::replace(&mut self.child, child)
    }
}
