// Execution Core
//
// This module defines the pull-iterator contract every operator implements
// and the composition discipline around it: close exactly once, cascade
// close to children even on error paths, and splice middleware through the
// swappable-child capability instead of downcasting.

pub mod build;
pub mod context;
pub mod operators;
pub mod safepoint;

pub use context::ExecContext;

use crate::error::QueryResult;
use crate::row::Row;

/// The RowIterator trait defines the interface for all query execution
/// operators in the pull-based execution model. `Ok(None)` is the
/// end-of-stream signal; it is terminal unless an operator documents
/// otherwise.
pub trait RowIterator: Send {
    /// Get the next row of data from this operator
    fn next(&mut self, ctx: &mut ExecContext) -> QueryResult<Option<Row>>;

    /// Close the operator and release any resources. Must be safe to call
    /// after a mid-stream error and must close every child it owns,
    /// returning the first error while still closing the rest.
    fn close(&mut self, ctx: &mut ExecContext) -> QueryResult<()>;
}

impl std::fmt::Debug for dyn RowIterator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("RowIterator")
    }
}

/// Boxed iterator, the unit of plan composition
pub type BoxedIterator = Box<dyn RowIterator>;

/// Capability for middleware splicing: an iterator that exposes its child
/// and accepts a replacement, so decorators (safepoint wrapper,
/// accumulator) can be inserted after tree construction.
pub trait SwappableChild {
    fn child(&self) -> &dyn RowIterator;

    fn replace_child(&mut self, child: BoxedIterator) -> BoxedIterator;
}

/// Close every child in order, returning the first error encountered while
/// still attempting to close the remaining children.
pub fn close_all<'a>(
    ctx: &mut ExecContext,
    children: impl IntoIterator<Item = &'a mut BoxedIterator>,
) -> QueryResult<()> {
    let mut first_err = None;
    for child in children {
        if let Err(e) = child.close(ctx) {
            if first_err.is_none() {
                first_err = Some(e);
            }
        }
    }
    match first_err {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

/// Drain an iterator into a Vec, checking cancellation per row. The caller
/// remains responsible for closing the iterator.
pub fn materialize(iter: &mut dyn RowIterator, ctx: &mut ExecContext) -> QueryResult<Vec<Row>> {
    let mut rows = Vec::new();
    while let Some(row) = iter.next(ctx)? {
        ctx.check_cancelled()?;
        rows.push(row);
    }
    Ok(rows)
}
