// Lateral Join Implementation
//
// The right side of a lateral join may reference columns of the current
// left row, so it is rebuilt for every left row with that row bound as a
// scope prefix. BindIter is the binding glue: it prepends a fixed prefix
// to every row its child produces, which is how an inner plan fragment
// sees the outer row's columns at stable positions.

use crate::error::QueryResult;
use crate::exec::{BoxedIterator, ExecContext, RowIterator};
use crate::row::Row;

use super::{JoinConfig, RightFactory};

/// Prepends a fixed prefix row to every child row. Used to bind an outer
/// row into a correlated plan fragment.
pub struct BindIter {
    prefix: Row,
    child: BoxedIterator,
    closed: bool,
}

impl BindIter {
    pub fn new(prefix: Row, child: BoxedIterator) -> Self {
        BindIter {
            prefix,
            child,
            closed: false,
        }
    }
}

impl RowIterator for BindIter {
    fn next(&mut self, ctx: &mut ExecContext) -> QueryResult<Option<Row>> {
        match self.child.next(ctx)? {
            Some(row) => Ok(Some(self.prefix.concat(&row))),
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

pub struct LateralJoinIter {
    config: JoinConfig,
    left: BoxedIterator,
    right_factory: RightFactory,
    /// Emit a null-extended row for left rows whose fragment produced
    /// nothing (outer apply)
    outer: bool,
    current_left: Option<Row>,
    right: Option<BoxedIterator>,
    found_match: bool,
    closed: bool,
}

impl LateralJoinIter {
    pub fn new(
        config: JoinConfig,
        left: BoxedIterator,
        right_factory: RightFactory,
        outer: bool,
    ) -> Self {
        LateralJoinIter {
            config,
            left,
            right_factory,
            outer,
            current_left: None,
            right: None,
            found_match: false,
            closed: false,
        }
    }

    fn close_right(&mut self, ctx: &mut ExecContext) -> QueryResult<()> {
        if let Some(mut right) = self.right.take() {
            right.close(ctx)?;
        }
        Ok(())
    }
}

impl RowIterator for LateralJoinIter {
    fn next(&mut self, ctx: &mut ExecContext) -> QueryResult<Option<Row>> {
        loop {
            ctx.check_cancelled()?;
            if self.current_left.is_none() {
                match self.left.next(ctx)? {
                    Some(left) => {
                        // The fragment is always rebuilt; a cached right
                        // side would see a stale binding
                        self.right = Some((self.right_factory)(ctx, Some(&left))?);
                        self.current_left = Some(left);
                        self.found_match = false;
                    }
                    None => return Ok(None),
                }
            }

            let left = self.current_left.clone().unwrap();
            let right_iter = self.right.as_mut().unwrap();
            match right_iter.next(ctx) {
                Ok(Some(right)) => {
                    if self.config.matches(ctx, &left, &right)? {
                        self.found_match = true;
                        return Ok(Some(self.config.compose(&left, &right)));
                    }
                }
                Ok(None) => {
                    self.close_right(ctx)?;
                    self.current_left = None;
                    if self.outer && !self.found_match {
                        return Ok(Some(self.config.null_extended(&left)));
                    }
                }
                Err(e) => {
                    let _ = self.close_right(ctx);
                    return Err(e);
                }
            }
        }
    }

    fn close(&mut self, ctx: &mut ExecContext) -> QueryResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        let right_result = self.close_right(ctx);
        let left_result = self.left.close(ctx);
        right_result.and(left_result)
    }
}
