// Nested Loop Join Implementation
//
// Works for any join condition at O(n*m) cost. For each left row the right
// side is rebuilt through a factory, optionally seeded with the left row
// for correlated access. An empty right-hand side short-circuits to
// immediate completion without rescanning.

use crate::error::QueryResult;
use crate::exec::{BoxedIterator, ExecContext, RowIterator};
use crate::row::Row;

use super::{JoinConfig, JoinKind, RightFactory};

pub struct NestedLoopJoinIter {
    config: JoinConfig,
    left: BoxedIterator,
    right_factory: RightFactory,
    /// Pass the current left row to the factory (correlated right side)
    seeded: bool,
    current_left: Option<Row>,
    right: Option<BoxedIterator>,
    /// Rows seen in the current right scan
    right_rows_seen: usize,
    /// The right side produced no rows on an unseeded scan; later left
    /// rows skip the scan entirely
    right_known_empty: bool,
    found_match: bool,
    started: bool,
    closed: bool,
}

impl NestedLoopJoinIter {
    pub fn new(
        config: JoinConfig,
        left: BoxedIterator,
        right_factory: RightFactory,
        seeded: bool,
    ) -> Self {
        NestedLoopJoinIter {
            config,
            left,
            right_factory,
            seeded,
            current_left: None,
            right: None,
            right_rows_seen: 0,
            right_known_empty: false,
            found_match: false,
            started: false,
            closed: false,
        }
    }

    fn advance_left(&mut self, ctx: &mut ExecContext) -> QueryResult<()> {
        self.current_left = self.left.next(ctx)?;
        self.found_match = false;
        Ok(())
    }

    /// Null-extend and advance, the left-outer path for an unmatched left
    /// row.
    fn emit_unmatched(&mut self, ctx: &mut ExecContext) -> QueryResult<Option<Row>> {
        let left = self.current_left.as_ref().unwrap().clone();
        self.advance_left(ctx)?;
        Ok(Some(self.config.null_extended(&left)))
    }
}

impl RowIterator for NestedLoopJoinIter {
    fn next(&mut self, ctx: &mut ExecContext) -> QueryResult<Option<Row>> {
        if !self.started {
            self.started = true;
            self.advance_left(ctx)?;
        }
        loop {
            ctx.check_cancelled()?;
            let Some(left_row) = self.current_left.clone() else {
                return Ok(None);
            };

            if self.right.is_none() {
                if self.right_known_empty && !self.seeded {
                    // Immediate outer completion without scanning
                    if self.config.kind.is_left_outer() {
                        return self.emit_unmatched(ctx);
                    }
                    return Ok(None);
                }
                let seed = if self.seeded { Some(&left_row) } else { None };
                self.right = Some((self.right_factory)(ctx, seed)?);
                self.right_rows_seen = 0;
            }

            match self.right.as_mut().unwrap().next(ctx)? {
                Some(right_row) => {
                    self.right_rows_seen += 1;
                    let qualifies = match self.config.kind {
                        JoinKind::Cross => true,
                        _ => self.config.matches(ctx, &left_row, &right_row)?,
                    };
                    if qualifies {
                        self.found_match = true;
                        return Ok(Some(self.config.compose(&left_row, &right_row)));
                    }
                }
                None => {
                    let mut right = self.right.take().unwrap();
                    right.close(ctx)?;
                    if self.right_rows_seen == 0 && !self.seeded {
                        self.right_known_empty = true;
                    }
                    if self.config.kind.is_left_outer() && !self.found_match {
                        return self.emit_unmatched(ctx);
                    }
                    self.advance_left(ctx)?;
                }
            }
        }
    }

    fn close(&mut self, ctx: &mut ExecContext) -> QueryResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        let left_result = self.left.close(ctx);
        if let Some(mut right) = self.right.take() {
            let right_result = right.close(ctx);
            left_result.and(right_result)
        } else {
            left_result
        }
    }
}
