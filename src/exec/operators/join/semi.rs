// Semi and Anti Join Implementation
//
// Semi join emits each left row at most once when any right row matches;
// anti join emits each left row only when no right row matches. Neither
// variant ever emits right columns. The right side is rebuilt per left row
// through the factory so correlated subquery plans can re-bind, and the
// probe short-circuits on the first matching right row.

use crate::error::QueryResult;
use crate::exec::{BoxedIterator, ExecContext, RowIterator};
use crate::row::Row;

use super::{JoinConfig, JoinKind, RightFactory};

pub struct SemiJoinIter {
    config: JoinConfig,
    left: BoxedIterator,
    right_factory: RightFactory,
    /// Set once the first rebuild produces zero rows for an uncorrelated
    /// right side, letting semi joins finish without draining the left
    right_known_empty: bool,
    correlated: bool,
    started: bool,
    closed: bool,
}

impl SemiJoinIter {
    pub fn new(
        config: JoinConfig,
        left: BoxedIterator,
        right_factory: RightFactory,
        correlated: bool,
    ) -> Self {
        debug_assert!(matches!(config.kind, JoinKind::Semi | JoinKind::Anti));
        SemiJoinIter {
            config,
            left,
            right_factory,
            right_known_empty: false,
            correlated,
            started: false,
            closed: false,
        }
    }

    /// Probes the right side for the given left row. Returns true on the
    /// first match, closing the probe iterator early.
    fn has_match(&mut self, ctx: &mut ExecContext, left: &Row) -> QueryResult<bool> {
        let bound = if self.correlated { Some(left) } else { None };
        let mut right = (self.right_factory)(ctx, bound)?;
        let mut seen_any = false;
        let mut matched = false;
        let result = loop {
            match right.next(ctx) {
                Ok(Some(row)) => {
                    seen_any = true;
                    match self.config.matches(ctx, left, &row) {
                        Ok(true) => {
                            matched = true;
                            break Ok(());
                        }
                        Ok(false) => continue,
                        Err(e) => break Err(e),
                    }
                }
                Ok(None) => break Ok(()),
                Err(e) => break Err(e),
            }
        };
        let close_result = right.close(ctx);
        result?;
        close_result?;
        if !self.started && !self.correlated {
            self.right_known_empty = !seen_any;
        }
        self.started = true;
        Ok(matched)
    }
}

impl RowIterator for SemiJoinIter {
    fn next(&mut self, ctx: &mut ExecContext) -> QueryResult<Option<Row>> {
        loop {
            ctx.check_cancelled()?;
            if self.config.kind == JoinKind::Semi && self.right_known_empty {
                return Ok(None);
            }
            let Some(left) = self.left.next(ctx)? else {
                return Ok(None);
            };
            let matched = if self.config.kind == JoinKind::Anti && self.right_known_empty {
                false
            } else {
                self.has_match(ctx, &left)?
            };
            let emit = match self.config.kind {
                JoinKind::Semi => matched,
                JoinKind::Anti => !matched,
                _ => unreachable!(),
            };
            if emit {
                return Ok(Some(left));
            }
        }
    }

    fn close(&mut self, ctx: &mut ExecContext) -> QueryResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.left.close(ctx)
    }
}
