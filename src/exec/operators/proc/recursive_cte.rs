// Recursive CTE Execution
//
// Alternates between a seed iterator and a recursive iterator fed by the
// previous pass's materialized rows, emitting each pass's new rows before
// computing the next. Evaluation stops when a pass contributes nothing.
// Under UNION the rows seen so far deduplicate new ones by row hash, which
// is also what makes cycle-producing recursions terminate; UNION ALL keeps
// duplicates and relies on the iteration ceiling.

use std::collections::HashSet;

use crate::error::{QueryError, QueryResult};
use crate::exec::{BoxedIterator, ExecContext, RowIterator, materialize};
use crate::row::{Row, row_hash};

/// Hard ceiling on recursive passes.
pub const RECURSION_LIMIT: usize = 10_000;

/// Builds the recursive member's iterator over the previous pass's rows.
pub type RecursiveFactory =
    Box<dyn FnMut(&mut ExecContext, &[Row]) -> QueryResult<BoxedIterator> + Send>;

pub struct RecursiveCteIter {
    seed: Option<BoxedIterator>,
    recursive: RecursiveFactory,
    /// UNION deduplicates across all passes; UNION ALL does not
    dedup: bool,
    limit: usize,
    seen: HashSet<u64>,
    /// Rows produced by the latest pass, both the pending output and the
    /// next pass's input
    working: Vec<Row>,
    emit_index: usize,
    passes: usize,
    done: bool,
    closed: bool,
}

impl RecursiveCteIter {
    pub fn new(seed: BoxedIterator, recursive: RecursiveFactory, dedup: bool) -> Self {
        RecursiveCteIter {
            seed: Some(seed),
            recursive,
            dedup,
            limit: RECURSION_LIMIT,
            seen: HashSet::new(),
            working: Vec::new(),
            emit_index: 0,
            passes: 0,
            done: false,
            closed: false,
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    fn run_pass(&mut self, ctx: &mut ExecContext) -> QueryResult<Vec<Row>> {
        let mut iter = match self.seed.take() {
            Some(seed) => seed,
            None => (self.recursive)(ctx, &self.working)?,
        };
        let rows = materialize(iter.as_mut(), ctx);
        let close_result = iter.close(ctx);
        let rows = rows?;
        close_result?;

        if !self.dedup {
            return Ok(rows);
        }
        let mut fresh = Vec::new();
        for row in rows {
            if self.seen.insert(row_hash(row.values())) {
                fresh.push(row);
            }
        }
        Ok(fresh)
    }

    fn advance(&mut self, ctx: &mut ExecContext) -> QueryResult<()> {
        ctx.check_cancelled()?;
        if self.passes >= self.limit {
            return Err(QueryError::RecursionLimitExceeded(self.limit));
        }
        self.passes += 1;
        let fresh = self.run_pass(ctx)?;
        if fresh.is_empty() {
            self.done = true;
        }
        self.working = fresh;
        self.emit_index = 0;
        Ok(())
    }
}

impl RowIterator for RecursiveCteIter {
    fn next(&mut self, ctx: &mut ExecContext) -> QueryResult<Option<Row>> {
        loop {
            if self.emit_index < self.working.len() {
                let row = self.working[self.emit_index].clone();
                self.emit_index += 1;
                return Ok(Some(row));
            }
            if self.done {
                return Ok(None);
            }
            self.advance(ctx)?;
        }
    }

    fn close(&mut self, ctx: &mut ExecContext) -> QueryResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.working.clear();
        self.seen.clear();
        match self.seed.take() {
            Some(mut seed) => seed.close(ctx),
            None => Ok(()),
        }
    }
}
