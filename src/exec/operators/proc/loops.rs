// Loop Execution
//
// One generalized loop primitive serves LOOP, WHILE, and REPEAT. WHILE
// checks its condition before each pass, REPEAT runs the body once before
// the first check, bare LOOP has no condition and ends only through LEAVE.
// An iteration ceiling turns a runaway loop into an explicit error instead
// of a hang.

use crate::error::{QueryError, QueryResult, SignalKind};
use crate::exec::{ExecContext, RowIterator, materialize};
use crate::row::Row;

use super::StatementFactory;

pub const DEFAULT_LOOP_LIMIT: usize = 1_000_000;

/// Evaluated between iterations; returning false ends the loop.
pub type LoopCondition = Box<dyn FnMut(&mut ExecContext) -> QueryResult<bool> + Send>;

pub struct LoopIter {
    label: Option<String>,
    body: StatementFactory,
    condition: Option<LoopCondition>,
    /// REPEAT runs the body once before the first condition check
    run_once_first: bool,
    limit: usize,
    /// Rows of the body's last completed pass, surfaced after the loop
    /// when the body is select-shaped
    body_select_shaped: bool,
    result: Vec<Row>,
    executed: bool,
    emit_index: usize,
    closed: bool,
}

impl LoopIter {
    pub fn new(
        label: Option<String>,
        body: StatementFactory,
        condition: Option<LoopCondition>,
        run_once_first: bool,
    ) -> Self {
        LoopIter {
            label,
            body,
            condition,
            run_once_first,
            limit: DEFAULT_LOOP_LIMIT,
            body_select_shaped: false,
            result: Vec::new(),
            executed: false,
            emit_index: 0,
            closed: false,
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_select_shaped_body(mut self) -> Self {
        self.body_select_shaped = true;
        self
    }

    fn should_run(&mut self, ctx: &mut ExecContext, iteration: usize) -> QueryResult<bool> {
        if iteration == 0 && self.run_once_first {
            return Ok(true);
        }
        match self.condition.as_mut() {
            Some(condition) => condition(ctx),
            None => Ok(true),
        }
    }

    fn run_body(&mut self, ctx: &mut ExecContext) -> QueryResult<Vec<Row>> {
        let mut iter = (self.body)(ctx)?;
        let rows = materialize(iter.as_mut(), ctx);
        let close_result = iter.close(ctx);
        let rows = rows?;
        close_result?;
        Ok(rows)
    }

    fn execute(&mut self, ctx: &mut ExecContext) -> QueryResult<()> {
        let mut iteration = 0usize;
        loop {
            ctx.check_cancelled()?;
            if !self.should_run(ctx, iteration)? {
                return Ok(());
            }
            if iteration >= self.limit {
                return Err(QueryError::LoopLimitExceeded(self.limit));
            }
            iteration += 1;
            match self.run_body(ctx) {
                Ok(rows) => {
                    if self.body_select_shaped {
                        self.result = rows;
                    }
                }
                Err(QueryError::Control(signal)) => {
                    let ours = self
                        .label
                        .as_ref()
                        .is_some_and(|label| *label == signal.label);
                    match (ours, signal.kind) {
                        (true, SignalKind::Leave) => return Ok(()),
                        (true, SignalKind::Iterate) => continue,
                        _ => return Err(QueryError::Control(signal)),
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }
}

impl RowIterator for LoopIter {
    fn next(&mut self, ctx: &mut ExecContext) -> QueryResult<Option<Row>> {
        if !self.executed {
            self.executed = true;
            self.execute(ctx)?;
        }
        if self.emit_index < self.result.len() {
            let row = self.result[self.emit_index].clone();
            self.emit_index += 1;
            Ok(Some(row))
        } else {
            Ok(None)
        }
    }

    fn close(&mut self, _ctx: &mut ExecContext) -> QueryResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.result.clear();
        Ok(())
    }
}
