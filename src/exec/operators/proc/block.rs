// Block Execution
//
// Runs a fixed sequence of statements. Errors raised inside are matched
// against the block's ordered condition handlers; a CONTINUE handler
// swallows the error and resumes with the next statement, an EXIT handler
// unwinds to the end of the matching labeled block. Only the last
// select-shaped statement's rows are surfaced to the caller, cached
// eagerly so no inner iterator outlives its statement.

use crate::error::{ControlSignal, QueryError, QueryResult, SignalKind};
use crate::exec::{ExecContext, RowIterator, materialize};
use crate::row::Row;

use super::StatementFactory;

/// What a condition handler matches
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandlerCondition {
    /// An exact SQLSTATE value
    SqlState(String),
    /// The NOT FOUND class (SQLSTATE 02xxx)
    NotFound,
    /// The SQLWARNING class (SQLSTATE 01xxx)
    SqlWarning,
    /// Any other error that carries a SQLSTATE
    SqlException,
}

impl HandlerCondition {
    fn matches(&self, error: &QueryError) -> bool {
        let Some(state) = error.sql_state() else {
            return false;
        };
        match self {
            HandlerCondition::SqlState(s) => s == state,
            HandlerCondition::NotFound => state.starts_with("02"),
            HandlerCondition::SqlWarning => state.starts_with("01"),
            HandlerCondition::SqlException => {
                !state.starts_with("01") && !state.starts_with("02")
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerAction {
    /// Unwind to the end of the enclosing labeled block
    Exit,
    /// Swallow the error and resume with the next statement
    Continue,
}

pub struct ConditionHandler {
    pub condition: HandlerCondition,
    pub action: HandlerAction,
}

/// One statement of a block body
pub struct Statement {
    factory: StatementFactory,
    /// Select-shaped statements contribute their rows as the candidate
    /// block result
    select_shaped: bool,
}

impl Statement {
    pub fn new(factory: StatementFactory) -> Self {
        Statement {
            factory,
            select_shaped: false,
        }
    }

    pub fn select_shaped(factory: StatementFactory) -> Self {
        Statement {
            factory,
            select_shaped: true,
        }
    }
}

pub struct BlockIter {
    label: Option<String>,
    statements: Vec<Statement>,
    handlers: Vec<ConditionHandler>,
    /// Rows of the most recent select-shaped statement
    result: Vec<Row>,
    executed: bool,
    emit_index: usize,
    closed: bool,
}

impl BlockIter {
    pub fn new(
        label: Option<String>,
        statements: Vec<Statement>,
        handlers: Vec<ConditionHandler>,
    ) -> Self {
        BlockIter {
            label,
            statements,
            handlers,
            result: Vec::new(),
            executed: false,
            emit_index: 0,
            closed: false,
        }
    }

    fn handler_for(&self, error: &QueryError) -> Option<HandlerAction> {
        self.handlers
            .iter()
            .find(|h| h.condition.matches(error))
            .map(|h| h.action)
    }

    /// Run one statement to completion, closing its iterator either way.
    fn run_statement(
        ctx: &mut ExecContext,
        statement: &mut Statement,
    ) -> QueryResult<Vec<Row>> {
        let mut iter = (statement.factory)(ctx)?;
        let rows = materialize(iter.as_mut(), ctx);
        let close_result = iter.close(ctx);
        let rows = rows?;
        close_result?;
        Ok(rows)
    }

    fn execute(&mut self, ctx: &mut ExecContext) -> QueryResult<()> {
        let mut index = 0;
        while index < self.statements.len() {
            ctx.check_cancelled()?;
            let select_shaped = self.statements[index].select_shaped;
            match Self::run_statement(ctx, &mut self.statements[index]) {
                Ok(rows) => {
                    if select_shaped {
                        self.result = rows;
                    }
                    index += 1;
                }
                Err(QueryError::Control(signal)) => {
                    return self.intercept(signal);
                }
                Err(error) => match self.handler_for(&error) {
                    Some(HandlerAction::Continue) => {
                        log::debug!("handler CONTINUE swallowed: {}", error);
                        index += 1;
                    }
                    Some(HandlerAction::Exit) => {
                        // EXIT completes this block; an unlabeled block
                        // absorbs it directly
                        log::debug!("handler EXIT on: {}", error);
                        match &self.label {
                            Some(label) => {
                                return self.intercept(ControlSignal::new(
                                    label.clone(),
                                    SignalKind::Exit,
                                ));
                            }
                            None => return Ok(()),
                        }
                    }
                    None => return Err(error),
                },
            }
        }
        Ok(())
    }

    /// A control signal reaching block level either targets this block's
    /// label (and ends it) or keeps travelling up.
    fn intercept(&self, signal: ControlSignal) -> QueryResult<()> {
        let ours = self
            .label
            .as_ref()
            .is_some_and(|label| *label == signal.label);
        if ours && matches!(signal.kind, SignalKind::Leave | SignalKind::Exit) {
            return Ok(());
        }
        Err(QueryError::Control(signal))
    }
}

impl RowIterator for BlockIter {
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
