// Transaction Coordination Wrappers
//
// Two decorator iterators around the transaction collaborator. The commit
// wrapper commits the active transaction when the statement closes
// cleanly under autocommit; it never commits after an error surfaced
// mid-iteration, leaving the transaction usable for statement-level
// retry. The trigger wrapper brackets its child in a named savepoint so a
// failing trigger rolls back every write it and earlier triggers made.

use crate::error::QueryResult;
use crate::exec::{BoxedIterator, ExecContext, RowIterator, SwappableChild};
use crate::row::Row;

/// Commits on clean close under autocommit.
pub struct CommitOnCloseIter {
    child: BoxedIterator,
    /// DDL-style statements commit even when a previous statement left a
    /// transaction open
    implicit_commit: bool,
    error_seen: bool,
    closed: bool,
}

impl CommitOnCloseIter {
    pub fn new(child: BoxedIterator) -> Self {
        CommitOnCloseIter {
            child,
            implicit_commit: false,
            error_seen: false,
            closed: false,
        }
    }

    pub fn with_implicit_commit(mut self) -> Self {
        self.implicit_commit = true;
        self
    }

    fn should_commit(&self, ctx: &ExecContext) -> bool {
        if self.error_seen {
            return false;
        }
        if self.implicit_commit {
            return true;
        }
        ctx.session().autocommit && !ctx.session().in_explicit_transaction
    }
}

impl RowIterator for CommitOnCloseIter {
    fn next(&mut self, ctx: &mut ExecContext) -> QueryResult<Option<Row>> {
        match self.child.next(ctx) {
            Ok(row) => Ok(row),
            Err(e) => {
                self.error_seen = true;
                Err(e)
            }
        }
    }

    fn close(&mut self, ctx: &mut ExecContext) -> QueryResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        let child_result = self.child.close(ctx);
        if child_result.is_err() {
            self.error_seen = true;
        }
        if self.should_commit(ctx) {
            ctx.txn().commit_transaction()?;
        }
        child_result
    }
}

impl SwappableChild for CommitOnCloseIter {
    fn child(&self) -> &dyn RowIterator {
        self.child.as_ref()
    }

    fn replace_child(&mut self, child: BoxedIterator) -> BoxedIterator {
        std::mem::replace(&mut self.child, child)
    }
}

/// Brackets trigger execution in a named savepoint.
pub struct TriggerSavepointIter {
    child: BoxedIterator,
    savepoint: String,
    savepoint_open: bool,
    closed: bool,
}

impl TriggerSavepointIter {
    pub fn new(child: BoxedIterator, savepoint: impl Into<String>) -> Self {
        TriggerSavepointIter {
            child,
            savepoint: savepoint.into(),
            savepoint_open: false,
            closed: false,
        }
    }

    fn ensure_savepoint(&mut self, ctx: &mut ExecContext) -> QueryResult<()> {
        if !self.savepoint_open {
            ctx.txn().create_savepoint(&self.savepoint)?;
            self.savepoint_open = true;
        }
        Ok(())
    }

    /// Error path: rewind to the savepoint, then release it, then let the
    /// original error propagate.
    fn unwind(&mut self, ctx: &mut ExecContext) {
        if !self.savepoint_open {
            return;
        }
        self.savepoint_open = false;
        if let Err(e) = ctx.txn().rollback_to_savepoint(&self.savepoint) {
            log::error!("savepoint rollback failed during unwind: {}", e);
            return;
        }
        if let Err(e) = ctx.txn().release_savepoint(&self.savepoint) {
            log::error!("savepoint release failed during unwind: {}", e);
        }
    }
}

impl RowIterator for TriggerSavepointIter {
    fn next(&mut self, ctx: &mut ExecContext) -> QueryResult<Option<Row>> {
        self.ensure_savepoint(ctx)?;
        match self.child.next(ctx) {
            Ok(row) => Ok(row),
            Err(e) => {
                self.unwind(ctx);
                Err(e)
            }
        }
    }

    fn close(&mut self, ctx: &mut ExecContext) -> QueryResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        let child_result = self.child.close(ctx);
        if self.savepoint_open {
            match &child_result {
                Ok(()) => {
                    self.savepoint_open = false;
                    ctx.txn().release_savepoint(&self.savepoint)?;
                }
                Err(_) => self.unwind(ctx),
            }
        }
        child_result
    }
}
