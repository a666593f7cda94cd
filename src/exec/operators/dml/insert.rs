// Insert Operator Implementation
//
// Drives one storage insert per source row and reports the per-row effect
// through the execution context. The mode decides what a duplicate-key
// conflict means: plain inserts propagate it, REPLACE deletes the
// conflicting row and retries, ON DUPLICATE KEY UPDATE re-evaluates its
// assignments against the `old ‖ new` pair, and IGNORE downgrades the
// conflict to a warning.

use std::sync::Arc;

use crate::error::{QueryError, QueryResult, Warning};
use crate::exec::{BoxedIterator, ExecContext, RowIterator};
use crate::row::{DataValue, Row};
use crate::storage::Table;

use super::convert::{check_constraints, coerce_value, prepare_insert_row};
use super::{Assignment, RowEffect};

/// Conflict-handling mode of an insert statement
#[derive(Clone)]
pub enum InsertMode {
    Plain,
    Replace,
    /// Assignments evaluated against the combined `old ‖ new` row
    OnDuplicateKeyUpdate(Vec<Assignment>),
    Ignore,
}

pub struct InsertIter {
    table: Arc<dyn Table>,
    /// Source of value rows, one per row to insert
    child: BoxedIterator,
    /// Target offset of each supplied value
    columns: Vec<usize>,
    mode: InsertMode,
    closed: bool,
}

impl InsertIter {
    pub fn new(
        table: Arc<dyn Table>,
        child: BoxedIterator,
        columns: Vec<usize>,
        mode: InsertMode,
    ) -> Self {
        InsertIter {
            table,
            child,
            columns,
            mode,
            closed: false,
        }
    }

    fn is_ignore(&self) -> bool {
        matches!(self.mode, InsertMode::Ignore)
    }

    /// ON DUPLICATE KEY UPDATE path: fetch the conflicting row, apply the
    /// assignments over `old ‖ new`, write back only when something
    /// changed.
    fn on_duplicate_update(
        &self,
        ctx: &mut ExecContext,
        key: &[DataValue],
        new: &Row,
        assignments: &[Assignment],
    ) -> QueryResult<(Row, RowEffect)> {
        let old = self.table.lookup_key(key)?.ok_or_else(|| {
            QueryError::ExecutionError(format!(
                "duplicate key in table {} but conflicting row not found",
                self.table.name()
            ))
        })?;
        let combined = old.concat(new);
        let mut updated = old.clone();
        let schema = self.table.schema().clone();
        for (offset, expr) in assignments {
            let value = expr.eval(ctx, &combined)?;
            let column = &schema.columns()[*offset];
            updated.set(*offset, coerce_value(ctx, column, value, false)?);
        }
        check_constraints(ctx, &schema, &updated)?;
        let changed = !schema.rows_equal(&old, &updated);
        if changed {
            self.table.update(&old, &updated)?;
        }
        Ok((updated, RowEffect::DupKeyUpdated { changed }))
    }

    /// REPLACE path: delete the conflicting row, insert the new one.
    fn replace_conflicting(
        &self,
        key: &[DataValue],
        row: &Row,
    ) -> QueryResult<RowEffect> {
        let old = self.table.lookup_key(key)?.ok_or_else(|| {
            QueryError::ExecutionError(format!(
                "duplicate key in table {} but conflicting row not found",
                self.table.name()
            ))
        })?;
        self.table.delete(&old)?;
        self.table.insert(row)?;
        Ok(RowEffect::Replaced { prior_deleted: true })
    }
}

impl RowIterator for InsertIter {
    fn next(&mut self, ctx: &mut ExecContext) -> QueryResult<Option<Row>> {
        ctx.check_cancelled()?;
        let Some(supplied) = self.child.next(ctx)? else {
            return Ok(None);
        };
        ctx.session_mut().last_insert_id = None;
        let row = prepare_insert_row(
            ctx,
            &self.table,
            &self.columns,
            &supplied,
            self.is_ignore(),
        )?;

        let (row, effect) = match self.table.insert(&row) {
            Ok(()) => {
                let effect = match self.mode {
                    InsertMode::Replace => RowEffect::Replaced {
                        prior_deleted: false,
                    },
                    _ => RowEffect::Inserted {
                        last_id: ctx.session().last_insert_id,
                    },
                };
                (row, effect)
            }
            Err(QueryError::DuplicateKey(key)) => match &self.mode {
                InsertMode::Plain => return Err(QueryError::DuplicateKey(key)),
                InsertMode::Replace => {
                    let effect = self.replace_conflicting(&key, &row)?;
                    (row, effect)
                }
                InsertMode::OnDuplicateKeyUpdate(assignments) => {
                    let assignments = assignments.clone();
                    self.on_duplicate_update(ctx, &key, &row, &assignments)?
                }
                InsertMode::Ignore => {
                    ctx.add_warning(Warning {
                        message: QueryError::DuplicateKey(key).to_string(),
                    });
                    (row, RowEffect::IgnoredConflict)
                }
            },
            Err(e) => return Err(e),
        };

        ctx.set_effect(effect);
        Ok(Some(row))
    }

    fn close(&mut self, ctx: &mut ExecContext) -> QueryResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.child.close(ctx)
    }
}
