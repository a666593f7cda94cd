// DML Result Accumulator
//
// The outermost iterator of a DML pipeline (unless the statement has a
// RETURNING clause). Drains its child to completion, consumes the per-row
// effect the mutation iterator reported through the context, applies the
// counting rules of the statement kind, and emits exactly one summary row:
// rows affected, rows matched, last insert id, and an info string.

use std::collections::HashSet;

use crate::error::{QueryError, QueryResult};
use crate::exec::{BoxedIterator, ExecContext, RowIterator, SwappableChild};
use crate::row::{DataValue, Row, row_hash};

use super::RowEffect;

/// Statement kind, deciding which counting rules apply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DmlKind {
    Insert,
    Replace,
    OnDuplicate,
    Update,
    /// Update driven by a join; a target row reached through several join
    /// matches counts once, deduplicated by the hash of its old image of
    /// the given width
    UpdateJoin { old_width: usize },
    Delete,
}

pub struct AccumulatorIter {
    child: BoxedIterator,
    kind: DmlKind,
    affected: i64,
    matched: i64,
    last_insert_id: Option<i64>,
    seen: HashSet<u64>,
    done: bool,
    closed: bool,
}

impl AccumulatorIter {
    pub fn new(child: BoxedIterator, kind: DmlKind) -> Self {
        AccumulatorIter {
            child,
            kind,
            affected: 0,
            matched: 0,
            last_insert_id: None,
            seen: HashSet::new(),
            done: false,
            closed: false,
        }
    }

    fn apply(&mut self, row: &Row, effect: RowEffect) -> QueryResult<()> {
        if let DmlKind::UpdateJoin { old_width } = self.kind {
            let hash = row_hash(row.slice(0, old_width).values());
            if !self.seen.insert(hash) {
                return Ok(());
            }
        }
        match (self.kind, effect) {
            (DmlKind::Insert, RowEffect::Inserted { last_id }) => {
                self.affected += 1;
                if self.last_insert_id.is_none() {
                    self.last_insert_id = last_id;
                }
            }
            (DmlKind::Insert, RowEffect::IgnoredConflict) => {}
            (DmlKind::Replace, RowEffect::Replaced { prior_deleted }) => {
                self.affected += if prior_deleted { 2 } else { 1 };
            }
            (DmlKind::OnDuplicate, RowEffect::Inserted { last_id }) => {
                self.affected += 1;
                if self.last_insert_id.is_none() {
                    self.last_insert_id = last_id;
                }
            }
            (DmlKind::OnDuplicate, RowEffect::DupKeyUpdated { changed }) => {
                self.matched += 1;
                if changed {
                    self.affected += 2;
                }
            }
            (DmlKind::OnDuplicate, RowEffect::IgnoredConflict) => {}
            (DmlKind::Update | DmlKind::UpdateJoin { .. }, RowEffect::Updated { changed }) => {
                self.matched += 1;
                if changed {
                    self.affected += 1;
                }
            }
            (DmlKind::Delete, RowEffect::Deleted) => {
                self.affected += 1;
            }
            (kind, effect) => {
                return Err(QueryError::ExecutionError(format!(
                    "unexpected row effect {:?} for {:?} statement",
                    effect, kind
                )));
            }
        }
        Ok(())
    }

    fn summary(&self, ctx: &ExecContext) -> Row {
        let info = match self.kind {
            DmlKind::Update | DmlKind::UpdateJoin { .. } | DmlKind::OnDuplicate => format!(
                "Rows matched: {}  Changed: {}  Warnings: {}",
                self.matched,
                self.affected,
                ctx.warnings().len()
            ),
            _ => format!(
                "Records: {}  Warnings: {}",
                self.affected,
                ctx.warnings().len()
            ),
        };
        Row::from_values(vec![
            DataValue::Integer(self.affected),
            DataValue::Integer(self.matched),
            self.last_insert_id
                .map(DataValue::Integer)
                .unwrap_or(DataValue::Null),
            DataValue::Text(info),
        ])
    }
}

impl RowIterator for AccumulatorIter {
    fn next(&mut self, ctx: &mut ExecContext) -> QueryResult<Option<Row>> {
        if self.done {
            return Ok(None);
        }
        while let Some(row) = self.child.next(ctx)? {
            ctx.check_cancelled()?;
            let effect = ctx.take_effect().ok_or_else(|| {
                QueryError::ExecutionError(
                    "DML pipeline produced a row without an effect".to_string(),
                )
            })?;
            self.apply(&row, effect)?;
        }
        self.done = true;
        Ok(Some(self.summary(ctx)))
    }

    fn close(&mut self, ctx: &mut ExecContext) -> QueryResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.child.close(ctx)
    }
}

impl SwappableChild for AccumulatorIter {
    fn child(&self) -> &dyn RowIterator {
        self.child.as_ref()
    }

    fn replace_child(&mut self, child: BoxedIterator) -> BoxedIterator {
        std::mem::replace(&mut self.child, child)
    }
}
