// Sort-Merge Join Implementation
//
// Assumes both children arrive pre-sorted on the join key. Modeled as an
// explicit state machine rather than nested loops because the merge must
// buffer lookahead rows to detect key-group boundaries before deciding to
// advance. For each key the whole right group is buffered and replayed
// against every equal-keyed left row, so duplicate keys on both sides
// yield the full cross product for that key exactly once.

use std::cmp::Ordering;
use std::sync::Arc;

use crate::error::QueryResult;
use crate::exec::{BoxedIterator, ExecContext, RowIterator, close_all};
use crate::expr::Expression;
use crate::row::{DataValue, Row};

use super::JoinConfig;

/// Merge state. A NULL anywhere in a compared key cannot match under
/// three-valued logic, so null keys route through RejectNull, which
/// advances past the null-keyed row (emitting the outer row first for an
/// unmatched left row under left-outer).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MergeState {
    Init,
    ExhaustCheck,
    Compare,
    AdvanceLeft,
    AdvanceRight,
    Select,
    Return,
    ReturnLeft,
    RejectNullLeft,
    RejectNullRight,
    Done,
}

pub struct MergeJoinIter {
    config: JoinConfig,
    left: BoxedIterator,
    right: BoxedIterator,
    left_key: Vec<Arc<dyn Expression>>,
    right_key: Vec<Arc<dyn Expression>>,
    state: MergeState,
    left_row: Option<Row>,
    /// Lookahead: the first right row not yet assigned to a group
    right_row: Option<Row>,
    /// Buffered right rows sharing the current group key
    group: Vec<Row>,
    group_key: Option<Vec<DataValue>>,
    group_index: usize,
    left_matched: bool,
    closed: bool,
}

impl MergeJoinIter {
    pub fn new(
        config: JoinConfig,
        left: BoxedIterator,
        right: BoxedIterator,
        left_key: Vec<Arc<dyn Expression>>,
        right_key: Vec<Arc<dyn Expression>>,
    ) -> Self {
        MergeJoinIter {
            config,
            left,
            right,
            left_key,
            right_key,
            state: MergeState::Init,
            left_row: None,
            right_row: None,
            group: Vec::new(),
            group_key: None,
            group_index: 0,
            left_matched: false,
            closed: false,
        }
    }

    fn eval_key(
        exprs: &[Arc<dyn Expression>],
        ctx: &mut ExecContext,
        row: &Row,
    ) -> QueryResult<Vec<DataValue>> {
        let mut key = Vec::with_capacity(exprs.len());
        for expr in exprs {
            key.push(expr.eval(ctx, row)?);
        }
        Ok(key)
    }

    fn compare_keys(a: &[DataValue], b: &[DataValue]) -> QueryResult<Ordering> {
        for (x, y) in a.iter().zip(b.iter()) {
            match x.compare(y)? {
                Ordering::Equal => continue,
                ordering => return Ok(ordering),
            }
        }
        Ok(Ordering::Equal)
    }

    fn left_key_of(&mut self, ctx: &mut ExecContext) -> QueryResult<Vec<DataValue>> {
        let row = self.left_row.clone().unwrap();
        Self::eval_key(&self.left_key, ctx, &row)
    }

    fn right_key_of(&mut self, ctx: &mut ExecContext) -> QueryResult<Vec<DataValue>> {
        let row = self.right_row.clone().unwrap();
        Self::eval_key(&self.right_key, ctx, &row)
    }
}

impl RowIterator for MergeJoinIter {
    fn next(&mut self, ctx: &mut ExecContext) -> QueryResult<Option<Row>> {
        loop {
            ctx.check_cancelled()?;
            match self.state {
                MergeState::Init => {
                    self.left_row = self.left.next(ctx)?;
                    self.right_row = self.right.next(ctx)?;
                    self.left_matched = false;
                    self.state = MergeState::ExhaustCheck;
                }

                MergeState::ExhaustCheck => {
                    if self.left_row.is_none() {
                        self.state = MergeState::Done;
                        continue;
                    }
                    // Replay the buffered group for an equal-keyed left row
                    if let Some(group_key) = self.group_key.clone() {
                        let left_key = self.left_key_of(ctx)?;
                        if !left_key.iter().any(|v| v.is_null())
                            && Self::compare_keys(&left_key, &group_key)? == Ordering::Equal
                        {
                            self.group_index = 0;
                            self.state = MergeState::Return;
                            continue;
                        }
                        // Left moved past this key group
                        self.group.clear();
                        self.group_key = None;
                    }
                    if self.right_row.is_none() {
                        // Right exhausted; under left-outer the remaining
                        // left rows are all unmatched
                        if self.config.kind.is_left_outer() {
                            self.state = MergeState::ReturnLeft;
                        } else {
                            self.state = MergeState::Done;
                        }
                        continue;
                    }
                    self.state = MergeState::Compare;
                }

                MergeState::Compare => {
                    let left_key = self.left_key_of(ctx)?;
                    if left_key.iter().any(|v| v.is_null()) {
                        self.state = MergeState::RejectNullLeft;
                        continue;
                    }
                    let right_key = self.right_key_of(ctx)?;
                    if right_key.iter().any(|v| v.is_null()) {
                        self.state = MergeState::RejectNullRight;
                        continue;
                    }
                    self.state = match Self::compare_keys(&left_key, &right_key)? {
                        Ordering::Less => {
                            if self.config.kind.is_left_outer() {
                                MergeState::ReturnLeft
                            } else {
                                MergeState::AdvanceLeft
                            }
                        }
                        Ordering::Greater => MergeState::AdvanceRight,
                        Ordering::Equal => MergeState::Select,
                    };
                }

                MergeState::Select => {
                    // Buffer every right row whose key equals the current
                    // left key, leaving the first non-member as lookahead
                    let group_key = self.right_key_of(ctx)?;
                    self.group.clear();
                    self.group.push(self.right_row.take().unwrap());
                    loop {
                        self.right_row = self.right.next(ctx)?;
                        let Some(_) = self.right_row else { break };
                        let key = self.right_key_of(ctx)?;
                        if key.iter().any(|v| v.is_null())
                            || Self::compare_keys(&key, &group_key)? != Ordering::Equal
                        {
                            break;
                        }
                        self.group.push(self.right_row.take().unwrap());
                    }
                    self.group_key = Some(group_key);
                    self.group_index = 0;
                    self.state = MergeState::Return;
                }

                MergeState::Return => {
                    if self.group_index >= self.group.len() {
                        if self.config.kind.is_left_outer() && !self.left_matched {
                            self.state = MergeState::ReturnLeft;
                        } else {
                            self.state = MergeState::AdvanceLeft;
                        }
                        continue;
                    }
                    let left = self.left_row.clone().unwrap();
                    let right = self.group[self.group_index].clone();
                    self.group_index += 1;
                    // Residual filter conditions beyond the merge key
                    if self.config.condition.is_some()
                        && !self.config.matches(ctx, &left, &right)?
                    {
                        continue;
                    }
                    self.left_matched = true;
                    return Ok(Some(self.config.compose(&left, &right)));
                }

                MergeState::ReturnLeft => {
                    // Emit the unmatched left row exactly once, then advance
                    let left = self.left_row.clone().unwrap();
                    self.left_row = self.left.next(ctx)?;
                    self.left_matched = false;
                    self.state = MergeState::ExhaustCheck;
                    return Ok(Some(self.config.null_extended(&left)));
                }

                MergeState::AdvanceLeft => {
                    self.left_row = self.left.next(ctx)?;
                    self.left_matched = false;
                    self.state = MergeState::ExhaustCheck;
                }

                MergeState::AdvanceRight => {
                    self.right_row = self.right.next(ctx)?;
                    self.state = MergeState::ExhaustCheck;
                }

                MergeState::RejectNullLeft => {
                    // A null left key can never match; still owes the
                    // caller an outer row under left-outer
                    self.state = if self.config.kind.is_left_outer() {
                        MergeState::ReturnLeft
                    } else {
                        MergeState::AdvanceLeft
                    };
                }

                MergeState::RejectNullRight => {
                    self.state = MergeState::AdvanceRight;
                }

                MergeState::Done => return Ok(None),
            }
        }
    }

    fn close(&mut self, ctx: &mut ExecContext) -> QueryResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.group.clear();
        self.state = MergeState::Done;
        close_all(ctx, [&mut self.left, &mut self.right])
    }
}
