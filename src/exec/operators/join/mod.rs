// Join Operators Module
//
// Six join strategies share the row-composition discipline defined here:
// every join produces rows as `parent-stripped ‖ left ‖ right`, nulling
// the right side for unmatched left rows on left-outer joins.

pub use self::full_outer::FullOuterJoinIter;
pub use self::hash_join::HashJoinIter;
pub use self::lateral::{BindIter, LateralJoinIter};
pub use self::merge_join::MergeJoinIter;
pub use self::nested_loop::NestedLoopJoinIter;
pub use self::range_heap::RangeHeapJoinIter;
pub use self::semi::SemiJoinIter;

mod full_outer;
mod hash_join;
mod lateral;
mod merge_join;
mod nested_loop;
mod range_heap;
mod semi;

use std::sync::Arc;

use crate::error::QueryResult;
use crate::exec::{BoxedIterator, ExecContext};
use crate::expr::{Expression, eval_condition};
use crate::row::{Row, Schema};

/// Builds a fresh right-side iterator, optionally seeded with the current
/// left row for correlated access.
pub type RightFactory =
    Box<dyn FnMut(&mut ExecContext, Option<&Row>) -> QueryResult<BoxedIterator> + Send>;

/// Join type tag shared by all strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    LeftOuter,
    FullOuter,
    Semi,
    Anti,
    Cross,
    Lateral,
    Interval,
}

impl JoinKind {
    pub fn is_left_outer(&self) -> bool {
        matches!(self, JoinKind::LeftOuter)
    }
}

/// Parameters shared by every join strategy. The row layout is fixed at
/// plan-compile time: left-child rows carry a parent-scope prefix of
/// `parent_len` values which is stripped from output rows.
#[derive(Clone)]
pub struct JoinConfig {
    pub kind: JoinKind,
    pub parent_len: usize,
    pub left_schema: Schema,
    pub right_schema: Schema,
    /// Join condition over the combined `parent ‖ left ‖ right` row
    pub condition: Option<Arc<dyn Expression>>,
}

impl JoinConfig {
    pub fn new(kind: JoinKind, left_schema: Schema, right_schema: Schema) -> Self {
        JoinConfig {
            kind,
            parent_len: 0,
            left_schema,
            right_schema,
            condition: None,
        }
    }

    pub fn with_condition(mut self, condition: Arc<dyn Expression>) -> Self {
        self.condition = Some(condition);
        self
    }

    pub fn with_parent_len(mut self, parent_len: usize) -> Self {
        self.parent_len = parent_len;
        self
    }

    pub fn is_null_rejecting(&self) -> bool {
        self.condition
            .as_ref()
            .map(|c| c.is_null_rejecting())
            .unwrap_or(false)
    }

    /// Evaluate the join condition against one (left, right) pair. The
    /// left row still carries its parent prefix here.
    pub fn matches(&self, ctx: &mut ExecContext, left: &Row, right: &Row) -> QueryResult<bool> {
        let combined = left.concat(right);
        eval_condition(self.condition.as_ref(), ctx, &combined)
    }

    /// Compose an output row, stripping the parent prefix.
    pub fn compose(&self, left: &Row, right: &Row) -> Row {
        left.concat(right).strip_prefix(self.parent_len)
    }

    /// A left row extended with NULLs for the right side, for unmatched
    /// left rows under left-outer semantics.
    pub fn null_extended(&self, left: &Row) -> Row {
        self.compose(left, &self.right_schema.null_row())
    }
}
