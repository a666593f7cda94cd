// Plan Node Tree
//
// The resolved logical plan handed in by the planner collaborator. A
// closed enum over every node kind the execution layer understands; the
// builder in `exec::build` matches it exhaustively, so adding a variant
// without a build case fails to compile. Nodes are cheap to clone (shared
// expressions sit behind `Arc`), which is what lets correlated subtrees
// and loop bodies be rebuilt at run time.

use std::sync::Arc;

use crate::exec::operators::agg::{AggregateSpec, WindowFunc};
use crate::exec::operators::dml::{Assignment, DmlKind, InsertMode};
use crate::exec::operators::join::JoinConfig;
use crate::exec::operators::sort::SortKey;
use crate::expr::Expression;
use crate::row::{DataValue, Row};

#[derive(Clone)]
pub enum PlanNode {
    /// Literal rows
    Values { rows: Vec<Row> },
    TableScan {
        table: String,
    },
    IndexRange {
        table: String,
        column: usize,
        low: Option<DataValue>,
        high: Option<DataValue>,
    },
    Filter {
        child: Box<PlanNode>,
        predicate: Arc<dyn Expression>,
    },
    Project {
        child: Box<PlanNode>,
        exprs: Vec<Arc<dyn Expression>>,
    },
    Sort {
        child: Box<PlanNode>,
        keys: Vec<SortKey>,
    },
    Limit {
        child: Box<PlanNode>,
        offset: usize,
        limit: Option<usize>,
    },
    Distinct {
        child: Box<PlanNode>,
    },
    /// The previous pass's rows inside a recursive CTE member
    WorkingSet,
    NestedLoopJoin {
        config: JoinConfig,
        left: Box<PlanNode>,
        right: Box<PlanNode>,
        /// The right side references the current left row and must see it
        /// as a bound prefix
        correlated: bool,
    },
    HashJoin {
        config: JoinConfig,
        left: Box<PlanNode>,
        right: Box<PlanNode>,
        left_key: Vec<Arc<dyn Expression>>,
        right_key: Vec<Arc<dyn Expression>>,
    },
    MergeJoin {
        config: JoinConfig,
        left: Box<PlanNode>,
        right: Box<PlanNode>,
        left_key: Vec<Arc<dyn Expression>>,
        right_key: Vec<Arc<dyn Expression>>,
    },
    SemiJoin {
        config: JoinConfig,
        left: Box<PlanNode>,
        right: Box<PlanNode>,
        correlated: bool,
    },
    FullOuterJoin {
        config: JoinConfig,
        left: Box<PlanNode>,
        right: Box<PlanNode>,
    },
    LateralJoin {
        config: JoinConfig,
        left: Box<PlanNode>,
        right: Box<PlanNode>,
        /// Outer apply: null-extend left rows whose fragment is empty
        outer: bool,
    },
    RangeHeapJoin {
        config: JoinConfig,
        left: Box<PlanNode>,
        right: Box<PlanNode>,
        probe: Arc<dyn Expression>,
        min: Arc<dyn Expression>,
        max: Arc<dyn Expression>,
    },
    HashAggregate {
        child: Box<PlanNode>,
        group_exprs: Vec<Arc<dyn Expression>>,
        aggregates: Vec<AggregateSpec>,
        having: Option<Arc<dyn Expression>>,
    },
    Window {
        child: Box<PlanNode>,
        partition_exprs: Vec<Arc<dyn Expression>>,
        order: Vec<SortKey>,
        funcs: Vec<WindowFunc>,
    },
    Insert {
        table: String,
        child: Box<PlanNode>,
        columns: Vec<usize>,
        mode: InsertMode,
    },
    Update {
        table: String,
        child: Box<PlanNode>,
        target_offset: usize,
        assignments: Vec<Assignment>,
        ignore: bool,
    },
    Delete {
        table: String,
        child: Box<PlanNode>,
        target_offset: usize,
    },
    RecursiveCte {
        seed: Box<PlanNode>,
        recursive: Box<PlanNode>,
        /// UNION deduplicates; UNION ALL does not
        dedup: bool,
    },
    /// Trigger-body subtree guarded by a savepoint rolled back when the
    /// subtree fails
    TriggerWrap {
        child: Box<PlanNode>,
        savepoint: String,
    },
}

/// A whole statement: the plan root plus the wrapping the builder applies
/// around it (accumulator or RETURNING projection, safepoints, commit
/// coordination).
#[derive(Clone)]
pub struct StatementPlan {
    pub root: PlanNode,
    /// Present for DML statements; selects the accumulator's counting rules
    pub dml: Option<DmlKind>,
    /// RETURNING expressions; bypasses the accumulator
    pub returning: Option<Vec<Arc<dyn Expression>>>,
    /// Wrap the pipeline in the periodic safepoint decorator
    pub safepoints: bool,
    /// DDL-style statement that commits regardless of session flags
    pub implicit_commit: bool,
}

impl StatementPlan {
    pub fn query(root: PlanNode) -> Self {
        StatementPlan {
            root,
            dml: None,
            returning: None,
            safepoints: false,
            implicit_commit: false,
        }
    }

    pub fn dml(root: PlanNode, kind: DmlKind) -> Self {
        StatementPlan {
            root,
            dml: Some(kind),
            returning: None,
            safepoints: true,
            implicit_commit: false,
        }
    }

    pub fn with_returning(mut self, exprs: Vec<Arc<dyn Expression>>) -> Self {
        self.returning = Some(exprs);
        self
    }

    pub fn with_implicit_commit(mut self) -> Self {
        self.implicit_commit = true;
        self
    }
}
