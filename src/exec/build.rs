// Plan-to-Iterator Builder
//
// Compiles a resolved plan tree into the pull pipeline that executes it.
// The match over `PlanNode` is exhaustive; a new node kind does not build
// until it gets a case here. Correlated fragments and recursive members
// are not built eagerly: the builder hands the operator a factory closure
// capturing a clone of the subtree, and the operator rebuilds it per
// binding.

use crate::error::{QueryError, QueryResult};
use crate::exec::operators::agg::{HashAggregateIter, WindowIter};
use crate::exec::operators::distinct::DistinctIter;
use crate::exec::operators::dml::{AccumulatorIter, DeleteIter, InsertIter, UpdateIter};
use crate::exec::operators::join::{
    BindIter, FullOuterJoinIter, HashJoinIter, LateralJoinIter, MergeJoinIter, NestedLoopJoinIter,
    RangeHeapJoinIter, RightFactory, SemiJoinIter,
};
use crate::exec::operators::proc::{RecursiveCteIter, RecursiveFactory};
use crate::exec::operators::scan::IndexRangeIter;
use crate::exec::operators::txn_wrap::{CommitOnCloseIter, TriggerSavepointIter};
use crate::exec::operators::{
    FilterIter, LimitIter, ProjectIter, SortIter, TableScanIter, ValuesIter,
};
use crate::exec::safepoint::SafepointIter;
use crate::exec::{BoxedIterator, ExecContext};
use crate::plan::{PlanNode, StatementPlan};
use crate::row::Row;

/// Build the iterator pipeline for a plan subtree.
pub fn build(plan: &PlanNode, ctx: &mut ExecContext) -> QueryResult<BoxedIterator> {
    build_with(plan, ctx, &[])
}

/// Build a whole statement: the root pipeline plus the accumulator or
/// RETURNING projection, safepoint decorator, and commit coordination.
pub fn build_statement(plan: &StatementPlan, ctx: &mut ExecContext) -> QueryResult<BoxedIterator> {
    let mut iter = build(&plan.root, ctx)?;
    if let Some(kind) = plan.dml {
        iter = match &plan.returning {
            Some(exprs) => Box::new(ProjectIter::new(iter, exprs.clone())),
            None => Box::new(AccumulatorIter::new(iter, kind)),
        };
    }
    if plan.safepoints {
        iter = Box::new(SafepointIter::new(iter));
    }
    let mut commit = CommitOnCloseIter::new(iter);
    if plan.implicit_commit {
        commit = commit.with_implicit_commit();
    }
    Ok(Box::new(commit))
}

/// `working` carries the previous pass's rows while building a recursive
/// CTE member; `WorkingSet` leaves resolve to it.
fn build_with(plan: &PlanNode, ctx: &mut ExecContext, working: &[Row]) -> QueryResult<BoxedIterator> {
    match plan {
        PlanNode::Values { rows } => Ok(Box::new(ValuesIter::new(rows.clone()))),
        PlanNode::TableScan { table } => {
            let table = ctx.registry().table(table)?;
            Ok(Box::new(TableScanIter::new(table)))
        }
        PlanNode::IndexRange {
            table,
            column,
            low,
            high,
        } => {
            let table = ctx.registry().table(table)?;
            Ok(Box::new(IndexRangeIter::new(
                table,
                *column,
                low.clone(),
                high.clone(),
            )))
        }
        PlanNode::Filter { child, predicate } => {
            let child = build_with(child, ctx, working)?;
            Ok(Box::new(FilterIter::new(child, predicate.clone())))
        }
        PlanNode::Project { child, exprs } => {
            let child = build_with(child, ctx, working)?;
            Ok(Box::new(ProjectIter::new(child, exprs.clone())))
        }
        PlanNode::Sort { child, keys } => {
            let child = build_with(child, ctx, working)?;
            Ok(Box::new(SortIter::new(child, keys.clone())))
        }
        PlanNode::Limit {
            child,
            offset,
            limit,
        } => {
            let child = build_with(child, ctx, working)?;
            Ok(Box::new(LimitIter::new(child, *offset, *limit)))
        }
        PlanNode::Distinct { child } => {
            let child = build_with(child, ctx, working)?;
            Ok(Box::new(DistinctIter::new(child)))
        }
        PlanNode::WorkingSet => Ok(Box::new(ValuesIter::new(working.to_vec()))),
        PlanNode::NestedLoopJoin {
            config,
            left,
            right,
            correlated,
        } => {
            let left = build_with(left, ctx, working)?;
            let factory = right_factory((**right).clone(), working.to_vec());
            Ok(Box::new(NestedLoopJoinIter::new(
                config.clone(),
                left,
                factory,
                *correlated,
            )))
        }
        PlanNode::HashJoin {
            config,
            left,
            right,
            left_key,
            right_key,
        } => {
            let left = build_with(left, ctx, working)?;
            let right = build_with(right, ctx, working)?;
            Ok(Box::new(HashJoinIter::new(
                config.clone(),
                left,
                right,
                left_key.clone(),
                right_key.clone(),
            )))
        }
        PlanNode::MergeJoin {
            config,
            left,
            right,
            left_key,
            right_key,
        } => {
            let left = build_with(left, ctx, working)?;
            let right = build_with(right, ctx, working)?;
            Ok(Box::new(MergeJoinIter::new(
                config.clone(),
                left,
                right,
                left_key.clone(),
                right_key.clone(),
            )))
        }
        PlanNode::SemiJoin {
            config,
            left,
            right,
            correlated,
        } => {
            let left = build_with(left, ctx, working)?;
            let factory = right_factory((**right).clone(), working.to_vec());
            Ok(Box::new(SemiJoinIter::new(
                config.clone(),
                left,
                factory,
                *correlated,
            )))
        }
        PlanNode::FullOuterJoin {
            config,
            left,
            right,
        } => {
            let left = build_with(left, ctx, working)?;
            let right = build_with(right, ctx, working)?;
            Ok(Box::new(FullOuterJoinIter::new(config.clone(), left, right)))
        }
        PlanNode::LateralJoin {
            config,
            left,
            right,
            outer,
        } => {
            let left = build_with(left, ctx, working)?;
            let factory = right_factory((**right).clone(), working.to_vec());
            Ok(Box::new(LateralJoinIter::new(
                config.clone(),
                left,
                factory,
                *outer,
            )))
        }
        PlanNode::RangeHeapJoin {
            config,
            left,
            right,
            probe,
            min,
            max,
        } => {
            let left = build_with(left, ctx, working)?;
            let right = build_with(right, ctx, working)?;
            Ok(Box::new(RangeHeapJoinIter::new(
                config.clone(),
                left,
                right,
                probe.clone(),
                min.clone(),
                max.clone(),
            )))
        }
        PlanNode::HashAggregate {
            child,
            group_exprs,
            aggregates,
            having,
        } => {
            let child = build_with(child, ctx, working)?;
            Ok(Box::new(HashAggregateIter::new(
                child,
                group_exprs.clone(),
                aggregates.clone(),
                having.clone(),
            )))
        }
        PlanNode::Window {
            child,
            partition_exprs,
            order,
            funcs,
        } => {
            let child = build_with(child, ctx, working)?;
            Ok(Box::new(WindowIter::new(
                child,
                partition_exprs.clone(),
                order.clone(),
                funcs.clone(),
            )))
        }
        PlanNode::Insert {
            table,
            child,
            columns,
            mode,
        } => {
            let table = ctx.registry().table(table)?;
            let child = build_with(child, ctx, working)?;
            Ok(Box::new(InsertIter::new(
                table,
                child,
                columns.clone(),
                mode.clone(),
            )))
        }
        PlanNode::Update {
            table,
            child,
            target_offset,
            assignments,
            ignore,
        } => {
            let table = ctx.registry().table(table)?;
            let child = build_with(child, ctx, working)?;
            Ok(Box::new(UpdateIter::new(
                table,
                child,
                *target_offset,
                assignments.clone(),
                *ignore,
            )))
        }
        PlanNode::Delete {
            table,
            child,
            target_offset,
        } => {
            let table = ctx.registry().table(table)?;
            let child = build_with(child, ctx, working)?;
            Ok(Box::new(DeleteIter::new(table, child, *target_offset)))
        }
        PlanNode::RecursiveCte {
            seed,
            recursive,
            dedup,
        } => {
            let seed = build_with(seed, ctx, working)?;
            let member = (**recursive).clone();
            let factory: RecursiveFactory =
                Box::new(move |ctx, previous| build_with(&member, ctx, previous));
            Ok(Box::new(RecursiveCteIter::new(seed, factory, *dedup)))
        }
        PlanNode::TriggerWrap { child, savepoint } => {
            let child = build_with(child, ctx, working)?;
            Ok(Box::new(TriggerSavepointIter::new(child, savepoint.clone())))
        }
    }
}

/// Factory rebuilding a right-side subtree per invocation. When the join
/// seeds it with the current left row, that row becomes a bound prefix
/// the fragment's column references resolve against.
fn right_factory(plan: PlanNode, working: Vec<Row>) -> RightFactory {
    Box::new(move |ctx, bound| {
        let child = build_with(&plan, ctx, &working)?;
        Ok(match bound {
            Some(row) => Box::new(BindIter::new(row.clone(), child)) as BoxedIterator,
            None => child,
        })
    })
}

/// Convenience for running a statement to completion, closing it even
/// when a row pull fails.
pub fn run_statement(plan: &StatementPlan, ctx: &mut ExecContext) -> QueryResult<Vec<Row>> {
    let mut iter = build_statement(plan, ctx)?;
    let mut rows = Vec::new();
    let result: QueryResult<()> = loop {
        match iter.next(ctx) {
            Ok(Some(row)) => rows.push(row),
            Ok(None) => break Ok(()),
            Err(err) => break Err(err),
        }
    };
    match result {
        Ok(()) => {
            iter.close(ctx)?;
            Ok(rows)
        }
        Err(err) => {
            if let Err(close_err) = iter.close(ctx) {
                if !matches!(close_err, QueryError::Cancelled) {
                    log::error!("close after failed pull: {}", close_err);
                }
            }
            Err(err)
        }
    }
}
