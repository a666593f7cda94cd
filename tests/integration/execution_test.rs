use std::sync::Arc;

use anyhow::Result;

use sirindb::error::QueryError;
use sirindb::exec::build::build;
use sirindb::exec::materialize;
use sirindb::exec::operators::agg::{AggregateSpec, AggregateType, WindowFunc};
use sirindb::exec::operators::sort::SortKey;
use sirindb::exec::safepoint::SafepointIter;
use sirindb::exec::RowIterator;
use sirindb::expr::{ColumnRef, Compare, CompareOp, Literal};
use sirindb::row::{Column, DataType, DataValue, Row, Schema};
use sirindb::storage::MemTable;
use sirindb::{ExecContext, PlanNode};

fn int_row(values: &[i64]) -> Row {
    Row::from_values(values.iter().map(|v| DataValue::Integer(*v)).collect())
}

fn run(plan: &PlanNode, ctx: &mut ExecContext) -> Result<Vec<Row>> {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut iter = build(plan, ctx)?;
    let rows = materialize(iter.as_mut(), ctx)?;
    iter.close(ctx)?;
    Ok(rows)
}

fn scores_table() -> Arc<MemTable> {
    let schema = Schema::new(vec![
        Column::new("id", DataType::Integer, false),
        Column::new("team", DataType::Integer, false),
        Column::new("score", DataType::Integer, false),
    ])
    .with_key(vec![0]);
    Arc::new(MemTable::with_rows(
        "scores",
        schema,
        vec![
            int_row(&[1, 1, 30]),
            int_row(&[2, 1, 10]),
            int_row(&[3, 2, 20]),
            int_row(&[4, 2, 20]),
            int_row(&[5, 2, 40]),
        ],
    ))
}

#[test]
fn filter_sort_limit_pipeline() -> Result<()> {
    let mut ctx = ExecContext::for_tests();
    ctx.registry().register(scores_table());

    let plan = PlanNode::Limit {
        child: Box::new(PlanNode::Sort {
            child: Box::new(PlanNode::Filter {
                child: Box::new(PlanNode::TableScan {
                    table: "scores".to_string(),
                }),
                predicate: Compare::new(
                    CompareOp::GtEq,
                    ColumnRef::new(2),
                    Literal::new(DataValue::Integer(20)),
                ),
            }),
            keys: vec![SortKey {
                expr: ColumnRef::new(2),
                descending: true,
            }],
        }),
        offset: 1,
        limit: Some(2),
    };
    let rows = run(&plan, &mut ctx)?;
    let scores: Vec<i64> = rows.iter().map(|r| r[2].as_integer().unwrap()).collect();
    assert_eq!(scores, vec![30, 20]);
    Ok(())
}

#[test]
fn distinct_removes_duplicate_rows() -> Result<()> {
    let mut ctx = ExecContext::for_tests();
    let plan = PlanNode::Distinct {
        child: Box::new(PlanNode::Values {
            rows: vec![int_row(&[1]), int_row(&[2]), int_row(&[1]), int_row(&[2])],
        }),
    };
    let rows = run(&plan, &mut ctx)?;
    assert_eq!(rows.len(), 2);
    Ok(())
}

#[test]
fn group_by_with_having_filters_groups() -> Result<()> {
    let mut ctx = ExecContext::for_tests();
    ctx.registry().register(scores_table());

    // Output row is group key then aggregates; HAVING sees that shape.
    let plan = PlanNode::HashAggregate {
        child: Box::new(PlanNode::TableScan {
            table: "scores".to_string(),
        }),
        group_exprs: vec![ColumnRef::new(1)],
        aggregates: vec![
            AggregateSpec::count_star(),
            AggregateSpec::new(AggregateType::Sum, ColumnRef::new(2)),
        ],
        having: Some(Compare::new(
            CompareOp::Gt,
            ColumnRef::new(2),
            Literal::new(DataValue::Integer(50)),
        )),
    };
    let rows = run(&plan, &mut ctx)?;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0][0], DataValue::Integer(2));
    assert_eq!(rows[0][1], DataValue::Integer(3));
    assert_eq!(rows[0][2], DataValue::Integer(80));
    Ok(())
}

#[test]
fn ungrouped_aggregate_over_empty_input_yields_identities() -> Result<()> {
    let mut ctx = ExecContext::for_tests();
    let plan = PlanNode::HashAggregate {
        child: Box::new(PlanNode::Values { rows: Vec::new() }),
        group_exprs: Vec::new(),
        aggregates: vec![
            AggregateSpec::count_star(),
            AggregateSpec::new(AggregateType::Sum, ColumnRef::new(0)),
        ],
        having: None,
    };
    let rows = run(&plan, &mut ctx)?;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0][0], DataValue::Integer(0));
    assert_eq!(rows[0][1], DataValue::Null);
    Ok(())
}

#[test]
fn window_row_number_and_rank_over_partitions() -> Result<()> {
    let mut ctx = ExecContext::for_tests();
    ctx.registry().register(scores_table());

    let plan = PlanNode::Window {
        child: Box::new(PlanNode::TableScan {
            table: "scores".to_string(),
        }),
        partition_exprs: vec![ColumnRef::new(1)],
        order: vec![SortKey {
            expr: ColumnRef::new(2),
            descending: false,
        }],
        funcs: vec![WindowFunc::RowNumber, WindowFunc::Rank],
    };
    let rows = run(&plan, &mut ctx)?;
    assert_eq!(rows.len(), 5);

    // Team 2 ascending by score: 20, 20, 40. Tied rows share a rank and
    // the next rank jumps past the tie.
    let team2: Vec<(i64, i64, i64)> = rows
        .iter()
        .filter(|r| r[1] == DataValue::Integer(2))
        .map(|r| {
            (
                r[2].as_integer().unwrap(),
                r[3].as_integer().unwrap(),
                r[4].as_integer().unwrap(),
            )
        })
        .collect();
    assert_eq!(team2, vec![(20, 1, 1), (20, 2, 1), (40, 3, 3)]);
    Ok(())
}

#[test]
fn window_partition_aggregate_repeats_per_row() -> Result<()> {
    let mut ctx = ExecContext::for_tests();
    ctx.registry().register(scores_table());

    let plan = PlanNode::Window {
        child: Box::new(PlanNode::TableScan {
            table: "scores".to_string(),
        }),
        partition_exprs: vec![ColumnRef::new(1)],
        order: Vec::new(),
        funcs: vec![WindowFunc::Aggregate(AggregateSpec::new(
            AggregateType::Sum,
            ColumnRef::new(2),
        ))],
    };
    let rows = run(&plan, &mut ctx)?;
    for row in &rows {
        let expected = match row[1].as_integer().unwrap() {
            1 => 40,
            _ => 80,
        };
        assert_eq!(row[3], DataValue::Integer(expected));
    }
    Ok(())
}

#[test]
fn index_range_scan_respects_bounds() -> Result<()> {
    let mut ctx = ExecContext::for_tests();
    ctx.registry().register(scores_table());

    let plan = PlanNode::IndexRange {
        table: "scores".to_string(),
        column: 2,
        low: Some(DataValue::Integer(20)),
        high: Some(DataValue::Integer(30)),
    };
    let rows = run(&plan, &mut ctx)?;
    let scores: Vec<i64> = rows.iter().map(|r| r[2].as_integer().unwrap()).collect();
    assert_eq!(scores, vec![20, 20, 30]);
    Ok(())
}

#[test]
fn cancellation_stops_iteration() {
    let mut ctx = ExecContext::for_tests();
    ctx.registry().register(scores_table());

    let plan = PlanNode::TableScan {
        table: "scores".to_string(),
    };
    let mut iter = build(&plan, &mut ctx).unwrap();
    ctx.cancel();
    let err = iter.next(&mut ctx).unwrap_err();
    assert!(matches!(err, QueryError::Cancelled));
}

#[test]
fn safepoint_decorator_reports_progress_periodically() -> Result<()> {
    let mut ctx = ExecContext::for_tests();
    let rows: Vec<Row> = (0..10).map(|i| int_row(&[i])).collect();
    let mut iter = SafepointIter::with_interval(
        Box::new(sirindb::exec::operators::ValuesIter::new(rows)),
        3,
    );
    let out = materialize(&mut iter, &mut ctx)?;
    iter.close(&mut ctx)?;
    assert_eq!(out.len(), 10);
    assert_eq!(ctx.safepoints_reached(), 3);
    Ok(())
}

#[test]
fn unknown_table_fails_at_build_time() {
    let mut ctx = ExecContext::for_tests();
    let plan = PlanNode::TableScan {
        table: "missing".to_string(),
    };
    let err = build(&plan, &mut ctx).unwrap_err();
    assert!(matches!(err, QueryError::TableNotFound(_)));
}
