use anyhow::Result;

use sirindb::exec::build::build;
use sirindb::exec::materialize;
use sirindb::exec::operators::join::{JoinConfig, JoinKind};
use sirindb::expr::ColumnRef;
use sirindb::row::{Column, DataType, DataValue, Row, Schema};
use sirindb::{ExecContext, PlanNode};

fn int_schema(names: &[&str]) -> Schema {
    Schema::new(
        names
            .iter()
            .map(|n| Column::new(*n, DataType::Integer, true))
            .collect(),
    )
}

fn int_row(values: &[Option<i64>]) -> Row {
    Row::from_values(
        values
            .iter()
            .map(|v| v.map(DataValue::Integer).unwrap_or(DataValue::Null))
            .collect(),
    )
}

fn merge_plan(kind: JoinKind, left: Vec<Row>, right: Vec<Row>) -> PlanNode {
    let config = JoinConfig::new(kind, int_schema(&["lk", "lv"]), int_schema(&["rk", "rv"]));
    PlanNode::MergeJoin {
        config,
        left: Box::new(PlanNode::Values { rows: left }),
        right: Box::new(PlanNode::Values { rows: right }),
        left_key: vec![ColumnRef::new(0)],
        right_key: vec![ColumnRef::new(0)],
    }
}

fn run(plan: &PlanNode, ctx: &mut ExecContext) -> Result<Vec<Row>> {
    let mut iter = build(plan, ctx)?;
    let rows = materialize(iter.as_mut(), ctx)?;
    iter.close(ctx)?;
    Ok(rows)
}

#[test]
fn duplicate_keys_produce_the_full_cross_product_once() -> Result<()> {
    // Two left rows and two right rows share key 2: exactly four output
    // pairs, each combination once.
    let left = vec![
        int_row(&[Some(1), Some(10)]),
        int_row(&[Some(2), Some(20)]),
        int_row(&[Some(2), Some(21)]),
        int_row(&[Some(3), Some(30)]),
    ];
    let right = vec![
        int_row(&[Some(2), Some(200)]),
        int_row(&[Some(2), Some(201)]),
        int_row(&[Some(4), Some(400)]),
    ];
    let mut ctx = ExecContext::for_tests();
    let rows = run(&merge_plan(JoinKind::Inner, left, right), &mut ctx)?;

    let mut pairs: Vec<(i64, i64)> = rows
        .iter()
        .map(|r| {
            (
                r[1].as_integer().unwrap(),
                r[3].as_integer().unwrap(),
            )
        })
        .collect();
    pairs.sort();
    assert_eq!(pairs, vec![(20, 200), (20, 201), (21, 200), (21, 201)]);
    Ok(())
}

#[test]
fn output_preserves_left_sort_order() -> Result<()> {
    let left = vec![
        int_row(&[Some(1), Some(10)]),
        int_row(&[Some(2), Some(20)]),
        int_row(&[Some(3), Some(30)]),
    ];
    let right = vec![
        int_row(&[Some(1), Some(100)]),
        int_row(&[Some(2), Some(200)]),
        int_row(&[Some(3), Some(300)]),
    ];
    let mut ctx = ExecContext::for_tests();
    let rows = run(&merge_plan(JoinKind::Inner, left, right), &mut ctx)?;
    let keys: Vec<i64> = rows.iter().map(|r| r[0].as_integer().unwrap()).collect();
    assert_eq!(keys, vec![1, 2, 3]);
    Ok(())
}

#[test]
fn left_outer_null_extends_each_unmatched_row_once() -> Result<()> {
    let left = vec![
        int_row(&[Some(1), Some(10)]),
        int_row(&[Some(2), Some(20)]),
        int_row(&[Some(3), Some(30)]),
    ];
    let right = vec![int_row(&[Some(2), Some(200)])];
    let mut ctx = ExecContext::for_tests();
    let rows = run(&merge_plan(JoinKind::LeftOuter, left, right), &mut ctx)?;
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0][2], DataValue::Null);
    assert_eq!(rows[1][3], DataValue::Integer(200));
    assert_eq!(rows[2][2], DataValue::Null);
    Ok(())
}

#[test]
fn null_in_any_key_column_fails_the_multi_column_match() -> Result<()> {
    // Sorted by (k1, k2) with nulls first inside each key group. A null in
    // the second key column blocks the match even against another null.
    let left = vec![
        int_row(&[Some(1), None, Some(10)]),
        int_row(&[Some(1), Some(2), Some(11)]),
    ];
    let right = vec![
        int_row(&[Some(1), None, Some(100)]),
        int_row(&[Some(1), Some(2), Some(101)]),
    ];
    let config = JoinConfig::new(
        JoinKind::Inner,
        int_schema(&["lk1", "lk2", "lv"]),
        int_schema(&["rk1", "rk2", "rv"]),
    );
    let plan = PlanNode::MergeJoin {
        config,
        left: Box::new(PlanNode::Values { rows: left }),
        right: Box::new(PlanNode::Values { rows: right }),
        left_key: vec![ColumnRef::new(0), ColumnRef::new(1)],
        right_key: vec![ColumnRef::new(0), ColumnRef::new(1)],
    };
    let mut ctx = ExecContext::for_tests();
    let rows = run(&plan, &mut ctx)?;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0][2], DataValue::Integer(11));
    assert_eq!(rows[0][5], DataValue::Integer(101));
    Ok(())
}

#[test]
fn null_keys_never_match() -> Result<()> {
    let left = vec![int_row(&[None, Some(10)]), int_row(&[Some(1), Some(11)])];
    let right = vec![int_row(&[None, Some(100)]), int_row(&[Some(1), Some(101)])];

    let mut ctx = ExecContext::for_tests();
    let inner = run(
        &merge_plan(JoinKind::Inner, left.clone(), right.clone()),
        &mut ctx,
    )?;
    assert_eq!(inner.len(), 1);
    assert_eq!(inner[0][1], DataValue::Integer(11));

    // Under left outer the null-keyed left row still appears, null-extended.
    let outer = run(&merge_plan(JoinKind::LeftOuter, left, right), &mut ctx)?;
    assert_eq!(outer.len(), 2);
    assert_eq!(outer[0][0], DataValue::Null);
    assert_eq!(outer[0][2], DataValue::Null);
    Ok(())
}
