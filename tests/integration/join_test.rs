use std::sync::Arc;

use anyhow::Result;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use sirindb::exec::build::build;
use sirindb::exec::materialize;
use sirindb::exec::operators::join::{JoinConfig, JoinKind};
use sirindb::expr::{ColumnRef, Compare};
use sirindb::row::{Column, DataType, DataValue, Row, Schema};
use sirindb::storage::MemTable;
use sirindb::{ExecContext, PlanNode};

fn int_schema(names: &[&str]) -> Schema {
    Schema::new(
        names
            .iter()
            .map(|n| Column::new(*n, DataType::Integer, true))
            .collect(),
    )
}

fn int_row(values: &[i64]) -> Row {
    Row::from_values(values.iter().map(|v| DataValue::Integer(*v)).collect())
}

fn run(plan: &PlanNode, ctx: &mut ExecContext) -> Result<Vec<Row>> {
    let mut iter = build(plan, ctx)?;
    let rows = materialize(iter.as_mut(), ctx)?;
    iter.close(ctx)?;
    Ok(rows)
}

fn values(rows: Vec<Row>) -> Box<PlanNode> {
    Box::new(PlanNode::Values { rows })
}

/// Output rows as integer tuples (nulls as i64::MIN), sorted, so join
/// strategies with different output orders can be compared.
fn sorted_tuples(rows: &[Row]) -> Vec<Vec<i64>> {
    let mut tuples: Vec<Vec<i64>> = rows
        .iter()
        .map(|r| {
            r.values()
                .iter()
                .map(|v| v.as_integer().unwrap_or(i64::MIN))
                .collect()
        })
        .collect();
    tuples.sort();
    tuples
}

#[test]
fn hash_join_agrees_with_nested_loop_oracle() -> Result<()> {
    let mut rng = StdRng::seed_from_u64(42);
    let left: Vec<Row> = (0..200)
        .map(|i| int_row(&[rng.gen_range(0..20), i]))
        .collect();
    let right: Vec<Row> = (0..200)
        .map(|i| int_row(&[rng.gen_range(0..20), 1000 + i]))
        .collect();

    let config = JoinConfig::new(
        JoinKind::Inner,
        int_schema(&["lk", "lv"]),
        int_schema(&["rk", "rv"]),
    )
    .with_condition(Compare::columns_eq(0, 2));

    let mut ctx = ExecContext::for_tests();
    let nested = PlanNode::NestedLoopJoin {
        config: config.clone(),
        left: values(left.clone()),
        right: values(right.clone()),
        correlated: false,
    };
    let hash = PlanNode::HashJoin {
        config,
        left: values(left),
        right: values(right),
        left_key: vec![ColumnRef::new(0)],
        right_key: vec![ColumnRef::new(0)],
    };

    let expected = sorted_tuples(&run(&nested, &mut ctx)?);
    let got = sorted_tuples(&run(&hash, &mut ctx)?);
    assert!(!expected.is_empty());
    assert_eq!(got, expected);
    Ok(())
}

#[test]
fn left_outer_join_with_empty_right_emits_every_left_row() -> Result<()> {
    let config = JoinConfig::new(
        JoinKind::LeftOuter,
        int_schema(&["lk", "lv"]),
        int_schema(&["rk", "rv"]),
    )
    .with_condition(Compare::columns_eq(0, 2));
    let plan = PlanNode::HashJoin {
        config,
        left: values(vec![int_row(&[1, 10]), int_row(&[2, 20])]),
        right: values(Vec::new()),
        left_key: vec![ColumnRef::new(0)],
        right_key: vec![ColumnRef::new(0)],
    };
    let mut ctx = ExecContext::for_tests();
    let rows = run(&plan, &mut ctx)?;
    assert_eq!(rows.len(), 2);
    for row in &rows {
        assert_eq!(row.len(), 4);
        assert_eq!(row[2], DataValue::Null);
        assert_eq!(row[3], DataValue::Null);
    }
    Ok(())
}

#[test]
fn full_outer_join_covers_both_sides() -> Result<()> {
    let config = JoinConfig::new(
        JoinKind::FullOuter,
        int_schema(&["lk", "lv"]),
        int_schema(&["rk", "rv"]),
    )
    .with_condition(Compare::columns_eq(0, 2));
    let plan = PlanNode::FullOuterJoin {
        config,
        left: values(vec![int_row(&[1, 10]), int_row(&[2, 20])]),
        right: values(vec![int_row(&[2, 200]), int_row(&[3, 300])]),
    };
    let mut ctx = ExecContext::for_tests();
    let rows = run(&plan, &mut ctx)?;
    assert_eq!(
        sorted_tuples(&rows),
        vec![
            vec![i64::MIN, i64::MIN, 3, 300],
            vec![1, 10, i64::MIN, i64::MIN],
            vec![2, 20, 2, 200],
        ]
    );
    Ok(())
}

#[test]
fn semi_and_anti_joins_partition_the_left_side() -> Result<()> {
    let left = vec![int_row(&[1, 10]), int_row(&[2, 20]), int_row(&[3, 30])];
    let right = vec![int_row(&[2, 200]), int_row(&[2, 201])];

    let make = |kind| {
        let config = JoinConfig::new(kind, int_schema(&["lk", "lv"]), int_schema(&["rk", "rv"]))
            .with_condition(Compare::columns_eq(0, 2));
        PlanNode::SemiJoin {
            config,
            left: values(left.clone()),
            right: values(right.clone()),
            correlated: false,
        }
    };

    let mut ctx = ExecContext::for_tests();
    let semi = run(&make(JoinKind::Semi), &mut ctx)?;
    let anti = run(&make(JoinKind::Anti), &mut ctx)?;

    // Duplicate right matches must not duplicate a semi row.
    assert_eq!(sorted_tuples(&semi), vec![vec![2, 20]]);
    assert_eq!(sorted_tuples(&anti), vec![vec![1, 10], vec![3, 30]]);
    Ok(())
}

#[test]
fn cross_join_produces_every_pair() -> Result<()> {
    let config = JoinConfig::new(JoinKind::Cross, int_schema(&["l"]), int_schema(&["r"]));
    let plan = PlanNode::NestedLoopJoin {
        config,
        left: values(vec![int_row(&[1]), int_row(&[2]), int_row(&[3])]),
        right: values(vec![int_row(&[10]), int_row(&[20])]),
        correlated: false,
    };
    let mut ctx = ExecContext::for_tests();
    let rows = run(&plan, &mut ctx)?;
    assert_eq!(rows.len(), 6);
    Ok(())
}

#[test]
fn interval_join_matches_probes_to_containing_ranges() -> Result<()> {
    // Probes 5, 15, 25 against closed intervals sorted by lower bound.
    let config = JoinConfig::new(
        JoinKind::Interval,
        int_schema(&["probe"]),
        int_schema(&["lo", "hi"]),
    );
    let plan = PlanNode::RangeHeapJoin {
        config,
        left: values(vec![int_row(&[5]), int_row(&[15]), int_row(&[25])]),
        right: values(vec![
            int_row(&[0, 10]),
            int_row(&[10, 20]),
            int_row(&[20, 30]),
        ]),
        probe: ColumnRef::new(0),
        min: ColumnRef::new(0),
        max: ColumnRef::new(1),
    };
    let mut ctx = ExecContext::for_tests();
    let rows = run(&plan, &mut ctx)?;
    assert_eq!(
        sorted_tuples(&rows),
        vec![vec![5, 0, 10], vec![15, 10, 20], vec![25, 20, 30]]
    );
    Ok(())
}

#[test]
fn interval_join_shared_endpoint_matches_both_ranges() -> Result<()> {
    let config = JoinConfig::new(
        JoinKind::Interval,
        int_schema(&["probe"]),
        int_schema(&["lo", "hi"]),
    );
    let plan = PlanNode::RangeHeapJoin {
        config,
        left: values(vec![int_row(&[10])]),
        right: values(vec![int_row(&[0, 10]), int_row(&[10, 20])]),
        probe: ColumnRef::new(0),
        min: ColumnRef::new(0),
        max: ColumnRef::new(1),
    };
    let mut ctx = ExecContext::for_tests();
    let rows = run(&plan, &mut ctx)?;
    assert_eq!(rows.len(), 2);
    Ok(())
}

#[test]
fn lateral_join_rebuilds_fragment_per_scan_row() -> Result<()> {
    let users = Schema::new(vec![
        Column::new("id", DataType::Integer, false),
        Column::new("name", DataType::Varchar(32), true),
    ]);
    let mut ctx = ExecContext::for_tests();
    ctx.registry().register(Arc::new(MemTable::with_rows(
        "users",
        users.clone(),
        vec![
            Row::from_values(vec![DataValue::Integer(1), DataValue::Text("ada".into())]),
            Row::from_values(vec![DataValue::Integer(2), DataValue::Text("bob".into())]),
        ],
    )));

    // The fragment sees the bound user row as columns 0..2 and filters
    // orders against it; user 2 has no orders and is null-extended.
    let orders = vec![int_row(&[1, 100]), int_row(&[1, 101])];
    let fragment = PlanNode::Filter {
        child: values(orders),
        predicate: Compare::columns_eq(0, 2),
    };
    let config = JoinConfig::new(
        JoinKind::Lateral,
        users.clone(),
        users.join(&int_schema(&["uid", "oid"])),
    );
    let plan = PlanNode::LateralJoin {
        config,
        left: Box::new(PlanNode::TableScan {
            table: "users".to_string(),
        }),
        right: Box::new(fragment),
        outer: true,
    };
    let rows = run(&plan, &mut ctx)?;
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0][5], DataValue::Integer(100));
    assert_eq!(rows[1][5], DataValue::Integer(101));
    assert_eq!(rows[2][0], DataValue::Integer(2));
    assert_eq!(rows[2][5], DataValue::Null);
    Ok(())
}
