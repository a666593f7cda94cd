use std::sync::Arc;

use anyhow::Result;

use sirindb::exec::build::run_statement;
use sirindb::exec::operators::dml::{DmlKind, InsertMode};
use sirindb::expr::{ColumnRef, Compare, CompareOp, Literal};
use sirindb::row::{Column, DataType, DataValue, Row, Schema};
use sirindb::storage::MemTable;
use sirindb::{ExecContext, PlanNode, StatementPlan, Table};

fn scores_schema() -> Schema {
    Schema::new(vec![
        Column::new("id", DataType::Integer, false),
        Column::new("score", DataType::Integer, false),
    ])
    .with_key(vec![0])
}

fn score_row(id: i64, score: i64) -> Row {
    Row::from_values(vec![DataValue::Integer(id), DataValue::Integer(score)])
}

fn insert_plan(table: &str, rows: Vec<Row>, mode: InsertMode) -> PlanNode {
    PlanNode::Insert {
        table: table.to_string(),
        child: Box::new(PlanNode::Values { rows }),
        columns: vec![0, 1],
        mode,
    }
}

#[test]
fn insert_summary_reports_count_and_first_generated_id() -> Result<()> {
    let schema = Schema::new(vec![
        Column::new("id", DataType::Integer, false).with_auto_increment(),
        Column::new("name", DataType::Text, true),
    ])
    .with_key(vec![0]);
    let table = Arc::new(MemTable::new("people", schema));
    let mut ctx = ExecContext::for_tests();
    ctx.registry().register(table.clone());

    let plan = StatementPlan::dml(
        PlanNode::Insert {
            table: "people".to_string(),
            child: Box::new(PlanNode::Values {
                rows: vec![
                    Row::from_values(vec![DataValue::Text("ada".into())]),
                    Row::from_values(vec![DataValue::Text("bob".into())]),
                ],
            }),
            columns: vec![1],
            mode: InsertMode::Plain,
        },
        DmlKind::Insert,
    );
    let rows = run_statement(&plan, &mut ctx)?;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0][0], DataValue::Integer(2));
    // last insert id is the first id generated by the statement
    assert_eq!(rows[0][2], DataValue::Integer(1));
    assert_eq!(table.row_count(), 2);
    Ok(())
}

#[test]
fn on_duplicate_key_update_counts_changed_and_unchanged() -> Result<()> {
    let table = Arc::new(MemTable::with_rows(
        "scores",
        scores_schema(),
        vec![score_row(1, 99), score_row(2, 50)],
    ));
    let mut ctx = ExecContext::for_tests();
    ctx.registry().register(table.clone());

    // Row 5 inserts cleanly, row 1 conflicts but the assignment leaves it
    // unchanged, row 2 conflicts and changes.
    let mode = InsertMode::OnDuplicateKeyUpdate(vec![(
        1,
        Literal::new(DataValue::Integer(99)),
    )]);
    let plan = StatementPlan::dml(
        insert_plan(
            "scores",
            vec![score_row(5, 5), score_row(1, 1), score_row(2, 2)],
            mode,
        ),
        DmlKind::OnDuplicate,
    );
    let rows = run_statement(&plan, &mut ctx)?;
    // affected: 1 for the insert, 0 for the unchanged row, 2 for the change
    assert_eq!(rows[0][0], DataValue::Integer(3));
    assert_eq!(rows[0][1], DataValue::Integer(2));
    Ok(())
}

#[test]
fn replace_counts_two_for_each_replaced_row() -> Result<()> {
    let table = Arc::new(MemTable::with_rows(
        "scores",
        scores_schema(),
        vec![score_row(1, 10)],
    ));
    let mut ctx = ExecContext::for_tests();
    ctx.registry().register(table.clone());

    let plan = StatementPlan::dml(
        insert_plan(
            "scores",
            vec![score_row(1, 11), score_row(2, 20)],
            InsertMode::Replace,
        ),
        DmlKind::Replace,
    );
    let rows = run_statement(&plan, &mut ctx)?;
    assert_eq!(rows[0][0], DataValue::Integer(3));
    assert_eq!(table.row_count(), 2);
    let stored = table.lookup_key(&[DataValue::Integer(1)])?.unwrap();
    assert_eq!(stored[1], DataValue::Integer(11));
    Ok(())
}

#[test]
fn insert_ignore_truncates_long_strings_and_warns() -> Result<()> {
    let schema = Schema::new(vec![
        Column::new("id", DataType::Integer, false),
        Column::new("tag", DataType::Varchar(4), true),
    ])
    .with_key(vec![0]);
    let table = Arc::new(MemTable::new("tags", schema));
    let mut ctx = ExecContext::for_tests();
    ctx.registry().register(table.clone());

    let plan = StatementPlan::dml(
        PlanNode::Insert {
            table: "tags".to_string(),
            child: Box::new(PlanNode::Values {
                rows: vec![Row::from_values(vec![
                    DataValue::Integer(1),
                    DataValue::Text("abcdefgh".into()),
                ])],
            }),
            columns: vec![0, 1],
            mode: InsertMode::Ignore,
        },
        DmlKind::Insert,
    );
    let rows = run_statement(&plan, &mut ctx)?;
    assert_eq!(rows[0][0], DataValue::Integer(1));
    assert!(!ctx.warnings().is_empty());
    let stored = table.lookup_key(&[DataValue::Integer(1)])?.unwrap();
    assert_eq!(stored[1], DataValue::Text("abcd".into()));
    Ok(())
}

#[test]
fn insert_ignore_skips_duplicate_keys_without_failing() -> Result<()> {
    let table = Arc::new(MemTable::with_rows(
        "scores",
        scores_schema(),
        vec![score_row(1, 10)],
    ));
    let mut ctx = ExecContext::for_tests();
    ctx.registry().register(table.clone());

    let plan = StatementPlan::dml(
        insert_plan(
            "scores",
            vec![score_row(1, 99), score_row(2, 20)],
            InsertMode::Ignore,
        ),
        DmlKind::Insert,
    );
    let rows = run_statement(&plan, &mut ctx)?;
    // The conflicting row is skipped, not counted, not applied.
    assert_eq!(rows[0][0], DataValue::Integer(1));
    let stored = table.lookup_key(&[DataValue::Integer(1)])?.unwrap();
    assert_eq!(stored[1], DataValue::Integer(10));
    Ok(())
}

#[test]
fn update_summary_distinguishes_matched_from_affected() -> Result<()> {
    let table = Arc::new(MemTable::with_rows(
        "scores",
        scores_schema(),
        vec![score_row(1, 9), score_row(2, 5), score_row(3, 5)],
    ));
    let mut ctx = ExecContext::for_tests();
    ctx.registry().register(table.clone());

    let plan = StatementPlan::dml(
        PlanNode::Update {
            table: "scores".to_string(),
            child: Box::new(PlanNode::TableScan {
                table: "scores".to_string(),
            }),
            target_offset: 0,
            assignments: vec![(1, Literal::new(DataValue::Integer(9)))],
            ignore: false,
        },
        DmlKind::Update,
    );
    let rows = run_statement(&plan, &mut ctx)?;
    // three matched, two actually changed
    assert_eq!(rows[0][0], DataValue::Integer(2));
    assert_eq!(rows[0][1], DataValue::Integer(3));
    Ok(())
}

#[test]
fn delete_with_filter_removes_matching_rows_only() -> Result<()> {
    let table = Arc::new(MemTable::with_rows(
        "scores",
        scores_schema(),
        vec![score_row(1, 10), score_row(2, 20), score_row(3, 30)],
    ));
    let mut ctx = ExecContext::for_tests();
    ctx.registry().register(table.clone());

    let plan = StatementPlan::dml(
        PlanNode::Delete {
            table: "scores".to_string(),
            child: Box::new(PlanNode::Filter {
                child: Box::new(PlanNode::TableScan {
                    table: "scores".to_string(),
                }),
                predicate: Compare::new(
                    CompareOp::Gt,
                    ColumnRef::new(1),
                    Literal::new(DataValue::Integer(15)),
                ),
            }),
            target_offset: 0,
        },
        DmlKind::Delete,
    );
    let rows = run_statement(&plan, &mut ctx)?;
    assert_eq!(rows[0][0], DataValue::Integer(2));
    assert_eq!(table.row_count(), 1);
    Ok(())
}
