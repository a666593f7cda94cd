use std::sync::Arc;

use anyhow::Result;

use sirindb::exec::build::{build_statement, run_statement};
use sirindb::exec::materialize;
use sirindb::exec::operators::ValuesIter;
use sirindb::exec::operators::dml::{DmlKind, InsertIter, InsertMode};
use sirindb::exec::operators::txn_wrap::TriggerSavepointIter;
use sirindb::exec::RowIterator;
use sirindb::expr::{Arith, ArithOp, Literal};
use sirindb::row::{Column, DataType, DataValue, Row, Schema};
use sirindb::storage::{MemTable, TableRegistry};
use sirindb::txn::RecordingTxn;
use sirindb::{ExecContext, PlanNode, StatementPlan};

fn ctx_with_txn() -> (ExecContext, Arc<RecordingTxn>) {
    let txn = RecordingTxn::new();
    let ctx = ExecContext::new(Arc::new(TableRegistry::new()), txn.clone());
    (ctx, txn)
}

fn scores_table() -> Arc<MemTable> {
    let schema = Schema::new(vec![
        Column::new("id", DataType::Integer, false),
        Column::new("score", DataType::Integer, false),
    ])
    .with_key(vec![0]);
    Arc::new(MemTable::new("scores", schema))
}

fn score_row(id: i64, score: i64) -> Row {
    Row::from_values(vec![DataValue::Integer(id), DataValue::Integer(score)])
}

fn insert_statement(rows: Vec<Row>) -> StatementPlan {
    StatementPlan::dml(
        PlanNode::Insert {
            table: "scores".to_string(),
            child: Box::new(PlanNode::Values { rows }),
            columns: vec![0, 1],
            mode: InsertMode::Plain,
        },
        DmlKind::Insert,
    )
}

#[test]
fn autocommit_statement_commits_exactly_once_on_close() -> Result<()> {
    let (mut ctx, txn) = ctx_with_txn();
    ctx.registry().register(scores_table());

    run_statement(&insert_statement(vec![score_row(1, 10)]), &mut ctx)?;
    assert_eq!(txn.commits(), 1);
    Ok(())
}

#[test]
fn explicit_transaction_defers_the_commit() -> Result<()> {
    let (mut ctx, txn) = ctx_with_txn();
    ctx.registry().register(scores_table());
    ctx.session_mut().in_explicit_transaction = true;

    run_statement(&insert_statement(vec![score_row(1, 10)]), &mut ctx)?;
    assert_eq!(txn.commits(), 0);
    Ok(())
}

#[test]
fn failed_statement_never_commits() -> Result<()> {
    let (mut ctx, txn) = ctx_with_txn();

    let plan = StatementPlan::query(PlanNode::Project {
        child: Box::new(PlanNode::Values {
            rows: vec![Row::from_values(vec![DataValue::Integer(1)])],
        }),
        exprs: vec![Arith::new(
            ArithOp::Div,
            Literal::new(DataValue::Integer(1)),
            Literal::new(DataValue::Integer(0)),
        )],
    });
    assert!(run_statement(&plan, &mut ctx).is_err());
    assert_eq!(txn.commits(), 0);
    Ok(())
}

#[test]
fn trigger_savepoint_rolls_back_on_child_error() -> Result<()> {
    let (mut ctx, txn) = ctx_with_txn();
    let table = scores_table();
    ctx.registry().register(table.clone());

    // Second row violates the key, failing the pipeline mid-statement.
    let insert = Box::new(InsertIter::new(
        table,
        Box::new(ValuesIter::new(vec![score_row(1, 10), score_row(1, 20)])),
        vec![0, 1],
        InsertMode::Plain,
    ));
    let mut wrapped = TriggerSavepointIter::new(insert, "trg_before_insert");

    assert!(wrapped.next(&mut ctx)?.is_some());
    assert_eq!(txn.open_savepoints(), 1);
    assert!(wrapped.next(&mut ctx).is_err());
    assert_eq!(txn.savepoint_rollbacks(), vec!["trg_before_insert".to_string()]);
    assert_eq!(txn.open_savepoints(), 0);

    wrapped.close(&mut ctx)?;
    wrapped.close(&mut ctx)?;
    assert_eq!(txn.open_savepoints(), 0);
    Ok(())
}

#[test]
fn trigger_savepoint_releases_after_clean_run() -> Result<()> {
    let (mut ctx, txn) = ctx_with_txn();
    let table = scores_table();
    ctx.registry().register(table.clone());

    let insert = Box::new(InsertIter::new(
        table,
        Box::new(ValuesIter::new(vec![score_row(1, 10)])),
        vec![0, 1],
        InsertMode::Plain,
    ));
    let mut wrapped = TriggerSavepointIter::new(insert, "trg_before_insert");
    let mut count = 0;
    while wrapped.next(&mut ctx)?.is_some() {
        count += 1;
    }
    wrapped.close(&mut ctx)?;
    assert_eq!(count, 1);
    assert!(txn.savepoint_rollbacks().is_empty());
    assert_eq!(txn.open_savepoints(), 0);
    Ok(())
}

#[test]
fn trigger_wrap_plan_node_guards_its_subtree() -> Result<()> {
    let (mut ctx, txn) = ctx_with_txn();
    let table = scores_table();
    ctx.registry().register(table.clone());

    let plan = PlanNode::TriggerWrap {
        child: Box::new(PlanNode::Insert {
            table: "scores".to_string(),
            child: Box::new(PlanNode::Values {
                rows: vec![score_row(1, 10), score_row(1, 20)],
            }),
            columns: vec![0, 1],
            mode: InsertMode::Plain,
        }),
        savepoint: "trg_audit".to_string(),
    };
    let mut iter = sirindb::exec::build::build(&plan, &mut ctx)?;
    assert!(iter.next(&mut ctx)?.is_some());
    assert!(iter.next(&mut ctx).is_err());
    assert_eq!(txn.savepoint_rollbacks(), vec!["trg_audit".to_string()]);
    iter.close(&mut ctx)?;
    Ok(())
}

#[test]
fn double_close_commits_only_once() -> Result<()> {
    let (mut ctx, txn) = ctx_with_txn();
    ctx.registry().register(scores_table());

    let plan = insert_statement(vec![score_row(1, 10)]);
    let mut iter = build_statement(&plan, &mut ctx)?;
    materialize(iter.as_mut(), &mut ctx)?;
    iter.close(&mut ctx)?;
    iter.close(&mut ctx)?;
    assert_eq!(txn.commits(), 1);
    Ok(())
}
