// Expression Evaluation Boundary
//
// The expression evaluator is an external collaborator: the execution layer
// treats it as a black box `eval(ctx, row) -> value | error`. The concrete
// expressions defined here are the minimal set plans and tests need; a full
// SQL evaluator plugs in through the same trait.

use std::cmp::Ordering;
use std::sync::Arc;

use crate::error::{QueryError, QueryResult};
use crate::exec::context::ExecContext;
use crate::row::{DataValue, Row};

/// A scalar or condition expression evaluated against one row.
pub trait Expression: Send + Sync {
    fn eval(&self, ctx: &mut ExecContext, row: &Row) -> QueryResult<DataValue>;

    /// Whether this expression can never be satisfied when one of its
    /// operands is NULL. Affects outer-join null-row handling and the
    /// semi/anti empty-relation fast paths.
    fn is_null_rejecting(&self) -> bool {
        false
    }
}

/// Normalize a condition result per SQL three-valued logic: NULL and FALSE
/// both mean "row does not qualify".
pub fn eval_condition(
    cond: Option<&Arc<dyn Expression>>,
    ctx: &mut ExecContext,
    row: &Row,
) -> QueryResult<bool> {
    match cond {
        None => Ok(true),
        Some(expr) => match expr.eval(ctx, row)? {
            DataValue::Boolean(b) => Ok(b),
            DataValue::Null => Ok(false),
            other => Err(QueryError::TypeError(format!(
                "Condition did not evaluate to boolean or NULL, got {}",
                other
            ))),
        },
    }
}

/// Positional reference to one column of the evaluated row.
pub struct ColumnRef {
    index: usize,
}

impl ColumnRef {
    pub fn new(index: usize) -> Arc<dyn Expression> {
        Arc::new(ColumnRef { index })
    }
}

impl Expression for ColumnRef {
    fn eval(&self, _ctx: &mut ExecContext, row: &Row) -> QueryResult<DataValue> {
        row.get(self.index).cloned().ok_or_else(|| {
            QueryError::ExecutionError(format!(
                "Column offset {} out of bounds for row of width {}",
                self.index,
                row.len()
            ))
        })
    }
}

/// A constant value.
pub struct Literal {
    value: DataValue,
}

impl Literal {
    pub fn new(value: DataValue) -> Arc<dyn Expression> {
        Arc::new(Literal { value })
    }
}

impl Expression for Literal {
    fn eval(&self, _ctx: &mut ExecContext, _row: &Row) -> QueryResult<DataValue> {
        Ok(self.value.clone())
    }
}

/// Comparison operators over two sub-expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
}

pub struct Compare {
    op: CompareOp,
    left: Arc<dyn Expression>,
    right: Arc<dyn Expression>,
}

impl Compare {
    pub fn new(
        op: CompareOp,
        left: Arc<dyn Expression>,
        right: Arc<dyn Expression>,
    ) -> Arc<dyn Expression> {
        Arc::new(Compare { op, left, right })
    }

    /// Shorthand for the common equi-join condition `row[l] = row[r]`.
    pub fn columns_eq(left: usize, right: usize) -> Arc<dyn Expression> {
        Compare::new(CompareOp::Eq, ColumnRef::new(left), ColumnRef::new(right))
    }
}

impl Expression for Compare {
    fn eval(&self, ctx: &mut ExecContext, row: &Row) -> QueryResult<DataValue> {
        let left = self.left.eval(ctx, row)?;
        let right = self.right.eval(ctx, row)?;
        // Comparisons with NULL are NULL under three-valued logic
        if left.is_null() || right.is_null() {
            return Ok(DataValue::Null);
        }
        let ordering = left.compare(&right)?;
        let result = match self.op {
            CompareOp::Eq => ordering == Ordering::Equal,
            CompareOp::NotEq => ordering != Ordering::Equal,
            CompareOp::Lt => ordering == Ordering::Less,
            CompareOp::LtEq => ordering != Ordering::Greater,
            CompareOp::Gt => ordering == Ordering::Greater,
            CompareOp::GtEq => ordering != Ordering::Less,
        };
        Ok(DataValue::Boolean(result))
    }

    fn is_null_rejecting(&self) -> bool {
        true
    }
}

/// Logical conjunction/disjunction with SQL NULL semantics.
pub enum LogicOp {
    And,
    Or,
}

pub struct Logic {
    op: LogicOp,
    left: Arc<dyn Expression>,
    right: Arc<dyn Expression>,
}

impl Logic {
    pub fn and(left: Arc<dyn Expression>, right: Arc<dyn Expression>) -> Arc<dyn Expression> {
        Arc::new(Logic {
            op: LogicOp::And,
            left,
            right,
        })
    }

    pub fn or(left: Arc<dyn Expression>, right: Arc<dyn Expression>) -> Arc<dyn Expression> {
        Arc::new(Logic {
            op: LogicOp::Or,
            left,
            right,
        })
    }
}

impl Expression for Logic {
    fn eval(&self, ctx: &mut ExecContext, row: &Row) -> QueryResult<DataValue> {
        let left = self.left.eval(ctx, row)?;
        let right = self.right.eval(ctx, row)?;
        let (l, r) = (left.as_bool(), right.as_bool());
        let out = match self.op {
            LogicOp::And => match (l, r) {
                (Some(false), _) | (_, Some(false)) => Some(false),
                (Some(true), Some(true)) => Some(true),
                _ => None,
            },
            LogicOp::Or => match (l, r) {
                (Some(true), _) | (_, Some(true)) => Some(true),
                (Some(false), Some(false)) => Some(false),
                _ => None,
            },
        };
        Ok(out.map(DataValue::Boolean).unwrap_or(DataValue::Null))
    }

    fn is_null_rejecting(&self) -> bool {
        matches!(self.op, LogicOp::And)
            && self.left.is_null_rejecting()
            && self.right.is_null_rejecting()
    }
}

/// Arithmetic over numeric sub-expressions.
#[derive(Debug, Clone, Copy)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
}

pub struct Arith {
    op: ArithOp,
    left: Arc<dyn Expression>,
    right: Arc<dyn Expression>,
}

impl Arith {
    pub fn new(
        op: ArithOp,
        left: Arc<dyn Expression>,
        right: Arc<dyn Expression>,
    ) -> Arc<dyn Expression> {
        Arc::new(Arith { op, left, right })
    }
}

impl Expression for Arith {
    fn eval(&self, ctx: &mut ExecContext, row: &Row) -> QueryResult<DataValue> {
        let left = self.left.eval(ctx, row)?;
        let right = self.right.eval(ctx, row)?;
        if left.is_null() || right.is_null() {
            return Ok(DataValue::Null);
        }
        match (left, right) {
            (DataValue::Integer(a), DataValue::Integer(b)) => match self.op {
                ArithOp::Add => a
                    .checked_add(b)
                    .map(DataValue::Integer)
                    .ok_or(QueryError::NumericOverflow),
                ArithOp::Sub => a
                    .checked_sub(b)
                    .map(DataValue::Integer)
                    .ok_or(QueryError::NumericOverflow),
                ArithOp::Mul => a
                    .checked_mul(b)
                    .map(DataValue::Integer)
                    .ok_or(QueryError::NumericOverflow),
                ArithOp::Div => {
                    if b == 0 {
                        Err(QueryError::DivisionByZero)
                    } else {
                        Ok(DataValue::Integer(a / b))
                    }
                }
            },
            (a, b) => {
                let to_f = |v: DataValue| match v {
                    DataValue::Integer(i) => Ok(i as f64),
                    DataValue::Float(f) => Ok(f),
                    other => Err(QueryError::TypeError(format!(
                        "Cannot apply arithmetic to {}",
                        other
                    ))),
                };
                let (a, b) = (to_f(a)?, to_f(b)?);
                let out = match self.op {
                    ArithOp::Add => a + b,
                    ArithOp::Sub => a - b,
                    ArithOp::Mul => a * b,
                    ArithOp::Div => {
                        if b == 0.0 {
                            return Err(QueryError::DivisionByZero);
                        }
                        a / b
                    }
                };
                Ok(DataValue::Float(out))
            }
        }
    }
}
