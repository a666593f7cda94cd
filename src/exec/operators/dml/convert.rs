// Row Preparation and Value Coercion
//
// Shared by the insert and update iterators: fill in defaults and
// auto-increment values, evaluate generated columns, then validate and
// convert each value against its column descriptor. Under IGNORE mode the
// recoverable data errors (non-nullable NULL, over-length string, bad enum
// member, numeric overflow) are downgraded to a warning plus a coerced
// value; everything else still aborts the statement.

use std::sync::Arc;

use crate::error::{QueryError, QueryResult, Warning};
use crate::exec::ExecContext;
use crate::expr::eval_condition;
use crate::row::{Column, DataType, DataValue, Row, Schema};
use crate::storage::Table;

/// Validate and convert one value for one column. `ignore` enables the
/// warning-and-coerce path for recoverable errors.
pub fn coerce_value(
    ctx: &mut ExecContext,
    column: &Column,
    value: DataValue,
    ignore: bool,
) -> QueryResult<DataValue> {
    if value.is_null() {
        if column.is_nullable() || column.is_auto_increment() {
            return Ok(value);
        }
        return recover(
            ctx,
            ignore,
            QueryError::NotNullViolation(column.name().to_string()),
            || column.data_type().zero_value(),
        );
    }

    match (column.data_type(), value) {
        (DataType::Integer, DataValue::Integer(i)) => Ok(DataValue::Integer(i)),
        (DataType::Integer, DataValue::Float(f)) => {
            if f.is_finite() && f >= i64::MIN as f64 && f <= i64::MAX as f64 {
                Ok(DataValue::Integer(f as i64))
            } else {
                recover(
                    ctx,
                    ignore,
                    QueryError::NumericOverflow,
                    || {
                        DataValue::Integer(if f.is_sign_negative() {
                            i64::MIN
                        } else {
                            i64::MAX
                        })
                    },
                )
            }
        }
        (DataType::Integer, DataValue::Text(s)) => s
            .trim()
            .parse::<i64>()
            .map(DataValue::Integer)
            .map_err(|_| {
                QueryError::MalformedValue(
                    column.name().to_string(),
                    format!("cannot convert '{}' to integer", s),
                )
            }),
        (DataType::Float, DataValue::Float(f)) => Ok(DataValue::Float(f)),
        (DataType::Float, DataValue::Integer(i)) => Ok(DataValue::Float(i as f64)),
        (DataType::Float, DataValue::Text(s)) => s
            .trim()
            .parse::<f64>()
            .map(DataValue::Float)
            .map_err(|_| {
                QueryError::MalformedValue(
                    column.name().to_string(),
                    format!("cannot convert '{}' to float", s),
                )
            }),
        (DataType::Text, DataValue::Text(s)) => Ok(DataValue::Text(s)),
        (DataType::Text, other) => Ok(DataValue::Text(other.to_string())),
        (DataType::Varchar(max), DataValue::Text(s)) => {
            if s.chars().count() <= *max {
                Ok(DataValue::Text(s))
            } else {
                let max = *max;
                recover(
                    ctx,
                    ignore,
                    QueryError::StringTooLong {
                        column: column.name().to_string(),
                        max_len: max,
                    },
                    || DataValue::Text(s.chars().take(max).collect()),
                )
            }
        }
        (DataType::Boolean, DataValue::Boolean(b)) => Ok(DataValue::Boolean(b)),
        (DataType::Boolean, DataValue::Integer(i)) => Ok(DataValue::Boolean(i != 0)),
        (DataType::Date, DataValue::Date(d)) => Ok(DataValue::Date(d)),
        (DataType::Date, DataValue::Text(s)) => Ok(DataValue::Date(s)),
        (DataType::Timestamp, DataValue::Timestamp(t)) => Ok(DataValue::Timestamp(t)),
        (DataType::Timestamp, DataValue::Text(s)) => Ok(DataValue::Timestamp(s)),
        (DataType::Blob, DataValue::Blob(b)) => Ok(DataValue::Blob(b)),
        (DataType::Enum(members), DataValue::Text(s)) => {
            if members.iter().any(|m| *m == s) {
                Ok(DataValue::Text(s))
            } else {
                recover(
                    ctx,
                    ignore,
                    QueryError::BadEnumValue {
                        column: column.name().to_string(),
                        value: s,
                    },
                    || DataValue::Text(String::new()),
                )
            }
        }
        (expected, got) => Err(QueryError::TypeError(format!(
            "column {} expects {:?}, got {}",
            column.name(),
            expected,
            got.to_sql_literal_for_error()
        ))),
    }
}

fn recover(
    ctx: &mut ExecContext,
    ignore: bool,
    error: QueryError,
    coerced: impl FnOnce() -> DataValue,
) -> QueryResult<DataValue> {
    if ignore && error.is_recoverable_under_ignore() {
        ctx.add_warning(Warning {
            message: error.to_string(),
        });
        Ok(coerced())
    } else {
        Err(error)
    }
}

/// Evaluate every enforced CHECK constraint against a fully prepared row.
pub fn check_constraints(
    ctx: &mut ExecContext,
    schema: &Schema,
    row: &Row,
) -> QueryResult<()> {
    for check in schema.checks() {
        if !check.enforced {
            continue;
        }
        if !eval_condition(Some(&check.expr), ctx, row)? {
            return Err(QueryError::CheckViolation(check.name.clone()));
        }
    }
    Ok(())
}

/// Build a full-width row for insertion.
///
/// `columns` maps each supplied value to its target offset; unsupplied
/// columns take their default (or NULL). Auto-increment fills in when the
/// column arrives NULL or 0, recording the generated id in the session.
/// Generated columns are evaluated last against the assembled row,
/// overriding any supplied value. Every cell then passes through
/// `coerce_value` and the row through the CHECK constraints.
pub fn prepare_insert_row(
    ctx: &mut ExecContext,
    table: &Arc<dyn Table>,
    columns: &[usize],
    supplied: &Row,
    ignore: bool,
) -> QueryResult<Row> {
    let schema = table.schema().clone();
    if supplied.len() != columns.len() {
        return Err(QueryError::ExecutionError(format!(
            "insert supplies {} values for {} columns",
            supplied.len(),
            columns.len()
        )));
    }

    let mut values: Vec<DataValue> = schema
        .columns()
        .iter()
        .map(|c| c.default().cloned().unwrap_or(DataValue::Null))
        .collect();
    for (value, &offset) in supplied.values().iter().zip(columns.iter()) {
        if offset >= values.len() {
            return Err(QueryError::ColumnNotFound(format!(
                "column offset {} out of range for table {}",
                offset,
                table.name()
            )));
        }
        values[offset] = value.clone();
    }

    for (offset, column) in schema.columns().iter().enumerate() {
        if !column.is_auto_increment() {
            continue;
        }
        let needs_id = matches!(values[offset], DataValue::Null | DataValue::Integer(0));
        if needs_id {
            if let Some(id) = table.next_auto_value()? {
                values[offset] = DataValue::Integer(id);
                ctx.session_mut().last_insert_id = Some(id);
            }
        }
    }

    let mut row = Row::from_values(values);
    for (offset, column) in schema.columns().iter().enumerate() {
        if let Some(expr) = column.generated() {
            let generated = expr.eval(ctx, &row)?;
            row.set(offset, generated);
        }
    }

    for (offset, column) in schema.columns().iter().enumerate() {
        let coerced = coerce_value(ctx, column, row[offset].clone(), ignore)?;
        row.set(offset, coerced);
    }

    check_constraints(ctx, &schema, &row)?;
    Ok(row)
}
