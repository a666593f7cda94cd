// Query Error Types
//
// This module defines the error taxonomy for the execution layer. End of
// stream is not represented here: iterators signal it with Ok(None).

use thiserror::Error;

use crate::row::value::DataValue;

/// Kind of a procedural control-flow transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalKind {
    /// LEAVE a labeled loop or block.
    Leave,
    /// ITERATE (continue) a labeled loop.
    Iterate,
    /// Handler EXIT action: unwind to the matching labeled block.
    Exit,
}

/// A typed control-flow signal carried up the call stack until a block or
/// loop with the matching label intercepts it. Not a fault: block and loop
/// iterators match on `QueryError::Control` exhaustively and translate it
/// back into ordinary iteration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlSignal {
    pub label: String,
    pub kind: SignalKind,
}

impl ControlSignal {
    pub fn new(label: impl Into<String>, kind: SignalKind) -> Self {
        ControlSignal {
            label: label.into(),
            kind,
        }
    }
}

/// Represents query execution error
#[derive(Error, Debug)]
pub enum QueryError {
    /// Error from the storage collaborator, always fatal
    #[error("Storage error: {0}")]
    StorageError(String),
    /// Error during query execution
    #[error("Execution error: {0}")]
    ExecutionError(String),
    /// Error in data type conversion
    #[error("Type error: {0}")]
    TypeError(String),
    /// Table not found
    #[error("Table not found: {0}")]
    TableNotFound(String),
    /// Column not found
    #[error("Column not found: {0}")]
    ColumnNotFound(String),
    /// Transaction-related error
    #[error("Transaction error: {0}")]
    TransactionError(String),
    /// Invalid operation
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),
    /// Unique or primary key violation; carries the conflicting key so
    /// ON DUPLICATE KEY UPDATE and REPLACE paths can recover
    #[error("Duplicate key: {}", format_key(.0))]
    DuplicateKey(Vec<DataValue>),
    /// NOT NULL constraint violation, recoverable under IGNORE
    #[error("Column '{0}' cannot be null")]
    NotNullViolation(String),
    /// Enforced CHECK constraint violation
    #[error("CHECK constraint '{0}' violated")]
    CheckViolation(String),
    /// String value too long for its column, recoverable under IGNORE
    #[error("Data too long for column '{column}' (max {max_len})")]
    StringTooLong { column: String, max_len: usize },
    /// Value outside the member set of an enum column, recoverable under IGNORE
    #[error("Invalid enum value {value} for column '{column}'")]
    BadEnumValue { column: String, value: String },
    /// Malformed value that cannot be coerced, never recoverable
    #[error("Malformed value for column '{0}': {1}")]
    MalformedValue(String, String),
    /// Numeric overflow
    #[error("Numeric overflow")]
    NumericOverflow,
    /// Division by zero
    #[error("Division by zero")]
    DivisionByZero,
    /// Cooperative cancellation observed mid-iteration
    #[error("Query execution cancelled")]
    Cancelled,
    /// Recursive CTE exceeded the iteration ceiling
    #[error("Recursion limit of {0} exceeded")]
    RecursionLimitExceeded(usize),
    /// Loop body exceeded the iteration ceiling
    #[error("Loop iteration limit of {0} exceeded")]
    LoopLimitExceeded(usize),
    /// Procedural control-flow transfer, routed via the error channel but
    /// interpreted by block/loop iterators rather than propagated as a fault
    #[error("Unhandled control signal for label '{}'", .0.label)]
    Control(ControlSignal),
    /// A user-raised condition (SIGNAL), matched against block handlers
    #[error("SQLSTATE {state}: {message}")]
    Condition { state: String, message: String },
}

fn format_key(key: &[DataValue]) -> String {
    key.iter()
        .map(|v| v.to_sql_literal_for_error())
        .collect::<Vec<_>>()
        .join(", ")
}

impl QueryError {
    /// True for control-flow signals, which are not faults.
    pub fn is_control(&self) -> bool {
        matches!(self, QueryError::Control(_))
    }

    /// The SQLSTATE a condition handler can match, for the errors that map
    /// to one. Control signals, cancellation, and storage faults have no
    /// SQLSTATE and can never be caught by a handler.
    pub fn sql_state(&self) -> Option<&str> {
        match self {
            QueryError::Condition { state, .. } => Some(state),
            QueryError::DuplicateKey(_)
            | QueryError::NotNullViolation(_)
            | QueryError::CheckViolation(_) => Some("23000"),
            QueryError::StringTooLong { .. } => Some("22001"),
            QueryError::NumericOverflow => Some("22003"),
            QueryError::BadEnumValue { .. } => Some("22007"),
            QueryError::MalformedValue(_, _) => Some("22018"),
            QueryError::DivisionByZero => Some("22012"),
            _ => None,
        }
    }

    /// True for the per-row data errors that IGNORE mode downgrades to a
    /// warning plus a corrected value. Constraint and storage errors are
    /// never recoverable this way.
    pub fn is_recoverable_under_ignore(&self) -> bool {
        matches!(
            self,
            QueryError::NotNullViolation(_)
                | QueryError::StringTooLong { .. }
                | QueryError::BadEnumValue { .. }
                | QueryError::NumericOverflow
        )
    }
}

/// Result type for query operations
pub type QueryResult<T> = Result<T, QueryError>;

/// A session warning accumulated during IGNORE-mode execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Warning {
    pub message: String,
}

impl Warning {
    pub fn new(message: impl Into<String>) -> Self {
        Warning {
            message: message.into(),
        }
    }
}
