// DML Operators Module
//
// Insert, replace, update, and delete iterators plus the accumulator that
// turns their per-row effects into one summary row. Each mutation iterator
// reports what it did for the current row through the execution context;
// the accumulator consumes that effect after every pull and applies the
// counting rules of its statement kind.

mod accumulator;
mod convert;
mod delete;
mod insert;
mod update;

pub use accumulator::{AccumulatorIter, DmlKind};
pub use convert::{check_constraints, coerce_value, prepare_insert_row};
pub use delete::DeleteIter;
pub use insert::{InsertIter, InsertMode};
pub use update::UpdateIter;

use std::sync::Arc;

use crate::expr::Expression;

/// One SET-style assignment: target column offset and the expression
/// producing its new value.
pub type Assignment = (usize, Arc<dyn Expression>);

/// What a mutation iterator did for one row. Reported through
/// `ExecContext::set_effect` and consumed by the accumulator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowEffect {
    Inserted {
        last_id: Option<i64>,
    },
    /// REPLACE semantics: `prior_deleted` is true when a conflicting row
    /// had to be deleted first
    Replaced {
        prior_deleted: bool,
    },
    /// ON DUPLICATE KEY UPDATE hit an existing row; `changed` is false
    /// when the assignments left every column as it was
    DupKeyUpdated {
        changed: bool,
    },
    Updated {
        changed: bool,
    },
    Deleted,
    /// IGNORE swallowed a duplicate-key conflict; the row was not written
    IgnoredConflict,
}
