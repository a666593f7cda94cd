// Row Model
//
// A row is an ordered, fixed-length sequence of typed values. Rows may be
// concatenations of a parent-scope prefix plus one or more table-row
// segments; the layout is fixed at plan-compile time, so all access is
// positional.

pub mod schema;
pub mod value;

pub use schema::{CheckConstraint, Column, DataType, Schema};
pub use value::DataValue;

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::ops::Index;

/// Represents a row flowing between iterators
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Row {
    values: Vec<DataValue>,
}

impl Row {
    pub fn new() -> Self {
        Row { values: Vec::new() }
    }

    pub fn from_values(values: Vec<DataValue>) -> Self {
        Row { values }
    }

    pub fn values(&self) -> &[DataValue] {
        &self.values
    }

    pub fn values_mut(&mut self) -> &mut [DataValue] {
        &mut self.values
    }

    pub fn into_values(self) -> Vec<DataValue> {
        self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&DataValue> {
        self.values.get(index)
    }

    pub fn set(&mut self, index: usize, value: DataValue) {
        self.values[index] = value;
    }

    /// Concatenate `self ‖ other` into a new row.
    pub fn concat(&self, other: &Row) -> Row {
        let mut values = Vec::with_capacity(self.values.len() + other.values.len());
        values.extend_from_slice(&self.values);
        values.extend_from_slice(&other.values);
        Row { values }
    }

    /// Append another row's values in place.
    pub fn extend(&mut self, other: &Row) {
        self.values.extend_from_slice(&other.values);
    }

    /// A sub-row covering `range` of this row's positions. Used to strip
    /// a parent-scope prefix or to split an old‖new update pair.
    pub fn slice(&self, start: usize, end: usize) -> Row {
        Row {
            values: self.values[start..end].to_vec(),
        }
    }

    /// Drop the first `prefix_len` values, returning the remainder.
    pub fn strip_prefix(&self, prefix_len: usize) -> Row {
        self.slice(prefix_len, self.values.len())
    }
}

impl Index<usize> for Row {
    type Output = DataValue;

    fn index(&self, index: usize) -> &DataValue {
        &self.values[index]
    }
}

impl From<Vec<DataValue>> for Row {
    fn from(values: Vec<DataValue>) -> Self {
        Row { values }
    }
}

/// Deterministic hash of a sequence of values, used for grouping,
/// deduplication, and hash-join bucketing.
pub fn row_hash(values: &[DataValue]) -> u64 {
    let mut hasher = DefaultHasher::new();
    for value in values {
        value.hash(&mut hasher);
    }
    hasher.finish()
}
