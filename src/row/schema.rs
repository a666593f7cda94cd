// Schema and Column Descriptors
//
// A schema is an ordered sequence of column descriptors. It maps a column
// name (optionally qualified by its source table) to a positional offset,
// classifies a column's table of origin for multi-table join rows, and
// drives schema-aware row equality for update change detection.

use std::sync::Arc;

use crate::error::{QueryError, QueryResult};
use crate::expr::Expression;
use crate::row::value::DataValue;
use crate::row::Row;

/// Column data types understood by the execution layer
#[derive(Debug, Clone, PartialEq)]
pub enum DataType {
    Integer,
    Float,
    Text,
    /// Fixed-capacity string; inserts longer than `max` are a truncation
    /// error (warning + truncate under IGNORE)
    Varchar(usize),
    Boolean,
    Date,
    Timestamp,
    Blob,
    /// Closed member set; values outside it are a bad-enum error
    Enum(Vec<String>),
}

impl DataType {
    /// The type-appropriate default IGNORE mode falls back to when a
    /// non-nullable column receives NULL.
    pub fn zero_value(&self) -> DataValue {
        match self {
            DataType::Integer => DataValue::Integer(0),
            DataType::Float => DataValue::Float(0.0),
            DataType::Text | DataType::Varchar(_) => DataValue::Text(String::new()),
            DataType::Boolean => DataValue::Boolean(false),
            DataType::Date => DataValue::Date("0000-00-00".to_string()),
            DataType::Timestamp => DataValue::Timestamp("0000-00-00 00:00:00".to_string()),
            DataType::Blob => DataValue::Blob(Vec::new()),
            DataType::Enum(members) => members
                .first()
                .map(|m| DataValue::Text(m.clone()))
                .unwrap_or(DataValue::Text(String::new())),
        }
    }
}

/// A single column descriptor
#[derive(Clone)]
pub struct Column {
    name: String,
    /// Source-table tag used to classify columns of multi-table join rows
    table: Option<String>,
    data_type: DataType,
    nullable: bool,
    default: Option<DataValue>,
    /// Generated column: evaluated against the row being written,
    /// overriding any supplied value
    generated: Option<Arc<dyn Expression>>,
    auto_increment: bool,
}

impl Column {
    pub fn new(name: impl Into<String>, data_type: DataType, nullable: bool) -> Self {
        Column {
            name: name.into(),
            table: None,
            data_type,
            nullable,
            default: None,
            generated: None,
            auto_increment: false,
        }
    }

    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    pub fn with_default(mut self, default: DataValue) -> Self {
        self.default = Some(default);
        self
    }

    pub fn with_generated(mut self, expr: Arc<dyn Expression>) -> Self {
        self.generated = Some(expr);
        self
    }

    pub fn with_auto_increment(mut self) -> Self {
        self.auto_increment = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn table(&self) -> Option<&str> {
        self.table.as_deref()
    }

    pub fn data_type(&self) -> &DataType {
        &self.data_type
    }

    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    pub fn default(&self) -> Option<&DataValue> {
        self.default.as_ref()
    }

    pub fn generated(&self) -> Option<&Arc<dyn Expression>> {
        self.generated.as_ref()
    }

    pub fn is_auto_increment(&self) -> bool {
        self.auto_increment
    }
}

impl std::fmt::Debug for Column {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Column")
            .field("name", &self.name)
            .field("table", &self.table)
            .field("data_type", &self.data_type)
            .field("nullable", &self.nullable)
            .finish()
    }
}

/// An enforced CHECK constraint attached to a schema
#[derive(Clone)]
pub struct CheckConstraint {
    pub name: String,
    pub expr: Arc<dyn Expression>,
    pub enforced: bool,
}

/// Ordered list of column descriptors for one iterator stage
#[derive(Debug, Clone, Default)]
pub struct Schema {
    columns: Vec<Column>,
    /// Positional offsets of the primary/unique key columns
    key: Vec<usize>,
    checks: Vec<CheckConstraint>,
}

impl std::fmt::Debug for CheckConstraint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CheckConstraint")
            .field("name", &self.name)
            .field("enforced", &self.enforced)
            .finish()
    }
}

impl Schema {
    pub fn new(columns: Vec<Column>) -> Self {
        Schema {
            columns,
            key: Vec::new(),
            checks: Vec::new(),
        }
    }

    pub fn with_key(mut self, key: Vec<usize>) -> Self {
        self.key = key;
        self
    }

    pub fn with_check(mut self, check: CheckConstraint) -> Self {
        self.checks.push(check);
        self
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn key(&self) -> &[usize] {
        &self.key
    }

    pub fn checks(&self) -> &[CheckConstraint] {
        &self.checks
    }

    /// Map a column name (optionally table-qualified) to its positional
    /// offset. Unqualified names match the first column with that name.
    pub fn index_of(&self, table: Option<&str>, name: &str) -> QueryResult<usize> {
        self.columns
            .iter()
            .position(|c| {
                c.name() == name && (table.is_none() || c.table() == table)
            })
            .ok_or_else(|| match table {
                Some(t) => QueryError::ColumnNotFound(format!("{}.{}", t, name)),
                None => QueryError::ColumnNotFound(name.to_string()),
            })
    }

    /// Extract the key values of a row laid out by this schema.
    pub fn key_of(&self, row: &Row) -> Vec<DataValue> {
        self.key.iter().map(|&i| row[i].clone()).collect()
    }

    /// A row of NULLs matching this schema's width, used to null-extend
    /// the unmatched side of an outer join.
    pub fn null_row(&self) -> Row {
        Row::from_values(vec![DataValue::Null; self.columns.len()])
    }

    /// Schema-aware row equality: positional, over exactly this schema's
    /// width. Used by UPDATE change detection (old != new).
    pub fn rows_equal(&self, a: &Row, b: &Row) -> bool {
        let n = self.columns.len();
        a.values().len() >= n
            && b.values().len() >= n
            && a.values()[..n] == b.values()[..n]
    }

    /// Concatenate two schemas, preserving source-table tags. Used at
    /// plan-compile time to fix the layout of join output rows.
    pub fn join(&self, other: &Schema) -> Schema {
        let mut columns = self.columns.clone();
        columns.extend(other.columns.iter().cloned());
        Schema::new(columns)
    }
}
