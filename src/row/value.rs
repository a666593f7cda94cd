// Data Value Implementation
//
// This module defines the typed values that make up rows flowing through
// the execution layer.

use std::cmp::{Eq, Ordering};
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::error::{QueryError, QueryResult};

/// Possible data types for values in a row
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum DataValue {
    Null,
    Integer(i64),
    Float(f64),
    Text(String),
    Boolean(bool),
    Date(String),
    Timestamp(String),
    Blob(Vec<u8>),
}

impl Eq for DataValue {}

impl Hash for DataValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            DataValue::Null => 0.hash(state),
            DataValue::Integer(i) => {
                1.hash(state);
                i.hash(state);
            }
            DataValue::Float(f) => {
                2.hash(state);
                f.to_bits().hash(state);
            }
            DataValue::Text(s) => {
                3.hash(state);
                s.hash(state);
            }
            DataValue::Boolean(b) => {
                4.hash(state);
                b.hash(state);
            }
            DataValue::Date(s) => {
                5.hash(state);
                s.hash(state);
            }
            DataValue::Timestamp(s) => {
                6.hash(state);
                s.hash(state);
            }
            DataValue::Blob(b) => {
                7.hash(state);
                b.hash(state);
            }
        }
    }
}

impl fmt::Display for DataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataValue::Null => write!(f, "NULL"),
            DataValue::Integer(i) => write!(f, "{}", i),
            DataValue::Float(fl) => write!(f, "{}", fl),
            DataValue::Text(s) => write!(f, "\"{}\"", s),
            DataValue::Boolean(b) => write!(f, "{}", b),
            DataValue::Date(s) => write!(f, "DATE '{}'", s),
            DataValue::Timestamp(s) => write!(f, "TIMESTAMP '{}'", s),
            DataValue::Blob(b) => write!(f, "BLOB ({} bytes)", b.len()),
        }
    }
}

impl PartialOrd for DataValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (DataValue::Null, DataValue::Null) => Some(Ordering::Equal),
            (DataValue::Null, _) => Some(Ordering::Less),
            (_, DataValue::Null) => Some(Ordering::Greater),

            (DataValue::Integer(a), DataValue::Integer(b)) => a.partial_cmp(b),
            (DataValue::Float(a), DataValue::Float(b)) => a.partial_cmp(b),
            (DataValue::Integer(a), DataValue::Float(b)) => (*a as f64).partial_cmp(b),
            (DataValue::Float(a), DataValue::Integer(b)) => a.partial_cmp(&(*b as f64)),
            (DataValue::Text(a), DataValue::Text(b)) => Some(a.cmp(b)),
            (DataValue::Boolean(a), DataValue::Boolean(b)) => a.partial_cmp(b),
            (DataValue::Date(a), DataValue::Date(b)) => Some(a.cmp(b)),
            (DataValue::Timestamp(a), DataValue::Timestamp(b)) => Some(a.cmp(b)),
            // Blobs are typically not ordered beyond equality
            (DataValue::Blob(_), DataValue::Blob(_)) => None,

            // Comparing Text with Date/Timestamp (string representations)
            (DataValue::Text(a), DataValue::Date(b)) => Some(a.cmp(b)),
            (DataValue::Date(a), DataValue::Text(b)) => Some(a.cmp(b)),
            (DataValue::Text(a), DataValue::Timestamp(b)) => Some(a.cmp(b)),
            (DataValue::Timestamp(a), DataValue::Text(b)) => Some(a.cmp(b)),

            (DataValue::Date(a), DataValue::Timestamp(b)) => {
                Some(a.as_str().cmp(b.split(' ').next().unwrap_or("")))
            }
            (DataValue::Timestamp(a), DataValue::Date(b)) => {
                Some(a.split(' ').next().unwrap_or("").cmp(b.as_str()))
            }

            _ => None,
        }
    }
}

impl DataValue {
    pub fn is_null(&self) -> bool {
        matches!(self, DataValue::Null)
    }

    /// Compare two DataValues for sorting purposes.
    /// NULLs sort before any non-NULL value, matching the ordering
    /// guaranteed by index-backed children.
    pub fn compare(&self, other: &Self) -> QueryResult<Ordering> {
        match (self, other) {
            (DataValue::Null, DataValue::Null) => Ok(Ordering::Equal),
            (DataValue::Null, _) => Ok(Ordering::Less),
            (_, DataValue::Null) => Ok(Ordering::Greater),
            (a, b) => a.partial_cmp(b).ok_or_else(|| {
                QueryError::TypeError(format!(
                    "Cannot compare incompatible values: {} and {}",
                    a, b
                ))
            }),
        }
    }

    pub fn to_sql_literal_for_error(&self) -> String {
        match self {
            DataValue::Null => "NULL".to_string(),
            DataValue::Integer(i) => i.to_string(),
            DataValue::Float(f) => f.to_string(),
            DataValue::Text(s) => format!("'{}'", s.replace("'", "''")),
            DataValue::Boolean(b) => if *b { "TRUE" } else { "FALSE" }.to_string(),
            DataValue::Date(s) => format!("'{}'", s),
            DataValue::Timestamp(s) => format!("'{}'", s),
            DataValue::Blob(b) => format!("X'{}'", hex::encode(b)),
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            DataValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            DataValue::Integer(i) => Some(*i),
            _ => None,
        }
    }
}
