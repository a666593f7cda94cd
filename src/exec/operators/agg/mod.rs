// Aggregation Operators Module
//
// Hash-based grouping plus the window operator. Both buffer input rows and
// share the aggregate update rules defined here.

mod hash;
mod window;

pub use hash::HashAggregateIter;
pub use window::{WindowFunc, WindowIter};

use std::cmp::Ordering;
use std::sync::Arc;

use crate::expr::Expression;
use crate::row::DataValue;

/// Types of supported aggregate functions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateType {
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

/// One aggregate column in an operator's output. `expr` of None means
/// COUNT(*), which counts rows rather than non-null values.
#[derive(Clone)]
pub struct AggregateSpec {
    pub agg_type: AggregateType,
    pub expr: Option<Arc<dyn Expression>>,
}

impl AggregateSpec {
    pub fn new(agg_type: AggregateType, expr: Arc<dyn Expression>) -> Self {
        AggregateSpec {
            agg_type,
            expr: Some(expr),
        }
    }

    pub fn count_star() -> Self {
        AggregateSpec {
            agg_type: AggregateType::Count,
            expr: None,
        }
    }
}

/// Aggregate value calculation helper struct
#[derive(Debug, Clone)]
pub(crate) struct AggregateValue {
    agg_type: AggregateType,
    /// Count of non-null values seen (rows, for COUNT(*))
    count: i64,
    sum: Option<DataValue>,
    min: Option<DataValue>,
    max: Option<DataValue>,
}

impl AggregateValue {
    pub(crate) fn new(agg_type: AggregateType) -> Self {
        AggregateValue {
            agg_type,
            count: 0,
            sum: None,
            min: None,
            max: None,
        }
    }

    /// Update with one row's value. NULLs are skipped, so COUNT(expr),
    /// SUM, MIN, MAX, and AVG all ignore them.
    pub(crate) fn update(&mut self, value: &DataValue) {
        if value.is_null() {
            return;
        }
        self.count += 1;
        match self.agg_type {
            AggregateType::Count => {}
            AggregateType::Sum | AggregateType::Avg => self.update_sum(value),
            AggregateType::Min => self.update_min(value),
            AggregateType::Max => self.update_max(value),
        }
    }

    /// COUNT(*) counts the row regardless of any value
    pub(crate) fn update_star(&mut self) {
        self.count += 1;
    }

    fn update_sum(&mut self, value: &DataValue) {
        match value {
            DataValue::Integer(i) => match &mut self.sum {
                None => self.sum = Some(DataValue::Integer(*i)),
                Some(DataValue::Integer(sum)) => *sum += *i,
                Some(DataValue::Float(sum)) => *sum += *i as f64,
                _ => {}
            },
            DataValue::Float(f) => match &mut self.sum {
                None => self.sum = Some(DataValue::Float(*f)),
                Some(DataValue::Integer(sum)) => {
                    self.sum = Some(DataValue::Float(*sum as f64 + *f));
                }
                Some(DataValue::Float(sum)) => *sum += *f,
                _ => {}
            },
            _ => {}
        }
    }

    fn update_min(&mut self, value: &DataValue) {
        match &self.min {
            None => self.min = Some(value.clone()),
            Some(current) => {
                if let Some(Ordering::Greater) = current.partial_cmp(value) {
                    self.min = Some(value.clone());
                }
            }
        }
    }

    fn update_max(&mut self, value: &DataValue) {
        match &self.max {
            None => self.max = Some(value.clone()),
            Some(current) => {
                if let Some(Ordering::Less) = current.partial_cmp(value) {
                    self.max = Some(value.clone());
                }
            }
        }
    }

    /// Get the final aggregate value
    pub(crate) fn result(&self) -> DataValue {
        match self.agg_type {
            AggregateType::Count => DataValue::Integer(self.count),
            AggregateType::Sum => self.sum.clone().unwrap_or(DataValue::Null),
            AggregateType::Avg => match self.sum.clone() {
                Some(DataValue::Integer(sum)) if self.count > 0 => {
                    DataValue::Float(sum as f64 / self.count as f64)
                }
                Some(DataValue::Float(sum)) if self.count > 0 => {
                    DataValue::Float(sum / self.count as f64)
                }
                _ => DataValue::Null,
            },
            AggregateType::Min => self.min.clone().unwrap_or(DataValue::Null),
            AggregateType::Max => self.max.clone().unwrap_or(DataValue::Null),
        }
    }
}
