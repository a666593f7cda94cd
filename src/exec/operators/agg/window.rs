// Window Operator
//
// Materializes its input, partitions rows by the hash of the partition key
// values, sorts each partition by the window ordering, then appends one
// column per window function to every input row. Partitions are emitted in
// first-seen order so output stays deterministic.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::QueryResult;
use crate::exec::operators::sort::SortKey;
use crate::exec::{BoxedIterator, ExecContext, RowIterator, materialize};
use crate::expr::Expression;
use crate::row::{DataValue, Row, row_hash};

use super::{AggregateSpec, AggregateValue};

/// A window function column. Aggregate functions apply over the whole
/// partition and repeat their result on every row of it.
#[derive(Clone)]
pub enum WindowFunc {
    RowNumber,
    Rank,
    Aggregate(AggregateSpec),
}

pub struct WindowIter {
    child: BoxedIterator,
    partition_exprs: Vec<Arc<dyn Expression>>,
    order: Vec<SortKey>,
    funcs: Vec<WindowFunc>,
    output: Option<Vec<Row>>,
    index: usize,
    closed: bool,
}

impl WindowIter {
    pub fn new(
        child: BoxedIterator,
        partition_exprs: Vec<Arc<dyn Expression>>,
        order: Vec<SortKey>,
        funcs: Vec<WindowFunc>,
    ) -> Self {
        WindowIter {
            child,
            partition_exprs,
            order,
            funcs,
            output: None,
            index: 0,
            closed: false,
        }
    }

    fn order_keys(&self, ctx: &mut ExecContext, row: &Row) -> QueryResult<Vec<DataValue>> {
        let mut keys = Vec::with_capacity(self.order.len());
        for key in &self.order {
            keys.push(key.expr.eval(ctx, row)?);
        }
        Ok(keys)
    }

    fn compare_order_keys(&self, a: &[DataValue], b: &[DataValue]) -> QueryResult<Ordering> {
        for ((x, y), key) in a.iter().zip(b.iter()).zip(self.order.iter()) {
            let ordering = x.compare(y)?;
            let ordering = if key.descending {
                ordering.reverse()
            } else {
                ordering
            };
            if ordering != Ordering::Equal {
                return Ok(ordering);
            }
        }
        Ok(Ordering::Equal)
    }

    fn build(&mut self, ctx: &mut ExecContext) -> QueryResult<()> {
        let rows = materialize(self.child.as_mut(), ctx)?;

        // Partition by key hash, keeping first-seen partition order
        let mut partitions: HashMap<u64, Vec<Row>> = HashMap::new();
        let mut order: Vec<u64> = Vec::new();
        for row in rows {
            let mut key = Vec::with_capacity(self.partition_exprs.len());
            for expr in &self.partition_exprs {
                key.push(expr.eval(ctx, &row)?);
            }
            let hash = row_hash(&key);
            let partition = partitions.entry(hash).or_default();
            if partition.is_empty() {
                order.push(hash);
            }
            partition.push(row);
        }

        let mut output = Vec::new();
        for hash in order {
            ctx.check_cancelled()?;
            let partition = partitions.remove(&hash).unwrap();

            // Pre-evaluate order keys, then sort the partition
            let mut keyed: Vec<(Vec<DataValue>, Row)> = Vec::with_capacity(partition.len());
            for row in partition {
                keyed.push((self.order_keys(ctx, &row)?, row));
            }
            let mut compare_err = None;
            keyed.sort_by(|(a, _), (b, _)| match self.compare_order_keys(a, b) {
                Ok(ordering) => ordering,
                Err(e) => {
                    if compare_err.is_none() {
                        compare_err = Some(e);
                    }
                    Ordering::Equal
                }
            });
            if let Some(e) = compare_err {
                return Err(e);
            }

            // Partition-wide aggregates computed in one pass up front
            let mut partition_aggs: Vec<Option<AggregateValue>> = self
                .funcs
                .iter()
                .map(|f| match f {
                    WindowFunc::Aggregate(spec) => Some(AggregateValue::new(spec.agg_type)),
                    _ => None,
                })
                .collect();
            for (_, row) in &keyed {
                for (func, agg) in self.funcs.iter().zip(partition_aggs.iter_mut()) {
                    if let (WindowFunc::Aggregate(spec), Some(agg)) = (func, agg) {
                        match &spec.expr {
                            Some(expr) => agg.update(&expr.eval(ctx, row)?),
                            None => agg.update_star(),
                        }
                    }
                }
            }

            let mut rank = 0i64;
            let mut prev_keys: Option<Vec<DataValue>> = None;
            for (position, (keys, row)) in keyed.iter().enumerate() {
                let row_number = position as i64 + 1;
                let new_peer_group = match &prev_keys {
                    None => true,
                    Some(prev) => self.compare_order_keys(prev, keys)? != Ordering::Equal,
                };
                if new_peer_group {
                    // RANK leaves gaps after ties
                    rank = row_number;
                }
                prev_keys = Some(keys.clone());

                let mut values = row.values().to_vec();
                for (func, agg) in self.funcs.iter().zip(partition_aggs.iter()) {
                    values.push(match func {
                        WindowFunc::RowNumber => DataValue::Integer(row_number),
                        WindowFunc::Rank => DataValue::Integer(rank),
                        WindowFunc::Aggregate(_) => agg.as_ref().unwrap().result(),
                    });
                }
                output.push(Row::from_values(values));
            }
        }
        self.output = Some(output);
        Ok(())
    }
}

impl RowIterator for WindowIter {
    fn next(&mut self, ctx: &mut ExecContext) -> QueryResult<Option<Row>> {
        if self.output.is_none() {
            self.build(ctx)?;
        }
        let output = self.output.as_ref().unwrap();
        if self.index < output.len() {
            let row = output[self.index].clone();
            self.index += 1;
            Ok(Some(row))
        } else {
            Ok(None)
        }
    }

    fn close(&mut self, ctx: &mut ExecContext) -> QueryResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.output = None;
        self.child.close(ctx)
    }
}
