// Hash-based Aggregation Operator
//
// Groups rows in an in-memory hash table keyed by the hash of the group
// key values, verifying the key itself on collision. Output rows are the
// group key values followed by one column per aggregate, emitted in
// first-seen group order. With no group expressions the whole input is a
// single group and exactly one row comes out, even for empty input.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::QueryResult;
use crate::exec::{BoxedIterator, ExecContext, RowIterator};
use crate::expr::{Expression, eval_condition};
use crate::row::{DataValue, Row, row_hash};

use super::{AggregateSpec, AggregateValue};

struct Group {
    key: Vec<DataValue>,
    aggregates: Vec<AggregateValue>,
}

pub struct HashAggregateIter {
    child: BoxedIterator,
    group_exprs: Vec<Arc<dyn Expression>>,
    specs: Vec<AggregateSpec>,
    /// HAVING filter over the output row shape
    having: Option<Arc<dyn Expression>>,
    output: Option<Vec<Row>>,
    index: usize,
    closed: bool,
}

impl HashAggregateIter {
    pub fn new(
        child: BoxedIterator,
        group_exprs: Vec<Arc<dyn Expression>>,
        specs: Vec<AggregateSpec>,
        having: Option<Arc<dyn Expression>>,
    ) -> Self {
        HashAggregateIter {
            child,
            group_exprs,
            specs,
            having,
            output: None,
            index: 0,
            closed: false,
        }
    }

    fn new_aggregates(&self) -> Vec<AggregateValue> {
        self.specs
            .iter()
            .map(|s| AggregateValue::new(s.agg_type))
            .collect()
    }

    fn build(&mut self, ctx: &mut ExecContext) -> QueryResult<()> {
        // Buckets keyed by group-key hash; collisions verified against the
        // stored key. Order tracks first appearance for stable output.
        let mut buckets: HashMap<u64, Vec<Group>> = HashMap::new();
        let mut order: Vec<(u64, usize)> = Vec::new();
        let mut row_count = 0usize;
        while let Some(row) = self.child.next(ctx)? {
            ctx.check_cancelled()?;
            row_count += 1;
            let mut key = Vec::with_capacity(self.group_exprs.len());
            for expr in &self.group_exprs {
                key.push(expr.eval(ctx, &row)?);
            }
            let hash = row_hash(&key);
            let bucket = buckets.entry(hash).or_default();
            let position = match bucket.iter().position(|g| g.key == key) {
                Some(position) => position,
                None => {
                    bucket.push(Group {
                        key,
                        aggregates: self.new_aggregates(),
                    });
                    order.push((hash, bucket.len() - 1));
                    bucket.len() - 1
                }
            };
            let group = &mut buckets.get_mut(&hash).unwrap()[position];
            for (aggregate, spec) in group.aggregates.iter_mut().zip(self.specs.iter()) {
                match &spec.expr {
                    Some(expr) => aggregate.update(&expr.eval(ctx, &row)?),
                    None => aggregate.update_star(),
                }
            }
        }
        log::debug!(
            "hash aggregate grouped {} rows into {} groups",
            row_count,
            order.len()
        );

        // An empty ungrouped input still yields one row of identities
        if order.is_empty() && self.group_exprs.is_empty() {
            let key_hash = row_hash(&[]);
            buckets.entry(key_hash).or_default().push(Group {
                key: Vec::new(),
                aggregates: self.new_aggregates(),
            });
            order.push((key_hash, 0));
        }

        let mut output = Vec::with_capacity(order.len());
        for (hash, position) in order {
            let group = &buckets[&hash][position];
            let mut values = group.key.clone();
            values.extend(group.aggregates.iter().map(|a| a.result()));
            let row = Row::from_values(values);
            if eval_condition(self.having.as_ref(), ctx, &row)? {
                output.push(row);
            }
        }
        self.output = Some(output);
        Ok(())
    }
}

impl RowIterator for HashAggregateIter {
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
