// Range Heap Join Implementation
//
// Joins a probe stream sorted ascending on the probe value against an
// interval stream sorted ascending on interval minimum. Live intervals sit
// in a min-heap ordered on interval maximum. Advancing to a probe value
// first evicts every interval whose maximum lies below the probe, then
// admits every interval whose minimum does not exceed it. After both
// adjustments every interval remaining in the heap contains the probe, so
// the heap contents are the exact match set.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::sync::Arc;

use crate::error::QueryResult;
use crate::exec::{BoxedIterator, ExecContext, RowIterator, close_all};
use crate::expr::Expression;
use crate::row::{DataValue, Row};

use super::JoinConfig;

/// Heap entry ordered on the interval maximum. Null bounds never enter the
/// heap, so the total-order fallback below is never exercised by live
/// entries.
struct HeapEntry {
    max: DataValue,
    row: Row,
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for HeapEntry {}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.max
            .partial_cmp(&other.max)
            .unwrap_or(Ordering::Equal)
    }
}

pub struct RangeHeapJoinIter {
    config: JoinConfig,
    /// Probe stream, sorted ascending on the probe expression
    left: BoxedIterator,
    /// Interval stream, sorted ascending on the minimum expression
    right: BoxedIterator,
    probe_expr: Arc<dyn Expression>,
    min_expr: Arc<dyn Expression>,
    max_expr: Arc<dyn Expression>,
    heap: BinaryHeap<Reverse<HeapEntry>>,
    /// Lookahead interval not yet admitted
    pending: Option<Row>,
    right_done: bool,
    current_left: Option<Row>,
    matches: Vec<Row>,
    match_index: usize,
    closed: bool,
}

impl RangeHeapJoinIter {
    pub fn new(
        config: JoinConfig,
        left: BoxedIterator,
        right: BoxedIterator,
        probe_expr: Arc<dyn Expression>,
        min_expr: Arc<dyn Expression>,
        max_expr: Arc<dyn Expression>,
    ) -> Self {
        RangeHeapJoinIter {
            config,
            left,
            right,
            probe_expr,
            min_expr,
            max_expr,
            heap: BinaryHeap::new(),
            pending: None,
            right_done: false,
            current_left: None,
            matches: Vec::new(),
            match_index: 0,
            closed: false,
        }
    }

    /// Evicts dead intervals and admits newly live ones for `probe`, then
    /// snapshots the heap as the match set.
    fn advance_to(&mut self, ctx: &mut ExecContext, probe: &DataValue) -> QueryResult<()> {
        while let Some(Reverse(top)) = self.heap.peek() {
            if top.max.compare(probe)? == Ordering::Less {
                self.heap.pop();
            } else {
                break;
            }
        }
        loop {
            if self.pending.is_none() && !self.right_done {
                self.pending = self.right.next(ctx)?;
                if self.pending.is_none() {
                    self.right_done = true;
                }
            }
            let Some(interval) = self.pending.clone() else { break };
            let min = self.min_expr.eval(ctx, &interval)?;
            if min.is_null() {
                // An unbounded-below interval cannot be ordered; drop it
                self.pending = None;
                continue;
            }
            if min.compare(probe)? == Ordering::Greater {
                break;
            }
            self.pending = None;
            let max = self.max_expr.eval(ctx, &interval)?;
            if max.is_null() || max.compare(&min)? == Ordering::Less {
                continue;
            }
            if max.compare(probe)? != Ordering::Less {
                self.heap.push(Reverse(HeapEntry { max, row: interval }));
            }
        }
        self.matches = self
            .heap
            .iter()
            .map(|Reverse(entry)| entry.row.clone())
            .collect();
        self.match_index = 0;
        Ok(())
    }
}

impl RowIterator for RangeHeapJoinIter {
    fn next(&mut self, ctx: &mut ExecContext) -> QueryResult<Option<Row>> {
        loop {
            ctx.check_cancelled()?;
            if let Some(left) = self.current_left.clone() {
                while self.match_index < self.matches.len() {
                    let right = self.matches[self.match_index].clone();
                    self.match_index += 1;
                    if self.config.condition.is_some()
                        && !self.config.matches(ctx, &left, &right)?
                    {
                        continue;
                    }
                    return Ok(Some(self.config.compose(&left, &right)));
                }
                self.current_left = None;
            }
            let Some(left) = self.left.next(ctx)? else {
                return Ok(None);
            };
            let probe = self.probe_expr.eval(ctx, &left)?;
            if probe.is_null() {
                continue;
            }
            self.advance_to(ctx, &probe)?;
            self.current_left = Some(left);
        }
    }

    fn close(&mut self, ctx: &mut ExecContext) -> QueryResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.heap.clear();
        self.matches.clear();
        close_all(ctx, [&mut self.left, &mut self.right])
    }
}
