// Hash Join Implementation
//
// Two-phase equality join. The first pull exhaustively builds a hash map
// keyed by the row-hash of the probe key over every right row; every
// subsequent pull probes the map by the left row's key hash. Bucket hits
// are verified by value comparison, so hash collisions cannot produce
// false matches.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::QueryResult;
use crate::exec::{BoxedIterator, ExecContext, RowIterator, close_all};
use crate::expr::Expression;
use crate::row::{DataValue, Row, row_hash};

use super::JoinConfig;

pub struct HashJoinIter {
    config: JoinConfig,
    left: BoxedIterator,
    right: BoxedIterator,
    /// Key expressions over the (prefixed) left row
    left_key: Vec<Arc<dyn Expression>>,
    /// Key expressions over the right row
    right_key: Vec<Arc<dyn Expression>>,
    /// Probe-key hash -> (key values, right row) for collision checks
    table: HashMap<u64, Vec<(Vec<DataValue>, Row)>>,
    table_built: bool,
    /// Whether any right row exists at all; an empty build side behaves
    /// differently from a missing bucket for null-rejecting join types
    right_has_rows: bool,
    current_left: Option<Row>,
    current_matches: Vec<Row>,
    match_index: usize,
    found_match: bool,
    closed: bool,
}

impl HashJoinIter {
    pub fn new(
        config: JoinConfig,
        left: BoxedIterator,
        right: BoxedIterator,
        left_key: Vec<Arc<dyn Expression>>,
        right_key: Vec<Arc<dyn Expression>>,
    ) -> Self {
        HashJoinIter {
            config,
            left,
            right,
            left_key,
            right_key,
            table: HashMap::new(),
            table_built: false,
            right_has_rows: false,
            current_left: None,
            current_matches: Vec::new(),
            match_index: 0,
            found_match: false,
            closed: false,
        }
    }

    fn eval_key(
        exprs: &[Arc<dyn Expression>],
        ctx: &mut ExecContext,
        row: &Row,
    ) -> QueryResult<Vec<DataValue>> {
        let mut key = Vec::with_capacity(exprs.len());
        for expr in exprs {
            key.push(expr.eval(ctx, row)?);
        }
        Ok(key)
    }

    fn build_table(&mut self, ctx: &mut ExecContext) -> QueryResult<()> {
        while let Some(row) = self.right.next(ctx)? {
            ctx.check_cancelled()?;
            self.right_has_rows = true;
            let key = Self::eval_key(&self.right_key, ctx, &row)?;
            let hash = row_hash(&key);
            self.table.entry(hash).or_default().push((key, row));
        }
        self.table_built = true;
        log::debug!(
            "hash join build side: {} buckets, empty={}",
            self.table.len(),
            !self.right_has_rows
        );
        Ok(())
    }

    /// Look up the matching right rows for one left row. A NULL anywhere
    /// in the probe key never matches under equality.
    fn probe(&mut self, ctx: &mut ExecContext, left: &Row) -> QueryResult<Vec<Row>> {
        let key = Self::eval_key(&self.left_key, ctx, left)?;
        if key.iter().any(|v| v.is_null()) {
            return Ok(Vec::new());
        }
        let hash = row_hash(&key);
        let Some(bucket) = self.table.get(&hash) else {
            return Ok(Vec::new());
        };
        let mut matches = Vec::new();
        for (candidate_key, row) in bucket {
            if *candidate_key == key {
                matches.push(row.clone());
            }
        }
        Ok(matches)
    }
}

impl RowIterator for HashJoinIter {
    fn next(&mut self, ctx: &mut ExecContext) -> QueryResult<Option<Row>> {
        if !self.table_built {
            self.build_table(ctx)?;
        }
        loop {
            ctx.check_cancelled()?;

            if self.match_index < self.current_matches.len() {
                let left = self.current_left.clone().unwrap();
                let right = self.current_matches[self.match_index].clone();
                self.match_index += 1;
                // Residual conditions beyond the hash key still apply
                if self.config.condition.is_some() && !self.config.matches(ctx, &left, &right)? {
                    continue;
                }
                self.found_match = true;
                return Ok(Some(self.config.compose(&left, &right)));
            }

            if self.current_left.is_some()
                && self.config.kind.is_left_outer()
                && !self.found_match
            {
                let left = self.current_left.take().unwrap();
                self.current_matches.clear();
                return Ok(Some(self.config.null_extended(&left)));
            }

            self.current_left = self.left.next(ctx)?;
            self.found_match = false;
            self.match_index = 0;
            let Some(left) = self.current_left.clone() else {
                return Ok(None);
            };
            if !self.right_has_rows {
                // No rows at all on the build side: nothing can match,
                // but left-outer rows must still surface
                self.current_matches.clear();
                if !self.config.kind.is_left_outer() {
                    return Ok(None);
                }
                continue;
            }
            self.current_matches = self.probe(ctx, &left)?;
        }
    }

    fn close(&mut self, ctx: &mut ExecContext) -> QueryResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.table.clear();
        close_all(ctx, [&mut self.left, &mut self.right])
    }
}
