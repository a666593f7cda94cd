// Full Outer Join Implementation
//
// Runs as a left-outer hash probe first, recording the hash of every right
// row that matched some left row. Once the left side is exhausted, a
// completion pass walks the build table and emits the right rows that were
// never matched, null-extended on the left side. Right rows that share a
// hash are disambiguated positionally so duplicate right rows each get
// their own completion entry.

use std::collections::{HashMap, HashSet};

use crate::error::QueryResult;
use crate::exec::{BoxedIterator, ExecContext, RowIterator, close_all};
use crate::row::{Row, row_hash};

use super::JoinConfig;

pub struct FullOuterJoinIter {
    config: JoinConfig,
    left: BoxedIterator,
    right: BoxedIterator,
    /// Right rows keyed by their full-row hash, built on first pull
    table: Option<HashMap<u64, Vec<Row>>>,
    /// (hash, position) pairs of right rows some left row matched
    matched: HashSet<(u64, usize)>,
    current_left: Option<Row>,
    /// Pending (hash, position) matches for the current left row
    pending: Vec<(u64, usize)>,
    pending_index: usize,
    found_match: bool,
    /// Leftover unmatched right rows, populated when the left side ends
    completion: Vec<Row>,
    completion_index: usize,
    left_done: bool,
    closed: bool,
}

impl FullOuterJoinIter {
    pub fn new(config: JoinConfig, left: BoxedIterator, right: BoxedIterator) -> Self {
        FullOuterJoinIter {
            config,
            left,
            right,
            table: None,
            matched: HashSet::new(),
            current_left: None,
            pending: Vec::new(),
            pending_index: 0,
            found_match: false,
            completion: Vec::new(),
            completion_index: 0,
            left_done: false,
            closed: false,
        }
    }

    fn build_table(&mut self, ctx: &mut ExecContext) -> QueryResult<()> {
        let mut table: HashMap<u64, Vec<Row>> = HashMap::new();
        let mut count = 0usize;
        while let Some(row) = self.right.next(ctx)? {
            table.entry(row_hash(row.values())).or_default().push(row);
            count += 1;
        }
        log::debug!("full outer join buffered {} right rows", count);
        self.table = Some(table);
        Ok(())
    }

    /// Collects matches for the left row by scanning the whole build table.
    /// Full outer joins accept arbitrary conditions, so no key hashing is
    /// assumed on the probe path.
    fn collect_matches(&mut self, ctx: &mut ExecContext, left: &Row) -> QueryResult<()> {
        self.pending.clear();
        self.pending_index = 0;
        let table = self.table.take().unwrap();
        let mut result = Ok(());
        'outer: for (hash, bucket) in &table {
            for (position, right) in bucket.iter().enumerate() {
                match self.config.matches(ctx, left, right) {
                    Ok(true) => self.pending.push((*hash, position)),
                    Ok(false) => {}
                    Err(e) => {
                        result = Err(e);
                        break 'outer;
                    }
                }
            }
        }
        self.table = Some(table);
        result
    }

    fn start_completion(&mut self) {
        let table = self.table.take().unwrap_or_default();
        for (hash, bucket) in table {
            for (position, row) in bucket.into_iter().enumerate() {
                if !self.matched.contains(&(hash, position)) {
                    self.completion.push(row);
                }
            }
        }
        self.left_done = true;
    }
}

impl RowIterator for FullOuterJoinIter {
    fn next(&mut self, ctx: &mut ExecContext) -> QueryResult<Option<Row>> {
        if self.table.is_none() && !self.left_done {
            self.build_table(ctx)?;
        }
        loop {
            ctx.check_cancelled()?;
            if self.left_done {
                if self.completion_index < self.completion.len() {
                    let right = self.completion[self.completion_index].clone();
                    self.completion_index += 1;
                    // Width must include the parent prefix compose strips
                    let mut nulls = self.config.left_schema.null_row().into_values();
                    for _ in 0..self.config.parent_len {
                        nulls.insert(0, crate::row::DataValue::Null);
                    }
                    let left_nulls = Row::from_values(nulls);
                    return Ok(Some(self.config.compose(&left_nulls, &right)));
                }
                return Ok(None);
            }

            if let Some(left) = self.current_left.clone() {
                if self.pending_index < self.pending.len() {
                    let (hash, position) = self.pending[self.pending_index];
                    self.pending_index += 1;
                    self.found_match = true;
                    self.matched.insert((hash, position));
                    let right = self.table.as_ref().unwrap()[&hash][position].clone();
                    return Ok(Some(self.config.compose(&left, &right)));
                }
                let emit_outer = !self.found_match;
                self.current_left = None;
                if emit_outer {
                    return Ok(Some(self.config.null_extended(&left)));
                }
                continue;
            }

            match self.left.next(ctx)? {
                Some(left) => {
                    self.collect_matches(ctx, &left)?;
                    self.found_match = false;
                    self.current_left = Some(left);
                }
                None => self.start_completion(),
            }
        }
    }

    fn close(&mut self, ctx: &mut ExecContext) -> QueryResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.table = None;
        self.pending.clear();
        self.completion.clear();
        close_all(ctx, [&mut self.left, &mut self.right])
    }
}
