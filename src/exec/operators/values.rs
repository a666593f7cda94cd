// Values Operator
//
// Emits a fixed list of rows. Leaf node for VALUES lists and for plans
// fed by materialized intermediate results.

use crate::error::QueryResult;
use crate::exec::{ExecContext, RowIterator};
use crate::row::Row;

pub struct ValuesIter {
    rows: Vec<Row>,
    index: usize,
}

impl ValuesIter {
    pub fn new(rows: Vec<Row>) -> Self {
        ValuesIter { rows, index: 0 }
    }
}

impl RowIterator for ValuesIter {
    fn next(&mut self, _ctx: &mut ExecContext) -> QueryResult<Option<Row>> {
        if self.index < self.rows.len() {
            let row = self.rows[self.index].clone();
            self.index += 1;
            Ok(Some(row))
        } else {
            Ok(None)
        }
    }

    fn close(&mut self, _ctx: &mut ExecContext) -> QueryResult<()> {
        Ok(())
    }
}
