// Sort Operator
//
// Materializes its input, sorts it by a list of key expressions, then
// streams the sorted rows. NULLs sort first, matching index order.

use std::cmp::Ordering;
use std::sync::Arc;

use crate::error::{QueryError, QueryResult};
use crate::exec::{BoxedIterator, ExecContext, RowIterator, materialize};
use crate::expr::Expression;
use crate::row::Row;

/// One sort key: expression plus direction
#[derive(Clone)]
pub struct SortKey {
    pub expr: Arc<dyn Expression>,
    pub descending: bool,
}

pub struct SortIter {
    child: BoxedIterator,
    keys: Vec<SortKey>,
    output: Option<std::vec::IntoIter<Row>>,
    closed: bool,
}

impl SortIter {
    pub fn new(child: BoxedIterator, keys: Vec<SortKey>) -> Self {
        SortIter {
            child,
            keys,
            output: None,
            closed: false,
        }
    }

    fn sort_rows(&mut self, ctx: &mut ExecContext) -> QueryResult<Vec<Row>> {
        let rows = materialize(self.child.as_mut(), ctx)?;
        // Evaluate the key expressions once per row
        let mut keyed = Vec::with_capacity(rows.len());
        for row in rows {
            let mut key = Vec::with_capacity(self.keys.len());
            for sort_key in &self.keys {
                key.push(sort_key.expr.eval(ctx, &row)?);
            }
            keyed.push((key, row));
        }
        let mut compare_err: Option<QueryError> = None;
        keyed.sort_by(|(a, _), (b, _)| {
            for (i, sort_key) in self.keys.iter().enumerate() {
                match a[i].compare(&b[i]) {
                    Ok(Ordering::Equal) => continue,
                    Ok(ordering) => {
                        return if sort_key.descending {
                            ordering.reverse()
                        } else {
                            ordering
                        };
                    }
                    Err(e) => {
                        if compare_err.is_none() {
                            compare_err = Some(e);
                        }
                        return Ordering::Equal;
                    }
                }
            }
            Ordering::Equal
        });
        if let Some(e) = compare_err {
            return Err(e);
        }
        Ok(keyed.into_iter().map(|(_, row)| row).collect())
    }
}

impl RowIterator for SortIter {
    fn next(&mut self, ctx: &mut ExecContext) -> QueryResult<Option<Row>> {
        if self.output.is_none() {
            let sorted = self.sort_rows(ctx)?;
            self.output = Some(sorted.into_iter());
        }
        Ok(self.output.as_mut().unwrap().next())
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
