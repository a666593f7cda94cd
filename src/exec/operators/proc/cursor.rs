// Cursor Execution
//
// A cursor materializes its select statement's rows eagerly when opened,
// so the underlying iterator never outlives the OPEN call and cannot leak
// past its owning block. FETCH walks the cached rows; running off the end
// raises the NOT FOUND condition (SQLSTATE 02000), which is how REPEAT
// fetch loops terminate through a handler.

use crate::error::{QueryError, QueryResult};
use crate::exec::{BoxedIterator, ExecContext, materialize};
use crate::row::Row;

pub struct Cursor {
    name: String,
    rows: Vec<Row>,
    position: usize,
    open: bool,
}

impl Cursor {
    pub fn new(name: impl Into<String>) -> Self {
        Cursor {
            name: name.into(),
            rows: Vec::new(),
            position: 0,
            open: false,
        }
    }

    /// Drains the select iterator into the cursor's cache and closes it.
    pub fn open(&mut self, ctx: &mut ExecContext, mut select: BoxedIterator) -> QueryResult<()> {
        if self.open {
            return Err(QueryError::InvalidOperation(format!(
                "Cursor '{}' is already open",
                self.name
            )));
        }
        let rows = materialize(select.as_mut(), ctx);
        let close_result = select.close(ctx);
        self.rows = rows?;
        close_result?;
        self.position = 0;
        self.open = true;
        log::debug!("cursor '{}' opened with {} rows", self.name, self.rows.len());
        Ok(())
    }

    /// Next cached row, or the NOT FOUND condition once exhausted.
    pub fn fetch(&mut self) -> QueryResult<Row> {
        if !self.open {
            return Err(QueryError::InvalidOperation(format!(
                "Cursor '{}' is not open",
                self.name
            )));
        }
        match self.rows.get(self.position) {
            Some(row) => {
                self.position += 1;
                Ok(row.clone())
            }
            None => Err(QueryError::Condition {
                state: "02000".to_string(),
                message: format!("No more rows in cursor '{}'", self.name),
            }),
        }
    }

    pub fn close(&mut self) -> QueryResult<()> {
        if !self.open {
            return Err(QueryError::InvalidOperation(format!(
                "Cursor '{}' is not open",
                self.name
            )));
        }
        self.open = false;
        self.rows.clear();
        self.position = 0;
        Ok(())
    }

    pub fn is_open(&self) -> bool {
        self.open
    }
}
