// Procedural Control-Flow Operators
//
// Iterators for stored-routine bodies: blocks with condition handlers,
// the generalized loop primitive, cursors, and recursive CTE evaluation.
// LEAVE, ITERATE, and handler EXIT travel up the stack as typed control
// signals inside the error channel; the block and loop iterators here are
// the only places that intercept them.

mod block;
mod cursor;
mod loops;
mod recursive_cte;

pub use block::{BlockIter, ConditionHandler, HandlerAction, HandlerCondition, Statement};
pub use cursor::Cursor;
pub use loops::{DEFAULT_LOOP_LIMIT, LoopIter};
pub use recursive_cte::{RECURSION_LIMIT, RecursiveCteIter, RecursiveFactory};

use crate::error::QueryResult;
use crate::exec::{BoxedIterator, ExecContext};

/// Rebuilds one statement's iterator. Loop bodies and block statements run
/// more than once (or conditionally), so they are kept as factories rather
/// than pre-built iterators.
pub type StatementFactory = Box<dyn FnMut(&mut ExecContext) -> QueryResult<BoxedIterator> + Send>;
