// Sirin Row Execution Engine

pub mod error;
pub mod exec;
pub mod expr;
pub mod plan;
pub mod row;
pub mod storage;
pub mod txn;

// Re-export key items for convenient access
pub use error::{QueryError, QueryResult};
pub use exec::build::{build, build_statement, run_statement};
pub use exec::{BoxedIterator, ExecContext, RowIterator};
pub use plan::{PlanNode, StatementPlan};
pub use row::{DataValue, Row, Schema};
pub use storage::{Table, TableRegistry};
