// Query Operators Module
//
// This module defines the operators used for query execution in the
// pull-iterator execution model.

pub mod agg;
pub mod distinct;
pub mod dml;
pub mod filter;
pub mod join;
pub mod limit;
pub mod proc;
pub mod project;
pub mod scan;
pub mod sort;
pub mod txn_wrap;
pub mod values;

pub use filter::FilterIter;
pub use limit::LimitIter;
pub use project::ProjectIter;
pub use scan::TableScanIter;
pub use sort::SortIter;
pub use values::ValuesIter;
