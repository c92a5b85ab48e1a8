// Query Executor Module
//
// Volcano-style iterator execution: every operator produces tuples one at
// a time through the common Operator trait.

pub mod context;
pub mod operators;
pub mod result;

pub use context::ExecutorContext;
pub use operators::Operator;
pub use result::{DataValue, QueryError, QueryResult, Tuple};
