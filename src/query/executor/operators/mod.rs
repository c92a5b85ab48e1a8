// Query Operators Module
//
// This module defines the operators used for query execution in the
// iterator-based execution model.

pub mod agg;
pub mod delete;
pub mod distinct;
pub mod insert;
pub mod join;
pub mod limit;
pub mod seq_scan;
pub mod update;

pub use agg::HashAggregationOperator;
pub use delete::DeleteOperator;
pub use distinct::DistinctOperator;
pub use insert::InsertOperator;
pub use join::{HashJoinOperator, NestedLoopJoinOperator};
pub use limit::LimitOperator;
pub use seq_scan::SeqScanOperator;
pub use update::UpdateOperator;

use crate::common::types::Rid;
use crate::query::executor::result::{QueryResult, Tuple};

/// The Operator trait defines the interface for all query execution
/// operators in the iterator-based execution model. Each operator
/// produces one qualifying tuple per `next` call and signals end of
/// stream with `None`.
pub trait Operator: Send {
    /// Initialize the operator before execution, resetting any iteration
    /// state and re-initializing children
    fn init(&mut self) -> QueryResult<()>;

    /// Get the next tuple and its record id from this operator
    fn next(&mut self) -> QueryResult<Option<(Tuple, Rid)>>;

    /// Close the operator and release any resources
    fn close(&mut self) -> QueryResult<()> {
        Ok(())
    }
}
