// Query Result Implementation
//
// This module defines the value, tuple and error types used by query
// execution.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use serde;
use thiserror::Error;

use crate::index::hash::HashIndexError;
use crate::storage::buffer::BufferPoolError;
use crate::storage::table::TableError;
use crate::transaction::concurrency::TransactionAbortError;

/// Possible data types for values in a tuple
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum DataValue {
    Null,
    Integer(i64),
    Float(f64),
    Text(String),
    Boolean(bool),
}

impl Eq for DataValue {}

impl Hash for DataValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        // Add a type discriminant first to avoid collisions between different types
        match self {
            DataValue::Null => {
                0.hash(state);
            }
            DataValue::Integer(i) => {
                1.hash(state);
                i.hash(state);
            }
            DataValue::Float(f) => {
                2.hash(state);
                // Handle NaN and -0.0 special cases
                let bits = f.to_bits();
                bits.hash(state);
            }
            DataValue::Text(s) => {
                3.hash(state);
                s.hash(state);
            }
            DataValue::Boolean(b) => {
                4.hash(state);
                b.hash(state);
            }
        }
    }
}

impl fmt::Display for DataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataValue::Null => write!(f, "NULL"),
            DataValue::Integer(i) => write!(f, "{}", i),
            DataValue::Float(fl) => write!(f, "{}", fl),
            DataValue::Text(s) => write!(f, "\"{}\"", s),
            DataValue::Boolean(b) => write!(f, "{}", b),
        }
    }
}

impl PartialOrd for DataValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            // Null is incomparable with anything
            (DataValue::Null, _) | (_, DataValue::Null) => None,

            (DataValue::Integer(a), DataValue::Integer(b)) => a.partial_cmp(b),
            (DataValue::Float(a), DataValue::Float(b)) => a.partial_cmp(b),

            // Integer and float can be compared
            (DataValue::Integer(a), DataValue::Float(b)) => (*a as f64).partial_cmp(b),
            (DataValue::Float(a), DataValue::Integer(b)) => a.partial_cmp(&(*b as f64)),

            (DataValue::Text(a), DataValue::Text(b)) => a.partial_cmp(b),
            (DataValue::Boolean(a), DataValue::Boolean(b)) => a.partial_cmp(b),

            // Different types are incomparable (except int/float)
            _ => None,
        }
    }
}

impl DataValue {
    /// Truthiness used by predicate evaluation: only a true Boolean passes.
    pub fn is_true(&self) -> bool {
        matches!(self, DataValue::Boolean(true))
    }
}

/// Positional tuple of values. The schema travels in the plan node, so
/// the tuple itself is just the value vector.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Tuple {
    values: Vec<DataValue>,
}

impl Tuple {
    pub fn new(values: Vec<DataValue>) -> Self {
        Tuple { values }
    }

    pub fn value(&self, idx: usize) -> QueryResult<&DataValue> {
        self.values
            .get(idx)
            .ok_or_else(|| QueryError::ColumnNotFound(format!("column index {}", idx)))
    }

    pub fn values(&self) -> &[DataValue] {
        &self.values
    }

    pub fn to_bytes(&self) -> QueryResult<Vec<u8>> {
        bincode::serialize(&self.values)
            .map_err(|e| QueryError::ExecutionError(format!("tuple serialization failed: {}", e)))
    }

    pub fn from_bytes(bytes: &[u8]) -> QueryResult<Self> {
        let values = bincode::deserialize(bytes)
            .map_err(|e| QueryError::ExecutionError(format!("tuple deserialization failed: {}", e)))?;
        Ok(Tuple { values })
    }
}

/// Represents query execution error
#[derive(Error, Debug)]
pub enum QueryError {
    /// Error from storage layer
    #[error("Storage error: {0}")]
    StorageError(String),
    /// Error during query execution
    #[error("Execution error: {0}")]
    ExecutionError(String),
    /// Error in data type conversion
    #[error("Type error: {0}")]
    TypeError(String),
    /// Table not found
    #[error("Table not found: {0}")]
    TableNotFound(String),
    /// Column not found
    #[error("Column not found: {0}")]
    ColumnNotFound(String),
    /// Invalid operation
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),
    /// Error accessing the catalog
    #[error("Catalog error: {0}")]
    CatalogError(String),
    /// The transaction was aborted by the lock manager
    #[error("Transaction aborted: {0}")]
    TransactionAborted(#[from] TransactionAbortError),
    /// Error from the table heap
    #[error("Table error: {0}")]
    TableError(#[from] TableError),
    /// Error from an index
    #[error("Index error: {0}")]
    IndexError(#[from] HashIndexError),
    /// Error from the buffer pool
    #[error("Buffer pool error: {0}")]
    BufferPoolError(#[from] BufferPoolError),
}

/// Result type for query operations
pub type QueryResult<T> = Result<T, QueryError>;
