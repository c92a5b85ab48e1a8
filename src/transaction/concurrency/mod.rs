pub mod lock_manager;
pub mod transaction;
pub mod transaction_manager;

pub use lock_manager::LockManager;
pub use transaction::{
    AbortReason, IsolationLevel, Transaction, TransactionAbortError, TransactionState,
};
pub use transaction_manager::TransactionManager;
