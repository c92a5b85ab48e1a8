// Export public modules
pub mod catalog;
pub mod common;
pub mod index;
pub mod query;
pub mod storage;
pub mod transaction;

// Re-export key items for convenient access
pub use index::hash::ExtendibleHashTable;
pub use storage::buffer::BufferPoolError;
pub use storage::buffer::BufferPoolInstance;
pub use storage::buffer::PagePool;
pub use storage::buffer::ParallelBufferPool;
pub use transaction::concurrency::LockManager;
pub use transaction::concurrency::Transaction;
pub use transaction::concurrency::TransactionManager;
