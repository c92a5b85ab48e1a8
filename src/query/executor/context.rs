use std::sync::{Arc, RwLock};

use crate::catalog::Catalog;
use crate::storage::buffer::PagePool;
use crate::transaction::concurrency::{LockManager, Transaction};

/// Everything an operator needs to run: storage, catalog, the lock
/// manager and the transaction it executes under.
#[derive(Clone)]
pub struct ExecutorContext {
    pub buffer_pool: Arc<dyn PagePool>,
    pub catalog: Arc<RwLock<Catalog>>,
    pub lock_manager: Arc<LockManager>,
    pub txn: Arc<Transaction>,
}

impl ExecutorContext {
    pub fn new(
        buffer_pool: Arc<dyn PagePool>,
        catalog: Arc<RwLock<Catalog>>,
        lock_manager: Arc<LockManager>,
        txn: Arc<Transaction>,
    ) -> Self {
        Self {
            buffer_pool,
            catalog,
            lock_manager,
            txn,
        }
    }
}
