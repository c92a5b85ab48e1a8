use std::sync::{Arc, RwLock};
use anyhow::Result;
use tempfile::NamedTempFile;

use lynxdb::catalog::{Catalog, Column, DataType, Schema};
use lynxdb::query::executor::context::ExecutorContext;
use lynxdb::query::executor::result::DataValue;
use lynxdb::storage::buffer::{BufferPoolInstance, PagePool, ParallelBufferPool};
use lynxdb::storage::disk::DiskManager;
use lynxdb::transaction::concurrency::{IsolationLevel, Transaction, TransactionManager};
use lynxdb::LockManager;

// Create a temporary database file for testing
#[allow(dead_code)]
pub fn create_temp_db_file() -> Result<(NamedTempFile, String)> {
    let file = NamedTempFile::new()?;
    let path = file.path().to_str().unwrap().to_string();
    Ok((file, path))
}

// Create a single buffer pool instance over a temporary database
#[allow(dead_code)]
pub fn create_test_buffer_pool(pool_size: usize) -> Result<(Arc<BufferPoolInstance>, NamedTempFile)> {
    let (file, path) = create_temp_db_file()?;
    let disk_manager = Arc::new(DiskManager::new(path)?);
    let buffer_pool = Arc::new(BufferPoolInstance::new(pool_size, disk_manager));
    Ok((buffer_pool, file))
}

// Create a sharded parallel pool over a temporary database
#[allow(dead_code)]
pub fn create_test_parallel_pool(
    num_instances: usize,
    pool_size: usize,
) -> Result<(Arc<ParallelBufferPool>, NamedTempFile)> {
    let (file, path) = create_temp_db_file()?;
    let disk_manager = Arc::new(DiskManager::new(path)?);
    let pool = Arc::new(ParallelBufferPool::new(num_instances, pool_size, disk_manager));
    Ok((pool, file))
}

/// Everything the executor tests need wired together.
#[allow(dead_code)]
pub struct TestDb {
    pub buffer_pool: Arc<dyn PagePool>,
    pub catalog: Arc<RwLock<Catalog>>,
    pub lock_manager: Arc<LockManager>,
    pub txn_manager: Arc<TransactionManager>,
    _file: NamedTempFile,
}

#[allow(dead_code)]
pub fn create_test_db(pool_size: usize) -> Result<TestDb> {
    let _ = env_logger::builder().is_test(true).try_init();

    let (file, path) = create_temp_db_file()?;
    let disk_manager = Arc::new(DiskManager::new(path)?);
    let buffer_pool: Arc<dyn PagePool> =
        Arc::new(BufferPoolInstance::new(pool_size, disk_manager));
    let catalog = Arc::new(RwLock::new(Catalog::new(buffer_pool.clone())));
    let lock_manager = Arc::new(LockManager::new());
    let txn_manager = Arc::new(TransactionManager::new(lock_manager.clone()));

    Ok(TestDb {
        buffer_pool,
        catalog,
        lock_manager,
        txn_manager,
        _file: file,
    })
}

#[allow(dead_code)]
impl TestDb {
    pub fn begin(&self, isolation_level: IsolationLevel) -> Arc<Transaction> {
        self.txn_manager.begin(isolation_level)
    }

    pub fn context(&self, txn: &Arc<Transaction>) -> ExecutorContext {
        ExecutorContext::new(
            self.buffer_pool.clone(),
            self.catalog.clone(),
            self.lock_manager.clone(),
            txn.clone(),
        )
    }
}

/// Two-integer-column schema used across the executor tests.
#[allow(dead_code)]
pub fn two_column_schema() -> Schema {
    Schema::new(vec![
        Column::new("col_a", DataType::Integer),
        Column::new("col_b", DataType::Integer),
    ])
}

#[allow(dead_code)]
pub fn int_row(a: i64, b: i64) -> Vec<DataValue> {
    vec![DataValue::Integer(a), DataValue::Integer(b)]
}
