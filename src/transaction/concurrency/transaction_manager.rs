// LynxDB TransactionManager implementation
// Hands out transaction ids and drives commit/abort teardown

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use parking_lot::Mutex;

use crate::common::types::TxnId;
use crate::transaction::concurrency::lock_manager::LockManager;
use crate::transaction::concurrency::transaction::{
    IsolationLevel, Transaction, TransactionState,
};

/// Creates transactions with monotone ids and releases their locks when
/// they finish. Wound-wait relies on the id order: smaller id = older.
pub struct TransactionManager {
    lock_manager: Arc<LockManager>,
    next_txn_id: AtomicU32,
    active: Mutex<HashMap<TxnId, Arc<Transaction>>>,
}

impl TransactionManager {
    pub fn new(lock_manager: Arc<LockManager>) -> Self {
        Self {
            lock_manager,
            next_txn_id: AtomicU32::new(1),
            active: Mutex::new(HashMap::new()),
        }
    }

    pub fn lock_manager(&self) -> &Arc<LockManager> {
        &self.lock_manager
    }

    pub fn begin(&self, isolation_level: IsolationLevel) -> Arc<Transaction> {
        let txn_id = self.next_txn_id.fetch_add(1, Ordering::SeqCst);
        let txn = Arc::new(Transaction::new(txn_id, isolation_level));
        self.active.lock().insert(txn_id, txn.clone());
        txn
    }

    /// Commit: release every held lock. A transaction that was wounded
    /// while we were not looking stays aborted.
    pub fn commit(&self, txn: &Arc<Transaction>) {
        if txn.state() != TransactionState::Aborted {
            txn.set_state(TransactionState::Committed);
        }
        self.release_locks(txn);
        self.finish(txn.id());
    }

    /// Abort: mark aborted and release every held lock.
    pub fn abort(&self, txn: &Arc<Transaction>) {
        txn.set_state(TransactionState::Aborted);
        self.release_locks(txn);
        self.finish(txn.id());
    }

    pub fn active_count(&self) -> usize {
        self.active.lock().len()
    }

    fn release_locks(&self, txn: &Arc<Transaction>) {
        for rid in txn.held_locks() {
            self.lock_manager.unlock(txn, rid);
        }
    }

    fn finish(&self, txn_id: TxnId) {
        self.active.lock().remove(&txn_id);
        self.lock_manager.forget_txn(txn_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::types::Rid;

    #[test]
    fn test_monotone_ids() {
        let manager = TransactionManager::new(Arc::new(LockManager::new()));
        let t1 = manager.begin(IsolationLevel::RepeatableRead);
        let t2 = manager.begin(IsolationLevel::RepeatableRead);
        assert!(t1.id() < t2.id());
    }

    #[test]
    fn test_commit_releases_locks() {
        let lock_manager = Arc::new(LockManager::new());
        let manager = TransactionManager::new(lock_manager.clone());
        let txn = manager.begin(IsolationLevel::RepeatableRead);
        let rid = Rid::new(1, 0);

        lock_manager.lock_exclusive(&txn, rid).unwrap();
        assert!(txn.is_exclusive_locked(rid));

        manager.commit(&txn);
        assert_eq!(txn.state(), TransactionState::Committed);
        assert!(txn.held_locks().is_empty());
        assert_eq!(manager.active_count(), 0);

        // The row is free again for another transaction
        let txn2 = manager.begin(IsolationLevel::RepeatableRead);
        lock_manager.lock_exclusive(&txn2, rid).unwrap();
        manager.commit(&txn2);
    }

    #[test]
    fn test_abort_releases_locks() {
        let lock_manager = Arc::new(LockManager::new());
        let manager = TransactionManager::new(lock_manager.clone());
        let txn = manager.begin(IsolationLevel::RepeatableRead);
        let rid = Rid::new(2, 1);

        lock_manager.lock_shared(&txn, rid).unwrap();
        manager.abort(&txn);
        assert_eq!(txn.state(), TransactionState::Aborted);
        assert!(txn.held_locks().is_empty());
    }
}
