use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use log::warn;
use parking_lot::{Condvar, Mutex};

use crate::common::types::{Rid, TxnId};
use crate::transaction::concurrency::transaction::{
    AbortReason, IsolationLevel, Transaction, TransactionAbortError, TransactionState,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    Shared,
    Exclusive,
}

#[derive(Debug)]
struct LockRequest {
    txn_id: TxnId,
    mode: LockMode,
    granted: bool,
}

impl LockRequest {
    fn new(txn_id: TxnId, mode: LockMode) -> Self {
        Self {
            txn_id,
            mode,
            granted: false,
        }
    }
}

/// Per-RID wait queue. `sharing_count` counts granted shared holders,
/// `is_writing` marks a granted exclusive holder, `upgrading` admits at
/// most one shared→exclusive upgrade at a time.
struct LockRequestQueue {
    requests: VecDeque<LockRequest>,
    sharing_count: u32,
    is_writing: bool,
    upgrading: Option<TxnId>,
    cv: Arc<Condvar>,
}

impl LockRequestQueue {
    fn new() -> Self {
        Self {
            requests: VecDeque::new(),
            sharing_count: 0,
            is_writing: false,
            upgrading: None,
            cv: Arc::new(Condvar::new()),
        }
    }
}

struct LockTable {
    queues: HashMap<Rid, LockRequestQueue>,
    // Needed so wound-wait can abort transactions other than the caller
    txns: HashMap<TxnId, Arc<Transaction>>,
}

/// Strict two-phase-locking row lock manager with wound-wait deadlock
/// prevention: a waiting transaction aborts every younger granted holder
/// in its way; older holders make it wait. Queue FIFO fairness is
/// deliberately sacrificed — wounded transactions retry from scratch.
pub struct LockManager {
    inner: Mutex<LockTable>,
}

impl Default for LockManager {
    fn default() -> Self {
        Self::new()
    }
}

impl LockManager {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(LockTable {
                queues: HashMap::new(),
                txns: HashMap::new(),
            }),
        }
    }

    /// Acquire a shared lock on the row.
    pub fn lock_shared(
        &self,
        txn: &Arc<Transaction>,
        rid: Rid,
    ) -> Result<bool, TransactionAbortError> {
        if txn.isolation_level() == IsolationLevel::ReadUncommitted {
            txn.set_state(TransactionState::Aborted);
            return Err(TransactionAbortError::new(
                txn.id(),
                AbortReason::LockSharedOnReadUncommitted,
            ));
        }
        if txn.is_shared_locked(rid) || txn.is_exclusive_locked(rid) {
            return Ok(true);
        }

        let mut inner = self.inner.lock();
        self.lock_prepare(&mut inner, txn, rid)?;

        let cv = {
            let queue = inner.queues.get_mut(&rid).expect("queue just ensured");
            queue
                .requests
                .push_back(LockRequest::new(txn.id(), LockMode::Shared));
            queue.cv.clone()
        };

        loop {
            if txn.state() == TransactionState::Aborted {
                Self::remove_request(&mut inner, rid, txn.id());
                return Err(TransactionAbortError::new(txn.id(), AbortReason::Deadlock));
            }

            let must_wait = {
                let table = &mut *inner;
                let queue = table.queues.get_mut(&rid).expect("queue exists while waiting");
                if queue.is_writing {
                    Self::wound_younger(queue, &table.txns, txn.id(), rid);
                }
                queue.is_writing
            };
            if !must_wait {
                break;
            }
            cv.wait(&mut inner);
        }

        let queue = inner.queues.get_mut(&rid).expect("queue exists after wait");
        if let Some(request) = queue.requests.iter_mut().find(|r| r.txn_id == txn.id()) {
            request.granted = true;
        }
        queue.sharing_count += 1;
        txn.add_shared_lock(rid);
        Ok(true)
    }

    /// Acquire an exclusive lock on the row.
    pub fn lock_exclusive(
        &self,
        txn: &Arc<Transaction>,
        rid: Rid,
    ) -> Result<bool, TransactionAbortError> {
        if txn.is_exclusive_locked(rid) {
            return Ok(true);
        }

        let mut inner = self.inner.lock();
        self.lock_prepare(&mut inner, txn, rid)?;

        let cv = {
            let queue = inner.queues.get_mut(&rid).expect("queue just ensured");
            queue
                .requests
                .push_back(LockRequest::new(txn.id(), LockMode::Exclusive));
            queue.cv.clone()
        };

        loop {
            if txn.state() == TransactionState::Aborted {
                Self::remove_request(&mut inner, rid, txn.id());
                return Err(TransactionAbortError::new(txn.id(), AbortReason::Deadlock));
            }

            let must_wait = {
                let table = &mut *inner;
                let queue = table.queues.get_mut(&rid).expect("queue exists while waiting");
                if queue.is_writing || queue.sharing_count > 0 {
                    Self::wound_younger(queue, &table.txns, txn.id(), rid);
                }
                queue.is_writing || queue.sharing_count > 0
            };
            if !must_wait {
                break;
            }
            cv.wait(&mut inner);
        }

        let queue = inner.queues.get_mut(&rid).expect("queue exists after wait");
        if let Some(request) = queue.requests.iter_mut().find(|r| r.txn_id == txn.id()) {
            request.granted = true;
        }
        queue.is_writing = true;
        txn.add_exclusive_lock(rid);
        Ok(true)
    }

    /// Upgrade a held shared lock to exclusive. At most one transaction
    /// may be upgrading a given row at a time.
    pub fn lock_upgrade(
        &self,
        txn: &Arc<Transaction>,
        rid: Rid,
    ) -> Result<bool, TransactionAbortError> {
        let mut inner = self.inner.lock();

        if txn.state() == TransactionState::Shrinking {
            txn.set_state(TransactionState::Aborted);
            return Err(TransactionAbortError::new(
                txn.id(),
                AbortReason::LockOnShrinking,
            ));
        }

        inner.txns.insert(txn.id(), txn.clone());
        let cv = {
            let queue = inner
                .queues
                .entry(rid)
                .or_insert_with(LockRequestQueue::new);

            if queue.upgrading.is_some() {
                txn.set_state(TransactionState::Aborted);
                return Err(TransactionAbortError::new(
                    txn.id(),
                    AbortReason::UpgradeConflict,
                ));
            }

            // Give up the shared grant before queueing for exclusive.
            queue.sharing_count = queue.sharing_count.saturating_sub(1);
            txn.remove_shared_lock(rid);
            if let Some(request) = queue.requests.iter_mut().find(|r| r.txn_id == txn.id()) {
                request.mode = LockMode::Exclusive;
                request.granted = false;
            }
            queue.upgrading = Some(txn.id());
            queue.cv.clone()
        };

        loop {
            if txn.state() == TransactionState::Aborted {
                if let Some(queue) = inner.queues.get_mut(&rid) {
                    queue.upgrading = None;
                }
                Self::remove_request(&mut inner, rid, txn.id());
                return Err(TransactionAbortError::new(txn.id(), AbortReason::Deadlock));
            }

            let must_wait = {
                let queue = inner.queues.get_mut(&rid).expect("queue exists while waiting");
                queue.is_writing || queue.sharing_count > 0
            };
            if !must_wait {
                break;
            }
            cv.wait(&mut inner);
        }

        let queue = inner.queues.get_mut(&rid).expect("queue exists after wait");
        queue.is_writing = true;
        queue.upgrading = None;
        if let Some(request) = queue.requests.iter_mut().find(|r| r.txn_id == txn.id()) {
            request.granted = true;
        }
        txn.add_exclusive_lock(rid);
        Ok(true)
    }

    /// Release the transaction's lock on the row. Except for shared locks
    /// under ReadCommitted, the first unlock moves the transaction into
    /// its shrinking phase.
    pub fn unlock(&self, txn: &Arc<Transaction>, rid: Rid) -> bool {
        let mut inner = self.inner.lock();

        let queue = match inner.queues.get_mut(&rid) {
            Some(queue) => queue,
            None => return false,
        };

        let pos = match queue.requests.iter().position(|r| r.txn_id == txn.id()) {
            Some(pos) => pos,
            None => return false,
        };
        let request = match queue.requests.remove(pos) {
            Some(request) => request,
            None => return false,
        };

        txn.remove_shared_lock(rid);
        txn.remove_exclusive_lock(rid);

        let keeps_growing = request.mode == LockMode::Shared
            && txn.isolation_level() == IsolationLevel::ReadCommitted;
        if !keeps_growing && txn.state() == TransactionState::Growing {
            txn.set_state(TransactionState::Shrinking);
        }

        match request.mode {
            LockMode::Shared => {
                if request.granted {
                    queue.sharing_count -= 1;
                    if queue.sharing_count == 0 {
                        queue.cv.notify_all();
                    }
                }
            }
            LockMode::Exclusive => {
                if request.granted {
                    queue.is_writing = false;
                }
                queue.cv.notify_all();
            }
        }

        true
    }

    /// Drop the registry entry once the transaction has finished.
    pub(crate) fn forget_txn(&self, txn_id: TxnId) {
        self.inner.lock().txns.remove(&txn_id);
    }

    /// Rules common to every acquisition: refuse locks in the shrinking
    /// phase and make sure the queue and registry entries exist.
    fn lock_prepare(
        &self,
        inner: &mut LockTable,
        txn: &Arc<Transaction>,
        rid: Rid,
    ) -> Result<(), TransactionAbortError> {
        if txn.state() == TransactionState::Shrinking {
            txn.set_state(TransactionState::Aborted);
            return Err(TransactionAbortError::new(
                txn.id(),
                AbortReason::LockOnShrinking,
            ));
        }
        inner.txns.insert(txn.id(), txn.clone());
        inner.queues.entry(rid).or_insert_with(LockRequestQueue::new);
        Ok(())
    }

    /// Wound-wait: abort every younger granted holder in the queue and
    /// clear its contribution. Wounded holders are pulled from the queue
    /// and their lock sets so abort teardown does not release them twice.
    fn wound_younger(
        queue: &mut LockRequestQueue,
        txns: &HashMap<TxnId, Arc<Transaction>>,
        waiter_id: TxnId,
        rid: Rid,
    ) {
        let mut wounded = false;
        let mut i = 0;
        while i < queue.requests.len() {
            let (victim_id, mode, granted) = {
                let r = &queue.requests[i];
                (r.txn_id, r.mode, r.granted)
            };
            if granted && victim_id > waiter_id {
                queue.requests.remove(i);
                if let Some(victim) = txns.get(&victim_id) {
                    victim.set_state(TransactionState::Aborted);
                    match mode {
                        LockMode::Shared => victim.remove_shared_lock(rid),
                        LockMode::Exclusive => victim.remove_exclusive_lock(rid),
                    }
                }
                match mode {
                    LockMode::Shared => {
                        queue.sharing_count = queue.sharing_count.saturating_sub(1);
                    }
                    LockMode::Exclusive => queue.is_writing = false,
                }
                warn!("wound-wait: txn {} wounds txn {}", waiter_id, victim_id);
                wounded = true;
            } else {
                i += 1;
            }
        }
        if wounded {
            queue.cv.notify_all();
        }
    }

    fn remove_request(inner: &mut LockTable, rid: Rid, txn_id: TxnId) {
        if let Some(queue) = inner.queues.get_mut(&rid) {
            if let Some(pos) = queue.requests.iter().position(|r| r.txn_id == txn_id) {
                queue.requests.remove(pos);
            }
        }
    }
}
