use std::sync::Arc;
use parking_lot::Mutex;

use crate::common::types::{PageId, PagePtr};
use crate::storage::buffer::error::BufferPoolError;
use crate::storage::buffer::instance::BufferPoolInstance;
use crate::storage::buffer::replacer::ReplacerKind;
use crate::storage::buffer::PagePool;
use crate::storage::disk::DiskManager;

/// Sharded buffer pool: `num_instances` independently latched instances
/// over one disk manager. Pages are dispatched by `page_id % N`; new
/// pages are allocated round-robin across instances.
pub struct ParallelBufferPool {
    instances: Vec<Arc<BufferPoolInstance>>,
    next_instance: Mutex<usize>,
}

impl ParallelBufferPool {
    pub fn new(
        num_instances: usize,
        pool_size: usize,
        disk_manager: Arc<DiskManager>,
    ) -> Self {
        Self::with_replacer(num_instances, pool_size, disk_manager, ReplacerKind::Lru)
    }

    pub fn with_replacer(
        num_instances: usize,
        pool_size: usize,
        disk_manager: Arc<DiskManager>,
        replacer_kind: ReplacerKind,
    ) -> Self {
        assert!(num_instances > 0, "pool must have at least one instance");

        let instances = (0..num_instances)
            .map(|i| {
                Arc::new(BufferPoolInstance::with_sharding(
                    pool_size,
                    num_instances as u32,
                    i as u32,
                    disk_manager.clone(),
                    replacer_kind,
                ))
            })
            .collect();

        Self {
            instances,
            next_instance: Mutex::new(0),
        }
    }

    pub fn num_instances(&self) -> usize {
        self.instances.len()
    }

    /// Instance responsible for the given page id.
    fn instance_for(&self, page_id: PageId) -> &Arc<BufferPoolInstance> {
        &self.instances[page_id as usize % self.instances.len()]
    }
}

impl PagePool for ParallelBufferPool {
    fn fetch_page(&self, page_id: PageId) -> Result<PagePtr, BufferPoolError> {
        self.instance_for(page_id).fetch_page(page_id)
    }

    fn new_page(&self) -> Result<(PagePtr, PageId), BufferPoolError> {
        let start = *self.next_instance.lock();
        for offset in 0..self.instances.len() {
            let idx = (start + offset) % self.instances.len();
            match self.instances[idx].new_page() {
                Ok(result) => {
                    *self.next_instance.lock() = (idx + 1) % self.instances.len();
                    return Ok(result);
                }
                Err(BufferPoolError::BufferPoolFull) => continue,
                Err(e) => return Err(e),
            }
        }
        Err(BufferPoolError::BufferPoolFull)
    }

    fn unpin_page(&self, page_id: PageId, is_dirty: bool) -> Result<(), BufferPoolError> {
        self.instance_for(page_id).unpin_page(page_id, is_dirty)
    }

    fn flush_page(&self, page_id: PageId) -> Result<(), BufferPoolError> {
        self.instance_for(page_id).flush_page(page_id)
    }

    fn flush_all_pages(&self) -> Result<(), BufferPoolError> {
        for instance in &self.instances {
            instance.flush_all_pages()?;
        }
        Ok(())
    }

    fn delete_page(&self, page_id: PageId) -> Result<(), BufferPoolError> {
        self.instance_for(page_id).delete_page(page_id)
    }

    fn pool_size(&self) -> usize {
        self.instances.len() * self.instances[0].pool_size()
    }
}
