use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use log::debug;
use parking_lot::{Mutex, RwLock};

use crate::common::types::{Frame, FrameId, FramePtr, Page, PageId, PagePtr, INVALID_PAGE_ID};
use crate::storage::buffer::error::BufferPoolError;
use crate::storage::buffer::replacer::{build_replacer, Replacer, ReplacerKind};
use crate::storage::buffer::PagePool;
use crate::storage::disk::DiskManager;

/// One buffer pool shard. Owns `pool_size` frames, a page table, a free
/// list and a replacer. Page ids are allocated in strides of
/// `num_instances` so that `page_id % num_instances == instance_index`
/// always holds for pages owned by this shard.
pub struct BufferPoolInstance {
    pool_size: usize,
    num_instances: u32,
    instance_index: u32,
    frames: Vec<FramePtr>,
    state: Mutex<PoolState>,
    replacer: Box<dyn Replacer>,
    disk_manager: Arc<DiskManager>,
}

struct PoolState {
    page_table: HashMap<PageId, FrameId>,
    free_list: VecDeque<FrameId>,
    next_page_id: PageId,
}

impl BufferPoolInstance {
    /// Stand-alone pool covering the whole page-id space.
    pub fn new(pool_size: usize, disk_manager: Arc<DiskManager>) -> Self {
        Self::with_sharding(pool_size, 1, 0, disk_manager, ReplacerKind::Lru)
    }

    /// Pool shard `instance_index` of `num_instances`.
    pub fn with_sharding(
        pool_size: usize,
        num_instances: u32,
        instance_index: u32,
        disk_manager: Arc<DiskManager>,
        replacer_kind: ReplacerKind,
    ) -> Self {
        assert!(num_instances > 0, "pool must have at least one instance");
        assert!(
            instance_index < num_instances,
            "instance index {} out of range for {} instances",
            instance_index,
            num_instances
        );

        let mut frames = Vec::with_capacity(pool_size);
        let mut free_list = VecDeque::with_capacity(pool_size);
        for i in 0..pool_size {
            let frame_id = i as FrameId;
            let page = Arc::new(RwLock::new(Page::new(INVALID_PAGE_ID)));
            frames.push(Arc::new(RwLock::new(Frame::new(frame_id, page))));
            free_list.push_back(frame_id);
        }

        // Instance 0 starts one stride in so page 0 is never handed out.
        let next_page_id = if instance_index == 0 {
            num_instances
        } else {
            instance_index
        };

        Self {
            pool_size,
            num_instances,
            instance_index,
            frames,
            state: Mutex::new(PoolState {
                page_table: HashMap::new(),
                free_list,
                next_page_id,
            }),
            replacer: build_replacer(replacer_kind, pool_size),
            disk_manager,
        }
    }

    pub fn instance_index(&self) -> u32 {
        self.instance_index
    }

    /// Fetch a page from the buffer pool or disk
    pub fn fetch_page(&self, page_id: PageId) -> Result<PagePtr, BufferPoolError> {
        if page_id == INVALID_PAGE_ID {
            return Err(BufferPoolError::InvalidOperation(
                "Cannot fetch invalid page ID".to_string(),
            ));
        }

        let mut state = self.state.lock();

        if let Some(&frame_id) = state.page_table.get(&page_id) {
            let mut frame = self.frames[frame_id as usize].write();
            frame.pin_count += 1;
            self.replacer.pin(frame_id);
            return Ok(frame.page.clone());
        }

        let frame_id = self.take_victim_frame(&mut state)?;

        let page_ptr;
        {
            let mut frame = self.frames[frame_id as usize].write();
            {
                let mut page = frame.page.write();
                if let Err(e) = self.disk_manager.read_page(page_id, &mut page) {
                    drop(page);
                    drop(frame);
                    state.free_list.push_back(frame_id);
                    return Err(e.into());
                }
            }
            frame.pin_count = 1;
            frame.is_dirty = false;
            page_ptr = frame.page.clone();
        }

        state.page_table.insert(page_id, frame_id);
        self.replacer.pin(frame_id);
        Ok(page_ptr)
    }

    /// Create a new zeroed page, pinned in the pool
    pub fn new_page(&self) -> Result<(PagePtr, PageId), BufferPoolError> {
        let mut state = self.state.lock();

        let frame_id = self.take_victim_frame(&mut state)?;

        // Allocate the id only after a frame is secured so a full pool
        // does not burn page ids.
        let page_id = state.next_page_id;
        state.next_page_id += self.num_instances;
        debug_assert_eq!(page_id % self.num_instances, self.instance_index);

        let page_ptr;
        {
            let mut frame = self.frames[frame_id as usize].write();
            {
                let mut page = frame.page.write();
                *page = Page::new(page_id);
            }
            frame.pin_count = 1;
            frame.is_dirty = false;
            page_ptr = frame.page.clone();
        }

        state.page_table.insert(page_id, frame_id);
        self.replacer.pin(frame_id);
        Ok((page_ptr, page_id))
    }

    /// Unpin a page, ORing the caller's dirty flag into the frame
    pub fn unpin_page(&self, page_id: PageId, is_dirty: bool) -> Result<(), BufferPoolError> {
        let state = self.state.lock();

        let frame_id = match state.page_table.get(&page_id) {
            Some(&id) => id,
            None => return Err(BufferPoolError::PageNotFound(page_id)),
        };

        let mut frame = self.frames[frame_id as usize].write();
        if frame.pin_count == 0 {
            return Err(BufferPoolError::PageNotPinned(page_id));
        }

        if is_dirty {
            frame.is_dirty = true;
        }

        frame.pin_count -= 1;
        if frame.pin_count == 0 {
            self.replacer.unpin(frame_id);
        }

        Ok(())
    }

    /// Flush a specific page to disk, unconditionally
    pub fn flush_page(&self, page_id: PageId) -> Result<(), BufferPoolError> {
        if page_id == INVALID_PAGE_ID {
            return Err(BufferPoolError::InvalidOperation(
                "Cannot flush invalid page ID".to_string(),
            ));
        }

        let state = self.state.lock();
        let frame_id = match state.page_table.get(&page_id) {
            Some(&id) => id,
            None => return Err(BufferPoolError::PageNotFound(page_id)),
        };

        self.flush_frame(frame_id)
    }

    /// Flush all pages in the buffer pool to disk
    pub fn flush_all_pages(&self) -> Result<(), BufferPoolError> {
        let state = self.state.lock();
        for &frame_id in state.page_table.values() {
            self.flush_frame(frame_id)?;
        }
        Ok(())
    }

    /// Delete a page from the buffer pool and release its disk space
    pub fn delete_page(&self, page_id: PageId) -> Result<(), BufferPoolError> {
        let mut state = self.state.lock();

        let frame_id = match state.page_table.get(&page_id) {
            Some(&id) => id,
            None => return Ok(()), // not resident, nothing to do
        };

        {
            let mut frame = self.frames[frame_id as usize].write();
            if frame.pin_count > 0 {
                return Err(BufferPoolError::PagePinned(page_id));
            }

            {
                let mut page = frame.page.write();
                *page = Page::new(INVALID_PAGE_ID);
            }
            frame.is_dirty = false;
            frame.pin_count = 0;
        }

        state.page_table.remove(&page_id);
        self.replacer.pin(frame_id);
        state.free_list.push_back(frame_id);
        self.disk_manager.deallocate_page(page_id);

        Ok(())
    }

    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    /// Write one frame's page out and clear its dirty bit. The dirty bit
    /// is cleared only after the write succeeded.
    fn flush_frame(&self, frame_id: FrameId) -> Result<(), BufferPoolError> {
        let mut frame = self.frames[frame_id as usize].write();
        {
            let page = frame.page.read();
            self.disk_manager.write_page(&page)?;
        }
        frame.is_dirty = false;
        Ok(())
    }

    /// Secure a frame for a new resident page: free list first, then a
    /// replacer victim whose old contents are written back when dirty and
    /// whose old mapping is removed.
    fn take_victim_frame(&self, state: &mut PoolState) -> Result<FrameId, BufferPoolError> {
        if let Some(frame_id) = state.free_list.pop_front() {
            return Ok(frame_id);
        }

        let frame_id = match self.replacer.victim() {
            Some(id) => id,
            None => return Err(BufferPoolError::BufferPoolFull),
        };

        let old_page_id;
        {
            let mut frame = self.frames[frame_id as usize].write();
            debug_assert_eq!(frame.pin_count, 0, "replacer produced a pinned frame");

            old_page_id = frame.page.read().page_id;
            if frame.is_dirty {
                let write_result = {
                    let page = frame.page.read();
                    self.disk_manager.write_page(&page)
                };
                if let Err(e) = write_result {
                    // The frame stays dirty; put it back in circulation.
                    drop(frame);
                    self.replacer.unpin(frame_id);
                    return Err(e.into());
                }
                frame.is_dirty = false;
            }
        }

        if old_page_id != INVALID_PAGE_ID {
            debug!("evicting page {} from frame {}", old_page_id, frame_id);
            state.page_table.remove(&old_page_id);
        }

        Ok(frame_id)
    }
}

impl PagePool for BufferPoolInstance {
    fn fetch_page(&self, page_id: PageId) -> Result<PagePtr, BufferPoolError> {
        BufferPoolInstance::fetch_page(self, page_id)
    }

    fn new_page(&self) -> Result<(PagePtr, PageId), BufferPoolError> {
        BufferPoolInstance::new_page(self)
    }

    fn unpin_page(&self, page_id: PageId, is_dirty: bool) -> Result<(), BufferPoolError> {
        BufferPoolInstance::unpin_page(self, page_id, is_dirty)
    }

    fn flush_page(&self, page_id: PageId) -> Result<(), BufferPoolError> {
        BufferPoolInstance::flush_page(self, page_id)
    }

    fn flush_all_pages(&self) -> Result<(), BufferPoolError> {
        BufferPoolInstance::flush_all_pages(self)
    }

    fn delete_page(&self, page_id: PageId) -> Result<(), BufferPoolError> {
        BufferPoolInstance::delete_page(self, page_id)
    }

    fn pool_size(&self) -> usize {
        BufferPoolInstance::pool_size(self)
    }
}
