use std::sync::Arc;
use thiserror::Error;

use crate::common::types::{PageId, Rid};
use crate::storage::buffer::{BufferPoolError, PagePool};
use crate::storage::page::{PageError, PageManager};

#[derive(Error, Debug)]
pub enum TableError {
    #[error("Page error: {0}")]
    Page(#[from] PageError),

    #[error("Buffer pool error: {0}")]
    BufferPool(#[from] BufferPoolError),
}

/// Heap of variable-length records stored in a chain of slotted pages.
/// Pages are linked through their header's next-page pointer; records
/// never move between pages, so a RID stays valid until the record is
/// deleted.
pub struct TableHeap {
    buffer_pool: Arc<dyn PagePool>,
    page_manager: PageManager,
    first_page_id: PageId,
}

impl TableHeap {
    /// Create a heap with a single empty page.
    pub fn create(buffer_pool: Arc<dyn PagePool>) -> Result<Self, TableError> {
        let (page, page_id) = buffer_pool.new_page()?;
        let page_manager = PageManager::new();
        {
            let mut page_guard = page.write();
            page_manager.init_page(&mut page_guard);
        }
        buffer_pool.unpin_page(page_id, true)?;

        Ok(Self {
            buffer_pool,
            page_manager,
            first_page_id: page_id,
        })
    }

    /// Open an existing heap rooted at `first_page_id`.
    pub fn open(buffer_pool: Arc<dyn PagePool>, first_page_id: PageId) -> Self {
        Self {
            buffer_pool,
            page_manager: PageManager::new(),
            first_page_id,
        }
    }

    pub fn first_page_id(&self) -> PageId {
        self.first_page_id
    }

    /// Insert a record, walking the page chain and appending a fresh page
    /// when no existing page has room.
    pub fn insert_tuple(&self, data: &[u8]) -> Result<Rid, TableError> {
        let mut page_id = self.first_page_id;

        loop {
            let page = self.buffer_pool.fetch_page(page_id)?;

            let insert_result;
            let next_page_id;
            {
                let mut page_guard = page.write();
                insert_result = self.page_manager.insert_record(&mut page_guard, data);
                next_page_id = self.page_manager.next_page_id(&page_guard);
            }

            match insert_result {
                Ok(slot) => {
                    self.buffer_pool.unpin_page(page_id, true)?;
                    return Ok(Rid::new(page_id, slot));
                }
                Err(PageError::InsufficientSpace) => match next_page_id {
                    Some(next) => {
                        self.buffer_pool.unpin_page(page_id, false)?;
                        page_id = next;
                    }
                    None => {
                        let (new_page, new_page_id) = self.buffer_pool.new_page()?;
                        {
                            let mut new_guard = new_page.write();
                            self.page_manager.init_page(&mut new_guard);
                        }
                        {
                            let mut page_guard = page.write();
                            self.page_manager
                                .set_next_page_id(&mut page_guard, Some(new_page_id));
                        }
                        self.buffer_pool.unpin_page(page_id, true)?;
                        self.buffer_pool.unpin_page(new_page_id, true)?;
                        page_id = new_page_id;
                    }
                },
                Err(e) => {
                    self.buffer_pool.unpin_page(page_id, false)?;
                    return Err(e.into());
                }
            }
        }
    }

    pub fn get_tuple(&self, rid: Rid) -> Result<Vec<u8>, TableError> {
        let page = self.buffer_pool.fetch_page(rid.page_id)?;
        let result = {
            let page_guard = page.read();
            self.page_manager.get_record(&page_guard, rid.slot)
        };
        self.buffer_pool.unpin_page(rid.page_id, false)?;
        Ok(result?)
    }

    pub fn update_tuple(&self, rid: Rid, data: &[u8]) -> Result<(), TableError> {
        let page = self.buffer_pool.fetch_page(rid.page_id)?;
        let result = {
            let mut page_guard = page.write();
            self.page_manager.update_record(&mut page_guard, rid.slot, data)
        };
        self.buffer_pool.unpin_page(rid.page_id, result.is_ok())?;
        Ok(result?)
    }

    /// Mark the record deleted; the slot stays so later RIDs keep their
    /// positions.
    pub fn mark_delete(&self, rid: Rid) -> Result<(), TableError> {
        let page = self.buffer_pool.fetch_page(rid.page_id)?;
        let result = {
            let mut page_guard = page.write();
            self.page_manager.delete_record(&mut page_guard, rid.slot)
        };
        self.buffer_pool.unpin_page(rid.page_id, result.is_ok())?;
        Ok(result?)
    }

    /// Iterate every live record in the heap.
    pub fn iter(&self) -> TableIterator {
        TableIterator {
            buffer_pool: self.buffer_pool.clone(),
            page_manager: PageManager::new(),
            current_page_id: Some(self.first_page_id),
            current_slot: 0,
        }
    }
}

/// Forward scan over a table heap, skipping deleted records.
pub struct TableIterator {
    buffer_pool: Arc<dyn PagePool>,
    page_manager: PageManager,
    current_page_id: Option<PageId>,
    current_slot: u32,
}

impl Iterator for TableIterator {
    type Item = Result<(Rid, Vec<u8>), TableError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let page_id = self.current_page_id?;

            let page = match self.buffer_pool.fetch_page(page_id) {
                Ok(page) => page,
                Err(e) => {
                    self.current_page_id = None;
                    return Some(Err(e.into()));
                }
            };

            let record_count;
            let next_page_id;
            let mut found = None;
            {
                let page_guard = page.read();
                record_count = self.page_manager.record_count(&page_guard);
                next_page_id = self.page_manager.next_page_id(&page_guard);

                while self.current_slot < record_count {
                    let slot = self.current_slot;
                    self.current_slot += 1;
                    match self.page_manager.get_record(&page_guard, slot) {
                        Ok(data) => {
                            found = Some((Rid::new(page_id, slot), data));
                            break;
                        }
                        Err(PageError::RecordNotFound) => continue, // deleted
                        Err(e) => {
                            drop(page_guard);
                            let _ = self.buffer_pool.unpin_page(page_id, false);
                            self.current_page_id = None;
                            return Some(Err(e.into()));
                        }
                    }
                }
            }

            if let Err(e) = self.buffer_pool.unpin_page(page_id, false) {
                self.current_page_id = None;
                return Some(Err(e.into()));
            }

            match found {
                Some(item) => return Some(Ok(item)),
                None => {
                    // Page exhausted, move down the chain
                    self.current_page_id = next_page_id;
                    self.current_slot = 0;
                }
            }
        }
    }
}
