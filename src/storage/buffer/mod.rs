pub mod error;
pub mod instance;
pub mod parallel;
pub mod replacer;

pub use error::BufferPoolError;
pub use instance::BufferPoolInstance;
pub use parallel::ParallelBufferPool;
pub use replacer::{Replacer, ReplacerKind};

use crate::common::types::{PageId, PagePtr};

/// Common surface of a buffer pool. Implemented by both the single
/// instance and the sharded parallel façade so the index, table heap and
/// executors never observe which one they hold.
pub trait PagePool: Send + Sync {
    /// Fetch the page, pinning it. The returned handle stays valid until
    /// the matching `unpin_page`.
    fn fetch_page(&self, page_id: PageId) -> Result<PagePtr, BufferPoolError>;

    /// Allocate a fresh page, pinned and zeroed.
    fn new_page(&self) -> Result<(PagePtr, PageId), BufferPoolError>;

    /// Drop one pin, ORing the caller's dirty flag into the frame.
    fn unpin_page(&self, page_id: PageId, is_dirty: bool) -> Result<(), BufferPoolError>;

    /// Write the page back to disk and clear its dirty bit.
    fn flush_page(&self, page_id: PageId) -> Result<(), BufferPoolError>;

    /// Flush every resident page.
    fn flush_all_pages(&self) -> Result<(), BufferPoolError>;

    /// Drop the page from the pool and release its disk space.
    fn delete_page(&self, page_id: PageId) -> Result<(), BufferPoolError>;

    /// Total number of frames managed.
    fn pool_size(&self) -> usize;
}
