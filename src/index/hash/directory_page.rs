use std::collections::HashMap;
use byteorder::{ByteOrder, LittleEndian};

use crate::common::types::{Page, PageId, INVALID_PAGE_ID};

/// Maximum number of hash bits the directory can use.
pub const MAX_DEPTH: u32 = 9;

/// Number of directory entries backed by the page layout.
pub const DIRECTORY_ARRAY_SIZE: usize = 1 << MAX_DEPTH;

const PAGE_ID_OFFSET: usize = 0;
const LSN_OFFSET: usize = 4;
const GLOBAL_DEPTH_OFFSET: usize = 8;
const LOCAL_DEPTHS_OFFSET: usize = 12;
const BUCKET_PAGE_IDS_OFFSET: usize = LOCAL_DEPTHS_OFFSET + DIRECTORY_ARRAY_SIZE;

/// Directory page of the extendible hash table, layout:
/// `[page_id: 4][lsn: 4][global_depth: 4][local_depths: 512][bucket_page_ids: 512 x 4]`.
#[derive(Debug, Clone)]
pub struct HashDirectoryPage {
    page_id: PageId,
    lsn: u32,
    global_depth: u32,
    local_depths: [u8; DIRECTORY_ARRAY_SIZE],
    bucket_page_ids: [PageId; DIRECTORY_ARRAY_SIZE],
}

impl HashDirectoryPage {
    pub fn new(page_id: PageId) -> Self {
        Self {
            page_id,
            lsn: 0,
            global_depth: 0,
            local_depths: [0; DIRECTORY_ARRAY_SIZE],
            bucket_page_ids: [INVALID_PAGE_ID; DIRECTORY_ARRAY_SIZE],
        }
    }

    // Serialize the directory into page bytes
    pub fn write_to(&self, page: &mut Page) {
        LittleEndian::write_u32(&mut page.data[PAGE_ID_OFFSET..PAGE_ID_OFFSET + 4], self.page_id);
        LittleEndian::write_u32(&mut page.data[LSN_OFFSET..LSN_OFFSET + 4], self.lsn);
        LittleEndian::write_u32(
            &mut page.data[GLOBAL_DEPTH_OFFSET..GLOBAL_DEPTH_OFFSET + 4],
            self.global_depth,
        );
        page.data[LOCAL_DEPTHS_OFFSET..LOCAL_DEPTHS_OFFSET + DIRECTORY_ARRAY_SIZE]
            .copy_from_slice(&self.local_depths);
        for (i, &bucket_page_id) in self.bucket_page_ids.iter().enumerate() {
            let off = BUCKET_PAGE_IDS_OFFSET + i * 4;
            LittleEndian::write_u32(&mut page.data[off..off + 4], bucket_page_id);
        }
    }

    // Deserialize the directory from page bytes
    pub fn from_page(page: &Page) -> Self {
        let page_id = LittleEndian::read_u32(&page.data[PAGE_ID_OFFSET..PAGE_ID_OFFSET + 4]);
        let lsn = LittleEndian::read_u32(&page.data[LSN_OFFSET..LSN_OFFSET + 4]);
        let global_depth =
            LittleEndian::read_u32(&page.data[GLOBAL_DEPTH_OFFSET..GLOBAL_DEPTH_OFFSET + 4]);

        let mut local_depths = [0u8; DIRECTORY_ARRAY_SIZE];
        local_depths
            .copy_from_slice(&page.data[LOCAL_DEPTHS_OFFSET..LOCAL_DEPTHS_OFFSET + DIRECTORY_ARRAY_SIZE]);

        let mut bucket_page_ids = [INVALID_PAGE_ID; DIRECTORY_ARRAY_SIZE];
        for (i, bucket_page_id) in bucket_page_ids.iter_mut().enumerate() {
            let off = BUCKET_PAGE_IDS_OFFSET + i * 4;
            *bucket_page_id = LittleEndian::read_u32(&page.data[off..off + 4]);
        }

        Self {
            page_id,
            lsn,
            global_depth,
            local_depths,
            bucket_page_ids,
        }
    }

    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    pub fn global_depth(&self) -> u32 {
        self.global_depth
    }

    pub fn global_depth_mask(&self) -> u32 {
        (1 << self.global_depth) - 1
    }

    /// Number of active directory entries.
    pub fn size(&self) -> usize {
        1 << self.global_depth
    }

    pub fn local_depth(&self, idx: usize) -> u32 {
        self.local_depths[idx] as u32
    }

    pub fn set_local_depth(&mut self, idx: usize, depth: u32) {
        debug_assert!(depth <= MAX_DEPTH);
        self.local_depths[idx] = depth as u8;
    }

    pub fn incr_local_depth(&mut self, idx: usize) {
        self.local_depths[idx] += 1;
    }

    pub fn decr_local_depth(&mut self, idx: usize) {
        self.local_depths[idx] -= 1;
    }

    pub fn bucket_page_id(&self, idx: usize) -> PageId {
        self.bucket_page_ids[idx]
    }

    pub fn set_bucket_page_id(&mut self, idx: usize, page_id: PageId) {
        self.bucket_page_ids[idx] = page_id;
    }

    /// Peer entry of `idx` at its current local depth: the index that
    /// differs only in the highest depth bit.
    pub fn split_image_index(&self, idx: usize) -> usize {
        let depth = self.local_depth(idx);
        debug_assert!(depth > 0, "depth-0 bucket has no split image");
        idx ^ (1 << (depth - 1))
    }

    /// Double the directory by duplicating the active half.
    pub fn incr_global_depth(&mut self) {
        assert!(self.global_depth < MAX_DEPTH, "directory is at maximum depth");
        let old_size = self.size();
        for i in 0..old_size {
            self.bucket_page_ids[i + old_size] = self.bucket_page_ids[i];
            self.local_depths[i + old_size] = self.local_depths[i];
        }
        self.global_depth += 1;
    }

    pub fn decr_global_depth(&mut self) {
        assert!(self.global_depth > 0, "directory is already at depth 0");
        self.global_depth -= 1;
    }

    /// The directory can halve when every active entry uses fewer bits
    /// than the directory does.
    pub fn can_shrink(&self) -> bool {
        if self.global_depth == 0 {
            return false;
        }
        (0..self.size()).all(|i| self.local_depth(i) < self.global_depth)
    }

    /// Structural invariants:
    /// - each distinct bucket page is referenced by exactly
    ///   `1 << (global_depth - local_depth)` entries;
    /// - entries sharing a bucket page agree on local depth and on their
    ///   low `local_depth` index bits.
    pub fn verify_integrity(&self) {
        let mut entry_counts: HashMap<PageId, usize> = HashMap::new();
        let mut depths: HashMap<PageId, u32> = HashMap::new();
        let mut low_bits: HashMap<PageId, usize> = HashMap::new();

        for i in 0..self.size() {
            let bucket_page_id = self.bucket_page_ids[i];
            let depth = self.local_depth(i);
            assert!(
                depth <= self.global_depth,
                "local depth {} exceeds global depth {} at index {}",
                depth,
                self.global_depth,
                i
            );
            assert_ne!(
                bucket_page_id, INVALID_PAGE_ID,
                "active directory entry {} has no bucket page",
                i
            );

            *entry_counts.entry(bucket_page_id).or_insert(0) += 1;

            let mask = (1usize << depth) - 1;
            match depths.get(&bucket_page_id) {
                Some(&d) => assert_eq!(
                    d, depth,
                    "bucket page {} referenced with depths {} and {}",
                    bucket_page_id, d, depth
                ),
                None => {
                    depths.insert(bucket_page_id, depth);
                    low_bits.insert(bucket_page_id, i & mask);
                }
            }
            assert_eq!(
                low_bits[&bucket_page_id],
                i & mask,
                "bucket page {} aliased by indices with different low bits",
                bucket_page_id
            );
        }

        let mut total = 0usize;
        for (bucket_page_id, count) in &entry_counts {
            let expected = 1usize << (self.global_depth - depths[bucket_page_id]);
            assert_eq!(
                *count, expected,
                "bucket page {} referenced {} times, expected {}",
                bucket_page_id, count, expected
            );
            total += count;
        }
        assert_eq!(total, self.size());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::types::Page;

    #[test]
    fn test_page_round_trip() {
        let mut dir = HashDirectoryPage::new(5);
        dir.set_bucket_page_id(0, 11);
        dir.set_local_depth(0, 0);
        dir.incr_global_depth();
        dir.set_bucket_page_id(1, 12);
        dir.set_local_depth(0, 1);
        dir.set_local_depth(1, 1);

        let mut page = Page::new(5);
        dir.write_to(&mut page);
        let restored = HashDirectoryPage::from_page(&page);

        assert_eq!(restored.page_id(), 5);
        assert_eq!(restored.global_depth(), 1);
        assert_eq!(restored.bucket_page_id(0), 11);
        assert_eq!(restored.bucket_page_id(1), 12);
        assert_eq!(restored.local_depth(1), 1);
    }

    #[test]
    fn test_incr_global_depth_duplicates_active_half() {
        let mut dir = HashDirectoryPage::new(1);
        dir.set_bucket_page_id(0, 7);
        dir.set_local_depth(0, 0);

        dir.incr_global_depth();
        assert_eq!(dir.size(), 2);
        assert_eq!(dir.bucket_page_id(1), 7);
        assert_eq!(dir.local_depth(1), 0);
        assert_eq!(dir.global_depth_mask(), 0b1);
    }

    #[test]
    fn test_split_image_index() {
        let mut dir = HashDirectoryPage::new(1);
        dir.set_local_depth(2, 2);
        assert_eq!(dir.split_image_index(2), 0);
        dir.set_local_depth(1, 1);
        assert_eq!(dir.split_image_index(1), 0);
        dir.set_local_depth(5, 3);
        assert_eq!(dir.split_image_index(5), 1);
    }

    #[test]
    fn test_can_shrink() {
        let mut dir = HashDirectoryPage::new(1);
        dir.set_bucket_page_id(0, 2);
        assert!(!dir.can_shrink()); // depth 0 cannot shrink

        dir.incr_global_depth();
        assert!(dir.can_shrink()); // both entries still at depth 0

        dir.set_local_depth(0, 1);
        dir.set_local_depth(1, 1);
        dir.set_bucket_page_id(1, 3);
        assert!(!dir.can_shrink());
    }

    #[test]
    fn test_verify_integrity_accepts_split_directory() {
        let mut dir = HashDirectoryPage::new(1);
        dir.set_bucket_page_id(0, 2);
        dir.set_local_depth(0, 0);
        dir.incr_global_depth();
        dir.set_local_depth(0, 1);
        dir.set_local_depth(1, 1);
        dir.set_bucket_page_id(1, 3);
        dir.verify_integrity();

        dir.incr_global_depth();
        dir.verify_integrity();
    }
}
