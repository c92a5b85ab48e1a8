use std::fmt;
use std::marker::PhantomData;
use byteorder::{ByteOrder, LittleEndian};

use crate::common::types::{Page, Rid, PAGE_SIZE};

/// Fixed-width on-page encoding for bucket slot keys and values.
pub trait SlotCodec: Copy + Eq + fmt::Debug + Send + Sync + 'static {
    const ENCODED_SIZE: usize;

    fn encode(&self, buf: &mut [u8]);
    fn decode(buf: &[u8]) -> Self;
}

impl SlotCodec for i32 {
    const ENCODED_SIZE: usize = 4;

    fn encode(&self, buf: &mut [u8]) {
        LittleEndian::write_i32(buf, *self);
    }

    fn decode(buf: &[u8]) -> Self {
        LittleEndian::read_i32(buf)
    }
}

impl SlotCodec for i64 {
    const ENCODED_SIZE: usize = 8;

    fn encode(&self, buf: &mut [u8]) {
        LittleEndian::write_i64(buf, *self);
    }

    fn decode(buf: &[u8]) -> Self {
        LittleEndian::read_i64(buf)
    }
}

impl SlotCodec for u32 {
    const ENCODED_SIZE: usize = 4;

    fn encode(&self, buf: &mut [u8]) {
        LittleEndian::write_u32(buf, *self);
    }

    fn decode(buf: &[u8]) -> Self {
        LittleEndian::read_u32(buf)
    }
}

impl SlotCodec for Rid {
    const ENCODED_SIZE: usize = 8;

    fn encode(&self, buf: &mut [u8]) {
        LittleEndian::write_u32(&mut buf[0..4], self.page_id);
        LittleEndian::write_u32(&mut buf[4..8], self.slot);
    }

    fn decode(buf: &[u8]) -> Self {
        Rid::new(
            LittleEndian::read_u32(&buf[0..4]),
            LittleEndian::read_u32(&buf[4..8]),
        )
    }
}

/// Largest slot count such that both bitmaps plus the slot array fit in a
/// page: `2 * ceil(c / 8) + c * slot_size <= PAGE_SIZE`.
pub fn bucket_capacity(slot_size: usize) -> usize {
    let mut c = (PAGE_SIZE * 8) / (slot_size * 8 + 2);
    while 2 * ((c + 7) / 8) + c * slot_size > PAGE_SIZE {
        c -= 1;
    }
    c
}

/// Codec for bucket pages, layout:
/// `[occupied bitmap][readable bitmap][slot array of (key, value)]`.
/// The occupied bit sticks once set (tombstone for probing); the readable
/// bit is the authoritative liveness bit.
pub struct HashBucketPage<K, V> {
    capacity: usize,
    _marker: PhantomData<(K, V)>,
}

impl<K: SlotCodec, V: SlotCodec> Default for HashBucketPage<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: SlotCodec, V: SlotCodec> HashBucketPage<K, V> {
    pub fn new() -> Self {
        Self::with_capacity(bucket_capacity(K::ENCODED_SIZE + V::ENCODED_SIZE))
    }

    /// Smaller capacities force splits early; used by tests.
    pub fn with_capacity(capacity: usize) -> Self {
        let slot_size = K::ENCODED_SIZE + V::ENCODED_SIZE;
        assert!(capacity > 0, "bucket capacity must be positive");
        assert!(
            2 * ((capacity + 7) / 8) + capacity * slot_size <= PAGE_SIZE,
            "bucket layout does not fit in a page"
        );
        Self {
            capacity,
            _marker: PhantomData,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn bitmap_bytes(&self) -> usize {
        (self.capacity + 7) / 8
    }

    fn readable_offset(&self) -> usize {
        self.bitmap_bytes()
    }

    fn slots_offset(&self) -> usize {
        2 * self.bitmap_bytes()
    }

    fn slot_size(&self) -> usize {
        K::ENCODED_SIZE + V::ENCODED_SIZE
    }

    pub fn is_occupied(&self, page: &Page, idx: usize) -> bool {
        (page.data[idx / 8] >> (idx % 8)) & 1 != 0
    }

    fn set_occupied(&self, page: &mut Page, idx: usize) {
        page.data[idx / 8] |= 1 << (idx % 8);
    }

    pub fn is_readable(&self, page: &Page, idx: usize) -> bool {
        (page.data[self.readable_offset() + idx / 8] >> (idx % 8)) & 1 != 0
    }

    fn set_readable(&self, page: &mut Page, idx: usize) {
        let off = self.readable_offset();
        page.data[off + idx / 8] |= 1 << (idx % 8);
    }

    fn clear_readable(&self, page: &mut Page, idx: usize) {
        let off = self.readable_offset();
        page.data[off + idx / 8] &= !(1 << (idx % 8));
    }

    fn slot_at(&self, page: &Page, idx: usize) -> (K, V) {
        let start = self.slots_offset() + idx * self.slot_size();
        let key = K::decode(&page.data[start..start + K::ENCODED_SIZE]);
        let value = V::decode(
            &page.data[start + K::ENCODED_SIZE..start + K::ENCODED_SIZE + V::ENCODED_SIZE],
        );
        (key, value)
    }

    fn put_slot(&self, page: &mut Page, idx: usize, key: &K, value: &V) {
        let start = self.slots_offset() + idx * self.slot_size();
        key.encode(&mut page.data[start..start + K::ENCODED_SIZE]);
        value.encode(
            &mut page.data[start + K::ENCODED_SIZE..start + K::ENCODED_SIZE + V::ENCODED_SIZE],
        );
    }

    /// Insert a pair into the first non-readable slot. Rejects an exact
    /// `(key, value)` duplicate; returns false when full or duplicate.
    pub fn insert(&self, page: &mut Page, key: &K, value: &V) -> bool {
        let mut available = None;
        for i in 0..self.capacity {
            if self.is_readable(page, i) {
                let (k, v) = self.slot_at(page, i);
                if k == *key && v == *value {
                    return false;
                }
            } else if available.is_none() {
                available = Some(i);
            }
        }

        let idx = match available {
            Some(idx) => idx,
            None => return false,
        };

        self.put_slot(page, idx, key, value);
        self.set_occupied(page, idx);
        self.set_readable(page, idx);
        true
    }

    /// Remove the first slot matching the pair. Only the readable bit is
    /// cleared; the occupied bit remains as a tombstone.
    pub fn remove(&self, page: &mut Page, key: &K, value: &V) -> bool {
        for i in 0..self.capacity {
            if self.is_readable(page, i) {
                let (k, v) = self.slot_at(page, i);
                if k == *key && v == *value {
                    self.clear_readable(page, i);
                    self.set_occupied(page, i);
                    return true;
                }
            }
        }
        false
    }

    /// Collect every value stored under the key.
    pub fn get_value(&self, page: &Page, key: &K) -> Vec<V> {
        let mut result = Vec::new();
        for i in 0..self.capacity {
            if self.is_readable(page, i) {
                let (k, v) = self.slot_at(page, i);
                if k == *key {
                    result.push(v);
                }
            }
        }
        result
    }

    pub fn num_readable(&self, page: &Page) -> usize {
        (0..self.capacity)
            .filter(|&i| self.is_readable(page, i))
            .count()
    }

    pub fn is_full(&self, page: &Page) -> bool {
        (0..self.capacity).all(|i| self.is_readable(page, i))
    }

    pub fn is_empty(&self, page: &Page) -> bool {
        (0..self.capacity).all(|i| !self.is_readable(page, i))
    }

    /// Snapshot of the live pairs, used while rehashing a split.
    pub fn copy_all(&self, page: &Page) -> Vec<(K, V)> {
        (0..self.capacity)
            .filter(|&i| self.is_readable(page, i))
            .map(|i| self.slot_at(page, i))
            .collect()
    }

    /// Zero both bitmaps and the slot array.
    pub fn reset(&self, page: &mut Page) {
        let end = self.slots_offset() + self.capacity * self.slot_size();
        page.data[..end].fill(0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::types::Page;

    fn bucket() -> (HashBucketPage<i64, Rid>, Page) {
        (HashBucketPage::new(), Page::new(1))
    }

    #[test]
    fn test_capacity_fits_page() {
        let cap = bucket_capacity(16);
        assert!(2 * ((cap + 7) / 8) + cap * 16 <= PAGE_SIZE);
        // One more slot must not fit
        let next = cap + 1;
        assert!(2 * ((next + 7) / 8) + next * 16 > PAGE_SIZE);
    }

    #[test]
    fn test_insert_get_remove() {
        let (bucket, mut page) = bucket();
        let rid = Rid::new(4, 2);

        assert!(bucket.insert(&mut page, &10, &rid));
        assert_eq!(bucket.get_value(&page, &10), vec![rid]);

        assert!(bucket.remove(&mut page, &10, &rid));
        assert!(bucket.get_value(&page, &10).is_empty());
        // Tombstone: occupied bit survives the remove
        assert!(bucket.is_occupied(&page, 0));
        assert!(!bucket.is_readable(&page, 0));
    }

    #[test]
    fn test_duplicate_insert_rejected() {
        let (bucket, mut page) = bucket();
        let rid = Rid::new(4, 2);

        assert!(bucket.insert(&mut page, &10, &rid));
        assert!(!bucket.insert(&mut page, &10, &rid));
        assert_eq!(bucket.num_readable(&page), 1);

        // Same key, different value is a separate entry
        assert!(bucket.insert(&mut page, &10, &Rid::new(4, 3)));
        assert_eq!(bucket.get_value(&page, &10).len(), 2);
    }

    #[test]
    fn test_full_and_empty() {
        let bucket: HashBucketPage<i64, Rid> = HashBucketPage::with_capacity(3);
        let mut page = Page::new(1);

        assert!(bucket.is_empty(&page));
        for i in 0..3 {
            assert!(bucket.insert(&mut page, &(i as i64), &Rid::new(1, i)));
        }
        assert!(bucket.is_full(&page));
        assert!(!bucket.insert(&mut page, &99, &Rid::new(1, 9)));

        for i in 0..3 {
            assert!(bucket.remove(&mut page, &(i as i64), &Rid::new(1, i)));
        }
        assert!(bucket.is_empty(&page));
    }

    #[test]
    fn test_reset_clears_everything() {
        let (bucket, mut page) = bucket();
        bucket.insert(&mut page, &1, &Rid::new(1, 1));
        bucket.insert(&mut page, &2, &Rid::new(1, 2));

        bucket.reset(&mut page);
        assert!(bucket.is_empty(&page));
        assert!(!bucket.is_occupied(&page, 0));
        assert_eq!(bucket.copy_all(&page).len(), 0);
    }

    #[test]
    fn test_copy_all_skips_removed() {
        let (bucket, mut page) = bucket();
        bucket.insert(&mut page, &1, &Rid::new(1, 1));
        bucket.insert(&mut page, &2, &Rid::new(1, 2));
        bucket.insert(&mut page, &3, &Rid::new(1, 3));
        bucket.remove(&mut page, &2, &Rid::new(1, 2));

        let pairs = bucket.copy_all(&page);
        assert_eq!(pairs.len(), 2);
        assert!(pairs.contains(&(1, Rid::new(1, 1))));
        assert!(pairs.contains(&(3, Rid::new(1, 3))));
    }
}
