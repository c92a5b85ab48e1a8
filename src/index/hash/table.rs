use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use parking_lot::RwLock;

use crate::common::types::PageId;
use crate::index::hash::bucket_page::{bucket_capacity, HashBucketPage, SlotCodec};
use crate::index::hash::directory_page::{HashDirectoryPage, MAX_DEPTH};
use crate::index::hash::error::HashIndexError;
use crate::storage::buffer::PagePool;

/// Downcast a 64-bit hash to the 32 bits extendible hashing routes on.
fn default_hash<K: Hash>(key: &K) -> u32 {
    let mut hasher = DefaultHasher::new();
    key.hash(&mut hasher);
    hasher.finish() as u32
}

/// Disk-backed extendible hash table. The directory and all bucket pages
/// live in the buffer pool; every fetch below is paired with an unpin on
/// every control-flow exit.
///
/// Lookups, inserts and removes hold the table latch shared; structural
/// changes (split, merge) re-acquire it exclusive and re-validate the
/// condition that triggered them, since the bucket may have changed
/// between the release and the upgrade.
pub struct ExtendibleHashTable<K, V> {
    buffer_pool: Arc<dyn PagePool>,
    directory_page_id: PageId,
    bucket_page: HashBucketPage<K, V>,
    hash_fn: fn(&K) -> u32,
    table_latch: RwLock<()>,
}

impl<K, V> ExtendibleHashTable<K, V>
where
    K: SlotCodec + Hash,
    V: SlotCodec,
{
    pub fn new(buffer_pool: Arc<dyn PagePool>) -> Result<Self, HashIndexError> {
        Self::with_config(
            buffer_pool,
            bucket_capacity(K::ENCODED_SIZE + V::ENCODED_SIZE),
            default_hash::<K>,
        )
    }

    /// Construct with an explicit bucket capacity and hash function.
    /// Tests use small capacities and an identity hash to force specific
    /// split patterns.
    pub fn with_config(
        buffer_pool: Arc<dyn PagePool>,
        bucket_capacity: usize,
        hash_fn: fn(&K) -> u32,
    ) -> Result<Self, HashIndexError> {
        let (directory_page, directory_page_id) = buffer_pool.new_page()?;
        let (_, bucket_page_id) = buffer_pool.new_page()?;

        let mut directory = HashDirectoryPage::new(directory_page_id);
        directory.set_bucket_page_id(0, bucket_page_id);
        directory.set_local_depth(0, 0);
        {
            let mut page = directory_page.write();
            directory.write_to(&mut page);
        }

        buffer_pool.unpin_page(directory_page_id, true)?;
        buffer_pool.unpin_page(bucket_page_id, true)?;

        Ok(Self {
            buffer_pool,
            directory_page_id,
            bucket_page: HashBucketPage::with_capacity(bucket_capacity),
            hash_fn,
            table_latch: RwLock::new(()),
        })
    }

    pub fn directory_page_id(&self) -> PageId {
        self.directory_page_id
    }

    fn hash(&self, key: &K) -> u32 {
        (self.hash_fn)(key)
    }

    /// Fetch the directory, copy it out and unpin. Safe because every
    /// structural change holds the table latch exclusively.
    fn load_directory(&self) -> Result<HashDirectoryPage, HashIndexError> {
        let page = self.buffer_pool.fetch_page(self.directory_page_id)?;
        let directory = {
            let page_guard = page.read();
            HashDirectoryPage::from_page(&page_guard)
        };
        self.buffer_pool.unpin_page(self.directory_page_id, false)?;
        Ok(directory)
    }

    fn bucket_index(&self, key: &K, directory: &HashDirectoryPage) -> usize {
        (self.hash(key) & directory.global_depth_mask()) as usize
    }

    /// Look up every value stored under the key.
    pub fn get_value(&self, key: &K) -> Result<Vec<V>, HashIndexError> {
        let _guard = self.table_latch.read();

        let directory = self.load_directory()?;
        let bucket_page_id = directory.bucket_page_id(self.bucket_index(key, &directory));

        let bucket = self.buffer_pool.fetch_page(bucket_page_id)?;
        let result = {
            let page_guard = bucket.read();
            self.bucket_page.get_value(&page_guard, key)
        };
        self.buffer_pool.unpin_page(bucket_page_id, false)?;

        Ok(result)
    }

    /// Insert a `(key, value)` pair. Returns false when the exact pair is
    /// already present. Splits the target bucket as needed.
    pub fn insert(&self, key: &K, value: &V) -> Result<bool, HashIndexError> {
        {
            let _guard = self.table_latch.read();

            let directory = self.load_directory()?;
            let bucket_page_id = directory.bucket_page_id(self.bucket_index(key, &directory));

            let bucket = self.buffer_pool.fetch_page(bucket_page_id)?;
            let (inserted, full) = {
                let mut page_guard = bucket.write();
                if self.bucket_page.is_full(&page_guard) {
                    (false, true)
                } else {
                    (self.bucket_page.insert(&mut page_guard, key, value), false)
                }
            };
            self.buffer_pool.unpin_page(bucket_page_id, inserted)?;

            if !full {
                return Ok(inserted);
            }
        }

        // Bucket was full: upgrade to the write latch and split.
        self.split_insert(key, value)
    }

    fn split_insert(&self, key: &K, value: &V) -> Result<bool, HashIndexError> {
        {
            let _guard = self.table_latch.write();

            let directory_page = self.buffer_pool.fetch_page(self.directory_page_id)?;
            let mut directory = {
                let page_guard = directory_page.read();
                HashDirectoryPage::from_page(&page_guard)
            };

            let bucket_idx = self.bucket_index(key, &directory);
            let bucket_page_id = directory.bucket_page_id(bucket_idx);
            let bucket = self.buffer_pool.fetch_page(bucket_page_id)?;

            let mut split_performed = false;
            let split_result = {
                let mut bucket_guard = bucket.write();
                if !self.bucket_page.is_full(&bucket_guard) {
                    // Lost the race: another insert made room. Retry below.
                    Ok(())
                } else if directory.local_depth(bucket_idx) == directory.global_depth()
                    && directory.global_depth() == MAX_DEPTH
                {
                    Err(HashIndexError::DirectoryFull)
                } else {
                    if directory.local_depth(bucket_idx) == directory.global_depth() {
                        directory.incr_global_depth();
                    }

                    directory.incr_local_depth(bucket_idx);
                    let new_depth = directory.local_depth(bucket_idx);
                    let split_idx = directory.split_image_index(bucket_idx);

                    // No `?` here: the bucket and directory pins below must
                    // be released even when allocation fails.
                    match self.buffer_pool.new_page() {
                        Ok((new_bucket, new_bucket_page_id)) => {
                            directory.set_bucket_page_id(split_idx, new_bucket_page_id);
                            directory.set_local_depth(split_idx, new_depth);

                            // Re-point every alias of the old bucket by low-bit match.
                            let mask = (1u32 << new_depth) - 1;
                            for j in 0..directory.size() {
                                if j == bucket_idx || j == split_idx {
                                    continue;
                                }
                                if directory.bucket_page_id(j) != bucket_page_id {
                                    continue;
                                }
                                directory.set_local_depth(j, new_depth);
                                if (j as u32 & mask) == (split_idx as u32 & mask) {
                                    directory.set_bucket_page_id(j, new_bucket_page_id);
                                }
                            }

                            // Redistribute the old bucket's pairs between the two.
                            let pairs = self.bucket_page.copy_all(&bucket_guard);
                            self.bucket_page.reset(&mut bucket_guard);
                            {
                                let mut new_guard = new_bucket.write();
                                for (k, v) in pairs {
                                    if (self.hash(&k) & mask) == (split_idx as u32 & mask) {
                                        self.bucket_page.insert(&mut new_guard, &k, &v);
                                    } else {
                                        self.bucket_page.insert(&mut bucket_guard, &k, &v);
                                    }
                                }
                            }

                            {
                                let mut page_guard = directory_page.write();
                                directory.write_to(&mut page_guard);
                            }
                            split_performed = true;
                            self.buffer_pool
                                .unpin_page(new_bucket_page_id, true)
                                .map_err(HashIndexError::from)
                        }
                        Err(e) => Err(HashIndexError::from(e)),
                    }
                }
            };

            self.buffer_pool.unpin_page(bucket_page_id, split_performed)?;
            self.buffer_pool
                .unpin_page(self.directory_page_id, split_performed)?;
            split_result?;
        }

        // Retry now that the target bucket has room (or was split).
        self.insert(key, value)
    }

    /// Remove a `(key, value)` pair. Triggers a merge pass when the
    /// bucket becomes empty.
    pub fn remove(&self, key: &K, value: &V) -> Result<bool, HashIndexError> {
        let (removed, empty) = {
            let _guard = self.table_latch.read();

            let directory = self.load_directory()?;
            let bucket_page_id = directory.bucket_page_id(self.bucket_index(key, &directory));

            let bucket = self.buffer_pool.fetch_page(bucket_page_id)?;
            let result = {
                let mut page_guard = bucket.write();
                let removed = self.bucket_page.remove(&mut page_guard, key, value);
                (removed, self.bucket_page.is_empty(&page_guard))
            };
            self.buffer_pool.unpin_page(bucket_page_id, result.0)?;
            result
        };

        if removed && empty {
            self.merge()?;
        }

        Ok(removed)
    }

    /// Fold every empty bucket into its split image, then shrink the
    /// directory while possible. Idempotent across repeated removals.
    fn merge(&self) -> Result<(), HashIndexError> {
        let _guard = self.table_latch.write();

        let directory_page = self.buffer_pool.fetch_page(self.directory_page_id)?;
        let mut directory = {
            let page_guard = directory_page.read();
            HashDirectoryPage::from_page(&page_guard)
        };

        let mut dirty = false;
        // Folding a pair can make an earlier pair mergeable, so the pass
        // repeats until it finds nothing left to fold.
        loop {
            let mut folded = false;
            let mut i = 0;
            while i < directory.size() {
                let local_depth = directory.local_depth(i);
                let bucket_page_id = directory.bucket_page_id(i);

                if local_depth > 0 {
                    let split_idx = directory.split_image_index(i);
                    let split_page_id = directory.bucket_page_id(split_idx);

                    if directory.local_depth(split_idx) == local_depth
                        && split_page_id != bucket_page_id
                    {
                        let bucket = self.buffer_pool.fetch_page(bucket_page_id)?;
                        let empty = {
                            let page_guard = bucket.read();
                            self.bucket_page.is_empty(&page_guard)
                        };
                        self.buffer_pool.unpin_page(bucket_page_id, false)?;

                        if empty {
                            directory.decr_local_depth(i);
                            directory.decr_local_depth(split_idx);
                            directory.set_bucket_page_id(i, split_page_id);
                            let new_depth = directory.local_depth(i);

                            // Every alias of either page follows the merge.
                            for j in 0..directory.size() {
                                if j == i || j == split_idx {
                                    continue;
                                }
                                let current = directory.bucket_page_id(j);
                                if current == bucket_page_id || current == split_page_id {
                                    directory.set_local_depth(j, new_depth);
                                    directory.set_bucket_page_id(j, split_page_id);
                                }
                            }

                            self.buffer_pool.delete_page(bucket_page_id)?;
                            dirty = true;
                            folded = true;
                        }
                    }
                }
                i += 1;
            }
            if !folded {
                break;
            }
        }

        while directory.can_shrink() {
            directory.decr_global_depth();
            dirty = true;
        }

        if dirty {
            let mut page_guard = directory_page.write();
            directory.write_to(&mut page_guard);
        }
        self.buffer_pool.unpin_page(self.directory_page_id, dirty)?;

        Ok(())
    }

    pub fn global_depth(&self) -> Result<u32, HashIndexError> {
        let _guard = self.table_latch.read();
        Ok(self.load_directory()?.global_depth())
    }

    /// Check the directory's structural invariants; panics on violation.
    pub fn verify_integrity(&self) -> Result<(), HashIndexError> {
        let _guard = self.table_latch.read();
        self.load_directory()?.verify_integrity();
        Ok(())
    }
}
