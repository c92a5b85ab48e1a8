use std::sync::Arc;
use anyhow::Result;
use rand::prelude::*;

use lynxdb::common::types::Rid;
use lynxdb::storage::buffer::PagePool;
use lynxdb::ExtendibleHashTable;

mod common;
use common::{create_test_buffer_pool, create_test_parallel_pool};

/// Identity hash: routes key k by its own low bits, making split
/// patterns predictable.
fn identity_hash(key: &i64) -> u32 {
    *key as u32
}

#[test]
fn test_insert_and_get_round_trip() -> Result<()> {
    let (buffer_pool, _temp_file) = create_test_buffer_pool(50)?;
    let table: ExtendibleHashTable<i64, Rid> =
        ExtendibleHashTable::new(buffer_pool as Arc<dyn PagePool>)?;

    for i in 0..500i64 {
        assert!(table.insert(&i, &Rid::new(1, i as u32))?);
    }
    table.verify_integrity()?;

    for i in 0..500i64 {
        let values = table.get_value(&i)?;
        assert_eq!(values, vec![Rid::new(1, i as u32)], "key {}", i);
    }
    assert!(table.get_value(&9999)?.is_empty());

    Ok(())
}

#[test]
fn test_duplicate_insert_is_rejected() -> Result<()> {
    let (buffer_pool, _temp_file) = create_test_buffer_pool(50)?;
    let table: ExtendibleHashTable<i64, Rid> =
        ExtendibleHashTable::new(buffer_pool as Arc<dyn PagePool>)?;

    let rid = Rid::new(3, 7);
    assert!(table.insert(&42, &rid)?);
    assert!(!table.insert(&42, &rid)?);
    assert_eq!(table.get_value(&42)?.len(), 1);

    // Same key, distinct value is fine
    assert!(table.insert(&42, &Rid::new(3, 8))?);
    assert_eq!(table.get_value(&42)?.len(), 2);

    Ok(())
}

#[test]
fn test_remove_insert_cancel() -> Result<()> {
    let (buffer_pool, _temp_file) = create_test_buffer_pool(50)?;
    let table: ExtendibleHashTable<i64, Rid> =
        ExtendibleHashTable::new(buffer_pool as Arc<dyn PagePool>)?;

    let rid = Rid::new(1, 1);
    assert!(table.insert(&7, &rid)?);
    assert!(table.remove(&7, &rid)?);
    assert!(table.get_value(&7)?.is_empty());

    // Removing again reports nothing to remove
    assert!(!table.remove(&7, &rid)?);

    Ok(())
}

#[test]
fn test_split_grows_directory_and_keeps_keys() -> Result<()> {
    // Capacity-2 buckets with an identity hash: keys 1, 17, 33 share
    // their low bits, forcing repeated splits of the same bucket.
    let (buffer_pool, _temp_file) = create_test_buffer_pool(64)?;
    let table: ExtendibleHashTable<i64, Rid> = ExtendibleHashTable::with_config(
        buffer_pool as Arc<dyn PagePool>,
        2,
        identity_hash,
    )?;

    table.insert(&1, &Rid::new(1, 1))?;
    table.insert(&17, &Rid::new(1, 17))?;
    assert_eq!(table.global_depth()?, 0);

    // Third colliding key: the bucket must split until 1, 17 and 33
    // separate, which takes the directory past depth 2.
    table.insert(&33, &Rid::new(1, 33))?;
    table.verify_integrity()?;
    assert!(table.global_depth()? >= 2);

    // Split closure: every previously inserted key is still reachable
    assert_eq!(table.get_value(&1)?, vec![Rid::new(1, 1)]);
    assert_eq!(table.get_value(&17)?, vec![Rid::new(1, 17)]);
    assert_eq!(table.get_value(&33)?, vec![Rid::new(1, 33)]);

    Ok(())
}

#[test]
fn test_merge_shrinks_directory_to_zero() -> Result<()> {
    let (buffer_pool, _temp_file) = create_test_buffer_pool(64)?;
    let table: ExtendibleHashTable<i64, Rid> = ExtendibleHashTable::with_config(
        buffer_pool as Arc<dyn PagePool>,
        2,
        identity_hash,
    )?;

    table.insert(&1, &Rid::new(1, 1))?;
    table.insert(&17, &Rid::new(1, 17))?;
    table.insert(&33, &Rid::new(1, 33))?;
    assert!(table.global_depth()? >= 2);

    // Emptying buckets merges them back; integrity holds throughout
    table.remove(&17, &Rid::new(1, 17))?;
    table.verify_integrity()?;
    table.remove(&33, &Rid::new(1, 33))?;
    table.verify_integrity()?;

    assert_eq!(table.get_value(&1)?, vec![Rid::new(1, 1)]);

    // Only when the last key goes does the directory collapse to depth 0
    table.remove(&1, &Rid::new(1, 1))?;
    table.verify_integrity()?;
    assert_eq!(table.global_depth()?, 0);

    Ok(())
}

#[test]
fn test_split_and_merge_over_parallel_pool() -> Result<()> {
    let (pool, _temp_file) = create_test_parallel_pool(3, 16)?;
    let table: ExtendibleHashTable<i64, Rid> = ExtendibleHashTable::with_config(
        pool as Arc<dyn PagePool>,
        4,
        identity_hash,
    )?;

    for i in 0..64i64 {
        assert!(table.insert(&i, &Rid::new(2, i as u32))?);
    }
    table.verify_integrity()?;
    assert!(table.global_depth()? > 0);

    for i in 0..64i64 {
        assert_eq!(table.get_value(&i)?, vec![Rid::new(2, i as u32)]);
    }

    for i in 0..64i64 {
        assert!(table.remove(&i, &Rid::new(2, i as u32))?);
    }
    table.verify_integrity()?;
    assert_eq!(table.global_depth()?, 0);

    Ok(())
}

#[test]
fn test_randomized_workload_matches_model() -> Result<()> {
    let (buffer_pool, _temp_file) = create_test_buffer_pool(128)?;
    let table: ExtendibleHashTable<i64, i64> =
        ExtendibleHashTable::new(buffer_pool as Arc<dyn PagePool>)?;

    let mut rng = StdRng::seed_from_u64(0xDB);
    let mut model: Vec<(i64, i64)> = Vec::new();

    for _ in 0..2000 {
        let key = rng.gen_range(0..200i64);
        if rng.gen_bool(0.6) {
            let value = rng.gen_range(0..10i64);
            let inserted = table.insert(&key, &value)?;
            let fresh = !model.contains(&(key, value));
            assert_eq!(inserted, fresh);
            if fresh {
                model.push((key, value));
            }
        } else if let Some(pos) = model.iter().position(|(k, _)| *k == key) {
            let (_, value) = model.remove(pos);
            assert!(table.remove(&key, &value)?);
        } else {
            assert!(!table.remove(&key, &0)?);
        }
    }

    table.verify_integrity()?;
    for key in 0..200i64 {
        let mut expected: Vec<i64> = model
            .iter()
            .filter(|(k, _)| *k == key)
            .map(|(_, v)| *v)
            .collect();
        let mut actual = table.get_value(&key)?;
        expected.sort_unstable();
        actual.sort_unstable();
        assert_eq!(actual, expected, "key {}", key);
    }

    Ok(())
}
