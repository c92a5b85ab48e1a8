use anyhow::Result;

use lynxdb::storage::buffer::BufferPoolError;

mod common;
use common::create_test_buffer_pool;

#[test]
fn test_new_page() -> Result<()> {
    let (buffer_pool, _temp_file) = create_test_buffer_pool(10)?;

    let (page, page_id) = buffer_pool.new_page()?;

    // Page 0 is reserved, so ids start above it
    assert!(page_id > 0);
    {
        let page_guard = page.read();
        assert_eq!(page_guard.page_id, page_id);
        assert!(page_guard.data.iter().all(|&b| b == 0));
    }

    buffer_pool.unpin_page(page_id, false)?;
    Ok(())
}

#[test]
fn test_fetch_page() -> Result<()> {
    let (buffer_pool, _temp_file) = create_test_buffer_pool(10)?;

    let (_, page_id) = buffer_pool.new_page()?;
    buffer_pool.unpin_page(page_id, false)?;

    let fetched_page = buffer_pool.fetch_page(page_id)?;
    {
        let page_guard = fetched_page.read();
        assert_eq!(page_guard.page_id, page_id);
    }

    buffer_pool.unpin_page(page_id, false)?;
    Ok(())
}

#[test]
fn test_pin_evict_cycle() -> Result<()> {
    // Two frames, two pinned pages: a third page must fail until one
    // pin is released.
    let (buffer_pool, _temp_file) = create_test_buffer_pool(2)?;

    let (page_a, id_a) = buffer_pool.new_page()?;
    let (_page_b, id_b) = buffer_pool.new_page()?;

    // Both frames pinned: no room for a third page
    assert!(matches!(
        buffer_pool.new_page(),
        Err(BufferPoolError::BufferPoolFull)
    ));
    assert!(matches!(
        buffer_pool.fetch_page(id_a + 2),
        Err(BufferPoolError::BufferPoolFull)
    ));

    // Write something through page A so eviction has to persist it
    {
        let mut page_guard = page_a.write();
        page_guard.data[100..104].copy_from_slice(&[9, 9, 9, 9]);
    }
    buffer_pool.unpin_page(id_a, true)?;

    // Now a third page fits, evicting page A
    let (_page_c, id_c) = buffer_pool.new_page()?;
    assert_ne!(id_c, id_a);
    assert_ne!(id_c, id_b);

    // Fetching page A again reads it back from disk
    buffer_pool.unpin_page(id_c, false)?;
    let page_a_again = buffer_pool.fetch_page(id_a)?;
    {
        let page_guard = page_a_again.read();
        assert_eq!(&page_guard.data[100..104], &[9, 9, 9, 9]);
    }
    buffer_pool.unpin_page(id_a, false)?;

    Ok(())
}

#[test]
fn test_unpin_errors() -> Result<()> {
    let (buffer_pool, _temp_file) = create_test_buffer_pool(10)?;

    let (_, page_id) = buffer_pool.new_page()?;
    buffer_pool.unpin_page(page_id, false)?;

    // Second unpin: pin count is already zero
    assert!(matches!(
        buffer_pool.unpin_page(page_id, false),
        Err(BufferPoolError::PageNotPinned(_))
    ));

    // Unpinning a page that was never fetched
    assert!(matches!(
        buffer_pool.unpin_page(9999, false),
        Err(BufferPoolError::PageNotFound(_))
    ));

    Ok(())
}

#[test]
fn test_unpin_dirty_flag_is_sticky() -> Result<()> {
    let (buffer_pool, _temp_file) = create_test_buffer_pool(2)?;

    let (page, page_id) = buffer_pool.new_page()?;
    {
        let mut page_guard = page.write();
        page_guard.data[0..4].copy_from_slice(&[1, 2, 3, 4]);
    }
    // Pin twice, unpin once dirty and once clean: the clean unpin must
    // not wash out the dirty bit.
    buffer_pool.fetch_page(page_id)?;
    buffer_pool.unpin_page(page_id, true)?;
    buffer_pool.unpin_page(page_id, false)?;

    // Evict by filling the pool; the write-back must have happened
    let (_, id2) = buffer_pool.new_page()?;
    buffer_pool.unpin_page(id2, false)?;
    let (_, id3) = buffer_pool.new_page()?;
    buffer_pool.unpin_page(id3, false)?;

    let fetched = buffer_pool.fetch_page(page_id)?;
    {
        let page_guard = fetched.read();
        assert_eq!(&page_guard.data[0..4], &[1, 2, 3, 4]);
    }
    buffer_pool.unpin_page(page_id, false)?;

    Ok(())
}

#[test]
fn test_flush_page() -> Result<()> {
    let (buffer_pool, _temp_file) = create_test_buffer_pool(10)?;

    let (page, page_id) = buffer_pool.new_page()?;
    {
        let mut page_guard = page.write();
        let test_data = b"Test Data For Flushing";
        page_guard.data[100..100 + test_data.len()].copy_from_slice(test_data);
    }
    buffer_pool.unpin_page(page_id, true)?;

    buffer_pool.flush_page(page_id)?;

    let fetched_page = buffer_pool.fetch_page(page_id)?;
    {
        let page_guard = fetched_page.read();
        let test_data = b"Test Data For Flushing";
        assert_eq!(&page_guard.data[100..100 + test_data.len()], test_data);
    }
    buffer_pool.unpin_page(page_id, false)?;

    Ok(())
}

#[test]
fn test_flush_all_pages() -> Result<()> {
    let (buffer_pool, _temp_file) = create_test_buffer_pool(10)?;

    let mut page_ids = Vec::new();
    for i in 0..5u8 {
        let (page, page_id) = buffer_pool.new_page()?;
        {
            let mut page_guard = page.write();
            page_guard.data[0] = i;
        }
        buffer_pool.unpin_page(page_id, true)?;
        page_ids.push(page_id);
    }

    buffer_pool.flush_all_pages()?;

    for (i, &page_id) in page_ids.iter().enumerate() {
        let fetched_page = buffer_pool.fetch_page(page_id)?;
        {
            let page_guard = fetched_page.read();
            assert_eq!(page_guard.data[0], i as u8);
        }
        buffer_pool.unpin_page(page_id, false)?;
    }

    Ok(())
}

#[test]
fn test_delete_page() -> Result<()> {
    let (buffer_pool, _temp_file) = create_test_buffer_pool(10)?;

    let (_, page_id) = buffer_pool.new_page()?;

    // Pinned pages cannot be deleted
    assert!(matches!(
        buffer_pool.delete_page(page_id),
        Err(BufferPoolError::PagePinned(_))
    ));

    buffer_pool.unpin_page(page_id, false)?;
    buffer_pool.delete_page(page_id)?;

    // Deleting a page that is not resident succeeds quietly
    buffer_pool.delete_page(page_id)?;
    buffer_pool.delete_page(4242)?;

    // The freed frame is reusable
    let (_, new_page_id) = buffer_pool.new_page()?;
    buffer_pool.unpin_page(new_page_id, false)?;

    Ok(())
}
