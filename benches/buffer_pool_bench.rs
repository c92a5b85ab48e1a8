use std::sync::Arc;
use criterion::{criterion_group, criterion_main, Criterion};
use tempfile::NamedTempFile;

use lynxdb::storage::buffer::{BufferPoolInstance, PagePool, ParallelBufferPool};
use lynxdb::storage::disk::DiskManager;

fn bench_fetch_unpin_hot(c: &mut Criterion) {
    let file = NamedTempFile::new().unwrap();
    let disk_manager = Arc::new(DiskManager::new(file.path()).unwrap());
    let pool = BufferPoolInstance::new(64, disk_manager);

    let (_, page_id) = pool.new_page().unwrap();
    pool.unpin_page(page_id, false).unwrap();

    c.bench_function("fetch_unpin_hot_page", |b| {
        b.iter(|| {
            let _page = pool.fetch_page(page_id).unwrap();
            pool.unpin_page(page_id, false).unwrap();
        })
    });
}

fn bench_new_page_with_eviction(c: &mut Criterion) {
    let file = NamedTempFile::new().unwrap();
    let disk_manager = Arc::new(DiskManager::new(file.path()).unwrap());
    let pool = BufferPoolInstance::new(8, disk_manager);

    c.bench_function("new_page_with_eviction", |b| {
        b.iter(|| {
            let (_, page_id) = pool.new_page().unwrap();
            pool.unpin_page(page_id, true).unwrap();
        })
    });
}

fn bench_parallel_pool_round_robin(c: &mut Criterion) {
    let file = NamedTempFile::new().unwrap();
    let disk_manager = Arc::new(DiskManager::new(file.path()).unwrap());
    let pool = ParallelBufferPool::new(4, 8, disk_manager);

    c.bench_function("parallel_new_page_round_robin", |b| {
        b.iter(|| {
            let (_, page_id) = pool.new_page().unwrap();
            pool.unpin_page(page_id, true).unwrap();
        })
    });
}

criterion_group!(
    benches,
    bench_fetch_unpin_hot,
    bench_new_page_with_eviction,
    bench_parallel_pool_round_robin
);
criterion_main!(benches);
