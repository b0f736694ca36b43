//! Persistence tests for ObjectPool
//!
//! These tests verify:
//! - Shutdown splits the pool into files of at most max_per_file records
//! - A restarted pool can reach every saved identifier
//! - Rebalancing both ways across flush cycles
//! - The background cycle and Drop both persist

use std::collections::HashSet;
use std::fs;
use std::thread;
use std::time::{Duration, Instant};

use objpool::pool::{FixedStart, LastStart};
use objpool::{ObjectIdentifier, ObjectPool, PoolConfig, PoolError, RecordMode, SegmentStore};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn test_config(dir: &TempDir, max_per_file: usize) -> PoolConfig {
    PoolConfig::builder()
        .pool_dir(dir.path())
        .max_per_file(max_per_file)
        .persist_interval(Duration::from_secs(3600))
        .build()
}

fn store_for(config: &PoolConfig) -> SegmentStore {
    SegmentStore::open(config).unwrap()
}

fn file_counts(store: &SegmentStore) -> Vec<(u64, u64)> {
    store
        .discover()
        .unwrap()
        .into_iter()
        .map(|index| (index, store.record_count(index).unwrap()))
        .collect()
}

fn write_ids(pool: &ObjectPool, count: usize) -> HashSet<ObjectIdentifier> {
    let mut ids = HashSet::new();
    for _ in 0..count {
        let id = ObjectIdentifier::random();
        pool.write_complete(id).unwrap();
        ids.insert(id);
    }
    ids
}

fn delete_all(pool: &ObjectPool) -> HashSet<ObjectIdentifier> {
    let mut deleted = HashSet::new();
    loop {
        match pool.get_for_delete() {
            Ok(id) => assert!(deleted.insert(id), "{} deleted twice", id),
            Err(PoolError::EmptyPool) => return deleted,
            Err(e) => panic!("unexpected error: {}", e),
        }
    }
}

// =============================================================================
// Shutdown Layout Tests
// =============================================================================

#[test]
fn test_shutdown_splits_into_bounded_files() {
    let temp = TempDir::new().unwrap();
    let config = test_config(&temp, 5);

    let pool = ObjectPool::open_with(config.clone(), &FixedStart(0)).unwrap();
    write_ids(&pool, 7);
    pool.shutdown().unwrap();

    assert_eq!(file_counts(&store_for(&config)), vec![(0, 5), (1, 2)]);
    assert_eq!(pool.saved_count().unwrap(), 7);
}

#[test]
fn test_empty_pool_leaves_no_files() {
    let temp = TempDir::new().unwrap();
    let config = test_config(&temp, 5);

    let pool = ObjectPool::open(config.clone()).unwrap();
    pool.shutdown().unwrap();

    assert!(store_for(&config).discover().unwrap().is_empty());
}

#[test]
fn test_saved_count_excludes_unflushed() {
    let temp = TempDir::new().unwrap();
    let pool = ObjectPool::open(test_config(&temp, 5)).unwrap();

    write_ids(&pool, 3);
    assert_eq!(pool.saved_count().unwrap(), 0);

    pool.flush().unwrap();
    assert_eq!(pool.saved_count().unwrap(), 3);
}

// =============================================================================
// Round Trip Tests
// =============================================================================

#[test]
fn test_round_trip_through_restart() {
    let temp = TempDir::new().unwrap();
    let config = test_config(&temp, 5);

    let written = {
        let pool = ObjectPool::open(config.clone()).unwrap();
        let written = write_ids(&pool, 23);
        pool.shutdown().unwrap();
        written
    };

    // Random start file: whichever it picks, everything must be reachable
    let pool = ObjectPool::open(config.clone()).unwrap();
    assert_eq!(pool.saved_count().unwrap(), 23);
    assert!(store_for(&config).discover().unwrap().contains(&pool.active_index()));

    assert_eq!(delete_all(&pool), written);

    pool.shutdown().unwrap();
    assert_eq!(pool.saved_count().unwrap(), 0);
}

#[test]
fn test_sized_round_trip() {
    let temp = TempDir::new().unwrap();
    let config = PoolConfig::builder()
        .pool_dir(temp.path())
        .max_per_file(4)
        .record_mode(RecordMode::Sized)
        .persist_interval(Duration::from_secs(3600))
        .build();

    {
        let pool = ObjectPool::open(config.clone()).unwrap();
        for size in 1..=6u64 {
            pool.write_complete(ObjectIdentifier::random().with_size(size * 1024))
                .unwrap();
        }
        pool.shutdown().unwrap();
    }

    let pool = ObjectPool::open(config).unwrap();
    let mut sizes = Vec::new();
    while let Ok(id) = pool.get_for_delete() {
        sizes.push(id.size().unwrap());
    }
    sizes.sort_unstable();
    assert_eq!(sizes, (1..=6u64).map(|s| s * 1024).collect::<Vec<_>>());
}

#[test]
fn test_legacy_files_without_header() {
    let temp = TempDir::new().unwrap();
    let config = PoolConfig::builder()
        .pool_dir(temp.path())
        .max_per_file(10)
        .versioned_header(false)
        .persist_interval(Duration::from_secs(3600))
        .build();

    let written = {
        let pool = ObjectPool::open(config.clone()).unwrap();
        let written = write_ids(&pool, 3);
        pool.shutdown().unwrap();
        written
    };

    let store = store_for(&config);
    assert_eq!(fs::metadata(store.path(0)).unwrap().len(), 3 * 18);

    // A pool writing headers still reads the legacy file
    let headed = PoolConfig {
        versioned_header: true,
        ..config
    };
    let pool = ObjectPool::open(headed).unwrap();
    assert_eq!(delete_all(&pool), written);
}

// =============================================================================
// Rebalance Tests
// =============================================================================

#[test]
fn test_flush_drains_then_borrows_back() {
    let temp = TempDir::new().unwrap();
    let config = test_config(&temp, 5);
    let store = store_for(&config);
    let pool = ObjectPool::open_with(config, &FixedStart(0)).unwrap();

    write_ids(&pool, 12);
    let stats = pool.flush().unwrap();
    assert_eq!(stats.drained, 7);
    assert_eq!(stats.written, 5);
    assert_eq!(pool.available_len(), 5);
    assert_eq!(file_counts(&store), vec![(0, 5), (1, 5), (2, 2)]);

    for _ in 0..4 {
        pool.get_for_delete().unwrap();
    }

    // 1 in memory, the last file (2) donates everything it has
    let stats = pool.flush().unwrap();
    assert_eq!(stats.borrowed, 2);
    assert_eq!(stats.written, 3);
    assert_eq!(file_counts(&store), vec![(0, 3), (1, 5)]);

    // Next cycle borrows from file 1
    let stats = pool.flush().unwrap();
    assert_eq!(stats.borrowed, 2);
    assert_eq!(file_counts(&store), vec![(0, 5), (1, 3)]);
    assert_eq!(pool.saved_count().unwrap(), 8);
}

#[test]
fn test_every_file_bounded_across_cycles() {
    let temp = TempDir::new().unwrap();
    let config = test_config(&temp, 10);
    let store = store_for(&config);
    let pool = ObjectPool::open_with(config, &FixedStart(0)).unwrap();

    for round in 0..6 {
        write_ids(&pool, 17 + round * 3);
        for _ in 0..(round * 4) {
            let _ = pool.get_for_delete();
        }
        pool.flush().unwrap();

        for (index, count) in file_counts(&store) {
            assert!(count <= 10, "file {} holds {} records", index, count);
        }
    }
}

#[test]
fn test_surplus_goes_past_active_file() {
    let temp = TempDir::new().unwrap();
    let config = test_config(&temp, 5);

    let pool = ObjectPool::open_with(config.clone(), &FixedStart(0)).unwrap();
    write_ids(&pool, 7);
    pool.shutdown().unwrap();
    drop(pool);

    // Active is the last file, so surplus must open file 2
    let pool = ObjectPool::open_with(config.clone(), &LastStart).unwrap();
    assert_eq!(pool.active_index(), 1);
    assert_eq!(pool.available_len(), 2);

    write_ids(&pool, 6);
    let stats = pool.flush().unwrap();
    assert_eq!(stats.drained, 3);
    assert_eq!(file_counts(&store_for(&config)), vec![(0, 5), (1, 5), (2, 3)]);
}

#[test]
fn test_no_borrow_when_last_file_is_active() {
    let temp = TempDir::new().unwrap();
    let config = test_config(&temp, 5);

    let written = {
        let pool = ObjectPool::open_with(config.clone(), &FixedStart(0)).unwrap();
        let written = write_ids(&pool, 7);
        pool.shutdown().unwrap();
        written
    };

    let pool = ObjectPool::open_with(config.clone(), &FixedStart(1)).unwrap();
    assert_eq!(pool.available_len(), 2);

    // File 0 has records, but the periodic cycle only looks at the last file
    let stats = pool.flush().unwrap();
    assert_eq!(stats.borrowed, 0);
    assert_eq!(pool.available_len(), 2);

    // Running dry pulls from file 0 instead of failing
    assert_eq!(delete_all(&pool), written);
    assert_eq!(file_counts(&store_for(&config)), vec![(1, 5)]);
}

// =============================================================================
// Background and Drop Tests
// =============================================================================

#[test]
fn test_background_cycle_flushes() {
    let temp = TempDir::new().unwrap();
    let config = PoolConfig::builder()
        .pool_dir(temp.path())
        .max_per_file(100)
        .persist_interval(Duration::from_millis(20))
        .build();

    let pool = ObjectPool::open(config).unwrap();
    write_ids(&pool, 3);

    let deadline = Instant::now() + Duration::from_secs(5);
    while pool.saved_count().unwrap() < 3 {
        assert!(Instant::now() < deadline, "background flush never happened");
        thread::sleep(Duration::from_millis(10));
    }

    pool.shutdown().unwrap();
}

#[test]
fn test_drop_flushes() {
    let temp = TempDir::new().unwrap();
    let config = test_config(&temp, 100);

    {
        let pool = ObjectPool::open(config.clone()).unwrap();
        write_ids(&pool, 4);
    }

    assert_eq!(store_for(&config).saved_count().unwrap(), 4);
}
