//! Tests for the ObjectPool contract
//!
//! These tests verify:
//! - write_complete / acquire_for_read / release_from_read / get_for_delete
//! - Identifiers under read are never handed to a delete
//! - Reads keep succeeding while deletes pass over read identifiers
//! - Read reference counting
//! - Closed pools reject mutation

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use objpool::pool::FixedStart;
use objpool::{ObjectIdentifier, ObjectPool, PoolConfig, PoolError};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn test_config(dir: &TempDir, max_per_file: usize) -> PoolConfig {
    PoolConfig::builder()
        .pool_dir(dir.path())
        .max_per_file(max_per_file)
        // Keep the background cycle out of the way
        .persist_interval(Duration::from_secs(3600))
        .build()
}

fn open_pool(dir: &TempDir) -> ObjectPool {
    ObjectPool::open_with(test_config(dir, 1000), &FixedStart(0)).unwrap()
}

fn write_ids(pool: &ObjectPool, count: usize) -> Vec<ObjectIdentifier> {
    let ids: Vec<_> = (0..count).map(|_| ObjectIdentifier::random()).collect();
    for id in &ids {
        pool.write_complete(*id).unwrap();
    }
    ids
}

// =============================================================================
// Basic Contract Tests
// =============================================================================

#[test]
fn test_open_empty_pool() {
    let temp = TempDir::new().unwrap();
    let pool = open_pool(&temp);

    assert_eq!(pool.available_len(), 0);
    assert_eq!(pool.active_index(), 0);
    assert!(!pool.is_closed());
    assert!(matches!(pool.acquire_for_read(), Err(PoolError::EmptyPool)));
    assert!(matches!(pool.get_for_delete(), Err(PoolError::EmptyPool)));
}

#[test]
fn test_invalid_config_rejected() {
    let temp = TempDir::new().unwrap();
    let config = test_config(&temp, 0);
    assert!(matches!(ObjectPool::open(config), Err(PoolError::Config(_))));
}

#[test]
fn test_write_complete_counts_distinct() {
    let temp = TempDir::new().unwrap();
    let pool = open_pool(&temp);

    let ids = write_ids(&pool, 100);
    for id in &ids[..10] {
        pool.write_complete(*id).unwrap();
    }

    assert_eq!(pool.available_len(), 100);
}

#[test]
fn test_acquire_does_not_remove() {
    let temp = TempDir::new().unwrap();
    let pool = open_pool(&temp);
    let ids = write_ids(&pool, 3);

    let id = pool.acquire_for_read().unwrap();
    assert!(ids.contains(&id));
    assert_eq!(pool.available_len(), 3);
    assert_eq!(pool.read_count(&id), 1);
    assert_eq!(pool.reading_len(), 1);
}

#[test]
fn test_get_for_delete_removes() {
    let temp = TempDir::new().unwrap();
    let pool = open_pool(&temp);
    let ids: HashSet<_> = write_ids(&pool, 10).into_iter().collect();

    let mut deleted = HashSet::new();
    for _ in 0..10 {
        deleted.insert(pool.get_for_delete().unwrap());
    }

    assert_eq!(deleted, ids);
    assert!(matches!(pool.get_for_delete(), Err(PoolError::EmptyPool)));
}

#[test]
fn test_release_without_read() {
    let temp = TempDir::new().unwrap();
    let pool = open_pool(&temp);
    let id = ObjectIdentifier::random();

    match pool.release_from_read(&id) {
        Err(PoolError::NotReading(reported)) => assert_eq!(reported, id),
        other => panic!("expected NotReading, got {:?}", other),
    }
}

// =============================================================================
// Read/Delete Exclusion Tests
// =============================================================================

#[test]
fn test_delete_skips_identifier_under_read() {
    let temp = TempDir::new().unwrap();
    let pool = open_pool(&temp);

    // One identifier first, so both reads land on it
    let read = write_ids(&pool, 1)[0];
    assert_eq!(pool.acquire_for_read().unwrap(), read);
    assert_eq!(pool.acquire_for_read().unwrap(), read);
    assert_eq!(pool.read_count(&read), 2);

    let others: HashSet<_> = write_ids(&pool, 2).into_iter().collect();

    let first = pool.get_for_delete().unwrap();
    let second = pool.get_for_delete().unwrap();
    assert_ne!(first, read);
    assert_ne!(second, read);
    assert_eq!([first, second].into_iter().collect::<HashSet<_>>(), others);

    // Only the read one is left, and it is not eligible
    assert!(matches!(pool.get_for_delete(), Err(PoolError::EmptyPool)));
    assert_eq!(pool.available_len(), 1);

    pool.release_from_read(&read).unwrap();
    assert!(matches!(pool.get_for_delete(), Err(PoolError::EmptyPool)));

    pool.release_from_read(&read).unwrap();
    assert_eq!(pool.get_for_delete().unwrap(), read);
}

#[test]
fn test_read_refcount_across_threads() {
    let temp = TempDir::new().unwrap();
    let pool = Arc::new(open_pool(&temp));
    let id = write_ids(&pool, 1)[0];

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let pool = Arc::clone(&pool);
            thread::spawn(move || {
                for _ in 0..100 {
                    assert_eq!(pool.acquire_for_read().unwrap(), id);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(pool.read_count(&id), 800);

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let pool = Arc::clone(&pool);
            thread::spawn(move || {
                for _ in 0..100 {
                    pool.release_from_read(&id).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(pool.read_count(&id), 0);
    assert_eq!(pool.reading_len(), 0);
    assert!(matches!(pool.release_from_read(&id), Err(PoolError::NotReading(_))));
}

#[test]
fn test_concurrent_reads_never_see_deleted() {
    let temp = TempDir::new().unwrap();
    let pool = Arc::new(open_pool(&temp));
    write_ids(&pool, 200);

    let deleted = Arc::new(Mutex::new(HashSet::new()));
    let stop = Arc::new(AtomicBool::new(false));
    let mut handles = vec![];

    for _ in 0..4 {
        let pool = Arc::clone(&pool);
        let deleted = Arc::clone(&deleted);
        let stop = Arc::clone(&stop);
        handles.push(thread::spawn(move || {
            while !stop.load(Ordering::Relaxed) {
                let id = match pool.acquire_for_read() {
                    Ok(id) => id,
                    Err(PoolError::EmptyPool) => continue,
                    Err(e) => panic!("unexpected error: {}", e),
                };
                assert!(!deleted.lock().unwrap().contains(&id));
                thread::yield_now();
                assert!(!deleted.lock().unwrap().contains(&id));
                pool.release_from_read(&id).unwrap();
            }
        }));
    }

    for _ in 0..2 {
        let pool = Arc::clone(&pool);
        let deleted = Arc::clone(&deleted);
        handles.push(thread::spawn(move || {
            for _ in 0..2000 {
                pool.write_complete(ObjectIdentifier::random()).unwrap();
                if let Ok(id) = pool.get_for_delete() {
                    assert!(deleted.lock().unwrap().insert(id), "{} deleted twice", id);
                }
            }
        }));
    }

    // Deleters finish on their own; then stop the readers
    let readers: Vec<_> = handles.drain(..4).collect();
    for handle in handles {
        handle.join().unwrap();
    }
    stop.store(true, Ordering::Relaxed);
    for handle in readers {
        handle.join().unwrap();
    }

    assert_eq!(pool.reading_len(), 0);
}

#[test]
fn test_reads_succeed_while_deletes_skip_read_ids() {
    let temp = TempDir::new().unwrap();
    let pool = Arc::new(open_pool(&temp));
    write_ids(&pool, 4);

    // Put every identifier under read so deletes can only reject
    let mut held = Vec::new();
    while pool.reading_len() < 4 {
        held.push(pool.acquire_for_read().unwrap());
    }

    let stop = Arc::new(AtomicBool::new(false));
    let deleter = {
        let pool = Arc::clone(&pool);
        let stop = Arc::clone(&stop);
        thread::spawn(move || {
            while !stop.load(Ordering::Relaxed) {
                match pool.get_for_delete() {
                    Err(PoolError::EmptyPool) => {}
                    other => panic!("delete should find nothing eligible, got {:?}", other),
                }
            }
        })
    };

    for _ in 0..20_000 {
        let id = pool.acquire_for_read().unwrap();
        pool.release_from_read(&id).unwrap();
    }

    stop.store(true, Ordering::Relaxed);
    deleter.join().unwrap();

    for id in &held {
        pool.release_from_read(id).unwrap();
    }
    assert_eq!(pool.available_len(), 4);
    assert_eq!(pool.reading_len(), 0);
}

// =============================================================================
// Shutdown Tests
// =============================================================================

#[test]
fn test_closed_pool_rejects_mutation() {
    let temp = TempDir::new().unwrap();
    let pool = open_pool(&temp);
    write_ids(&pool, 2);
    let read = pool.acquire_for_read().unwrap();

    pool.shutdown().unwrap();
    assert!(pool.is_closed());

    assert!(matches!(pool.write_complete(ObjectIdentifier::random()), Err(PoolError::Closed)));
    assert!(matches!(pool.acquire_for_read(), Err(PoolError::Closed)));
    assert!(matches!(pool.get_for_delete(), Err(PoolError::Closed)));
    assert!(matches!(pool.flush(), Err(PoolError::Closed)));

    // Outstanding reads can still be returned
    pool.release_from_read(&read).unwrap();

    // Second shutdown is a no-op
    pool.shutdown().unwrap();
    assert_eq!(pool.saved_count().unwrap(), 2);
}
