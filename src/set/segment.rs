//! Set segment
//!
//! One independently locked partition of a [`RandomAccessSet`](super::RandomAccessSet).
//!
//! ## Concurrency
//! - `table`: RwLock. Mutations take it exclusively, lookups and random
//!   reads share it.
//! - `count`: element count, stored (Release) after every structural change
//!   while the write lock is still held. Readers load it (Acquire) without
//!   the lock to skip empty segments and to sum sizes.
//! - `mod_count`: bumped after `count` on every structural change; lets
//!   `len()`/`is_empty()` detect a torn multi-segment pass.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use parking_lot::{RwLock, RwLockReadGuard};
use rand::Rng;

/// Random slot probes before falling back to a pass over the whole table
const SLOT_ATTEMPTS: usize = 4;

/// Smallest bucket table a segment will allocate
pub(crate) const MIN_TABLE_LEN: usize = 2;

/// An element together with its cached hash (rehashing never recomputes)
#[derive(Debug, Clone)]
struct Entry<T> {
    hash: u32,
    value: T,
}

/// Open-hashing table: each slot is a chain of entries
struct Table<T> {
    buckets: Vec<Vec<Entry<T>>>,
    len: usize,
    threshold: usize,
}

impl<T> Table<T> {
    fn with_buckets(bucket_count: usize) -> Self {
        let bucket_count = bucket_count.max(MIN_TABLE_LEN).next_power_of_two();
        let mut buckets = Vec::with_capacity(bucket_count);
        buckets.resize_with(bucket_count, Vec::new);
        Self {
            buckets,
            len: 0,
            threshold: load_threshold(bucket_count),
        }
    }

    #[inline]
    fn slot(&self, hash: u32) -> usize {
        hash as usize & (self.buckets.len() - 1)
    }

    /// Double the bucket table, redistributing this segment's own entries
    fn grow(&mut self) {
        let new_len = self.buckets.len() * 2;
        let mut buckets: Vec<Vec<Entry<T>>> = Vec::with_capacity(new_len);
        buckets.resize_with(new_len, Vec::new);

        for chain in self.buckets.drain(..) {
            for entry in chain {
                let slot = entry.hash as usize & (new_len - 1);
                buckets[slot].push(entry);
            }
        }

        self.buckets = buckets;
        self.threshold = load_threshold(new_len);
    }

    /// Choose a (slot, offset) pair pointing at some element.
    ///
    /// A few random slots first; if every one of those chains is empty, a
    /// uniform choice among the non-empty chains. The offset is a random
    /// value taken modulo the chain length, i.e. a walk that wraps to the
    /// chain head when it runs past the end.
    fn pick<R: Rng>(&self, rng: &mut R) -> Option<(usize, usize)> {
        if self.len == 0 {
            return None;
        }

        let table_len = self.buckets.len();
        for _ in 0..SLOT_ATTEMPTS {
            let slot = rng.gen_range(0..table_len);
            if !self.buckets[slot].is_empty() {
                return Some((slot, self.chain_offset(slot, rng)));
            }
        }

        // len > 0, so at least one chain is non-empty
        let occupied = self.buckets.iter().filter(|chain| !chain.is_empty()).count();
        let nth = rng.gen_range(0..occupied);
        let slot = self
            .buckets
            .iter()
            .enumerate()
            .filter(|(_, chain)| !chain.is_empty())
            .nth(nth)
            .map(|(slot, _)| slot)?;

        Some((slot, self.chain_offset(slot, rng)))
    }

    fn chain_offset<R: Rng>(&self, slot: usize, rng: &mut R) -> usize {
        rng.gen::<u32>() as usize % self.buckets[slot].len()
    }
}

/// Resize once the table is three quarters full
fn load_threshold(bucket_count: usize) -> usize {
    bucket_count * 3 / 4
}

/// A held segment read lock
pub(crate) struct SegmentReadGuard<'a, T>(RwLockReadGuard<'a, Table<T>>);

impl<T> SegmentReadGuard<'_, T> {
    pub(crate) fn len(&self) -> usize {
        self.0.len
    }
}

/// An independently lockable partition of the set's hash space
pub(crate) struct Segment<T> {
    table: RwLock<Table<T>>,
    count: AtomicUsize,
    mod_count: AtomicU64,
}

impl<T: Clone + PartialEq> Segment<T> {
    pub(crate) fn with_buckets(bucket_count: usize) -> Self {
        Self {
            table: RwLock::new(Table::with_buckets(bucket_count)),
            count: AtomicUsize::new(0),
            mod_count: AtomicU64::new(0),
        }
    }

    /// Element count without taking the lock
    #[inline]
    pub(crate) fn count(&self) -> usize {
        self.count.load(Ordering::Acquire)
    }

    #[inline]
    pub(crate) fn mod_count(&self) -> u64 {
        self.mod_count.load(Ordering::Acquire)
    }

    /// Hold the read lock, e.g. to count several segments consistently
    pub(crate) fn read(&self) -> SegmentReadGuard<'_, T> {
        SegmentReadGuard(self.table.read())
    }

    pub(crate) fn bucket_count(&self) -> usize {
        self.table.read().buckets.len()
    }

    pub(crate) fn contains(&self, hash: u32, value: &T) -> bool {
        if self.count() == 0 {
            return false;
        }

        let table = self.table.read();
        let slot = table.slot(hash);
        table.buckets[slot]
            .iter()
            .any(|e| e.hash == hash && e.value == *value)
    }

    pub(crate) fn get(&self, hash: u32, value: &T) -> Option<T> {
        if self.count() == 0 {
            return None;
        }

        let table = self.table.read();
        let slot = table.slot(hash);
        table.buckets[slot]
            .iter()
            .find(|e| e.hash == hash && e.value == *value)
            .map(|e| e.value.clone())
    }

    pub(crate) fn insert(&self, hash: u32, value: T) -> bool {
        let mut table = self.table.write();

        let slot = table.slot(hash);
        if table.buckets[slot]
            .iter()
            .any(|e| e.hash == hash && e.value == value)
        {
            return false;
        }

        if table.len + 1 > table.threshold {
            table.grow();
        }

        let slot = table.slot(hash);
        table.buckets[slot].push(Entry { hash, value });
        table.len += 1;
        self.publish(table.len);
        true
    }

    pub(crate) fn remove(&self, hash: u32, value: &T) -> Option<T> {
        if self.count() == 0 {
            return None;
        }

        let mut table = self.table.write();
        let slot = table.slot(hash);
        let position = table.buckets[slot]
            .iter()
            .position(|e| e.hash == hash && e.value == *value)?;

        let entry = table.buckets[slot].swap_remove(position);
        table.len -= 1;
        self.publish(table.len);
        Some(entry.value)
    }

    pub(crate) fn random_get<R: Rng>(&self, rng: &mut R) -> Option<T> {
        let table = self.table.read();
        let (slot, offset) = table.pick(rng)?;
        Some(table.buckets[slot][offset].value.clone())
    }

    pub(crate) fn random_remove<R: Rng>(&self, rng: &mut R) -> Option<T> {
        let mut table = self.table.write();
        let (slot, offset) = table.pick(rng)?;
        let entry = table.buckets[slot].swap_remove(offset);
        table.len -= 1;
        self.publish(table.len);
        Some(entry.value)
    }

    pub(crate) fn clear(&self) {
        let mut table = self.table.write();
        if table.len == 0 {
            return;
        }
        for chain in table.buckets.iter_mut() {
            chain.clear();
        }
        table.len = 0;
        self.publish(0);
    }

    /// Copy every element out under the read lock
    pub(crate) fn snapshot_into(&self, out: &mut Vec<T>) {
        let table = self.table.read();
        out.reserve(table.len);
        for chain in &table.buckets {
            out.extend(chain.iter().map(|e| e.value.clone()));
        }
    }

    /// Count last, then the modification stamp; called with the write lock held
    fn publish(&self, len: usize) {
        self.count.store(len, Ordering::Release);
        self.mod_count.fetch_add(1, Ordering::AcqRel);
    }
}
