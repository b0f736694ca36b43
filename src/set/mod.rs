//! Random-Access Set Module
//!
//! Lock-striped concurrent hash set with O(1) membership, insert and remove,
//! plus amortized O(1) random get/remove across the whole set.
//!
//! ## Responsibilities
//! - Spread elements over independently locked segments by hash
//! - Let unrelated segments mutate without contending
//! - Grow each segment on its own (no global rehash)
//! - Pick "some" element at random, cheaply
//!
//! ## Random Selection Is Not Uniform
//! `random_get`/`random_remove` pick a segment uniformly, then a bucket
//! slot uniformly, then an offset into that bucket's chain. A segment that
//! misses on a few random slots falls back to a uniform choice among its
//! non-empty chains, so chains are equally likely whatever empty runs sit
//! before them. Elements in short chains of sparse segments are still more
//! likely than elements in long chains of dense segments. Callers get
//! "pick some element", nothing stronger.
//!
//! ## Layout
//! ```text
//!   hash(id) ──► top bits ──► segment ──► low bits ──► bucket chain
//!
//!   ┌─────────┐ ┌─────────┐       ┌─────────┐
//!   │ seg 0   │ │ seg 1   │  ...  │ seg N-1 │   (RwLock + atomic count each)
//!   │ [chain] │ │ [chain] │       │ [chain] │
//!   │ [chain] │ │ [chain] │       │ [chain] │
//!   └─────────┘ └─────────┘       └─────────┘
//! ```

mod iter;
mod segment;

use std::hash::{BuildHasher, BuildHasherDefault, Hash};

use crossbeam::utils::CachePadded;
use rand::Rng;

pub use iter::Iter;
use segment::{Segment, MIN_TABLE_LEN};

/// Stable, cheap hasher for spreading identifiers across segments
pub type SetHasher = BuildHasherDefault<crc32fast::Hasher>;

/// Default number of segments (concurrency level)
pub const DEFAULT_SEGMENTS: usize = 16;

/// Upper bound on segments
pub const MAX_SEGMENTS: usize = 1 << 16;

/// Lock-free passes `len()`/`is_empty()` attempt before locking every segment
const RETRIES_BEFORE_LOCK: usize = 2;

/// Concurrent set supporting random get/remove
///
/// ## Concurrency:
/// - Each segment has its own RwLock; no operation holds two at once,
///   except the locked fallback of `len()` which takes read locks in order
/// - All methods use `&self`
pub struct RandomAccessSet<T> {
    segments: Box<[CachePadded<Segment<T>>]>,

    /// Right shift that leaves the segment index in the low bits
    segment_shift: u32,

    hasher: SetHasher,
}

impl<T: Hash + Eq + Clone> RandomAccessSet<T> {
    /// Create an empty set with the default capacity and concurrency
    pub fn new() -> Self {
        Self::with_capacity_and_segments(0, DEFAULT_SEGMENTS)
    }

    /// Create an empty set sized for roughly `capacity` elements
    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_capacity_and_segments(capacity, DEFAULT_SEGMENTS)
    }

    /// Create an empty set with an explicit segment count.
    ///
    /// `segments` is rounded up to a power of two and clamped to
    /// `1..=MAX_SEGMENTS`.
    pub fn with_capacity_and_segments(capacity: usize, segments: usize) -> Self {
        let segment_count = segments.clamp(1, MAX_SEGMENTS).next_power_of_two();
        let per_segment = capacity.div_ceil(segment_count);
        // Table big enough that `per_segment` stays under the load threshold
        let buckets = (per_segment * 4 / 3 + 1).max(MIN_TABLE_LEN);

        let segments: Vec<_> = (0..segment_count)
            .map(|_| CachePadded::new(Segment::with_buckets(buckets)))
            .collect();

        Self {
            segments: segments.into_boxed_slice(),
            segment_shift: 32 - segment_count.trailing_zeros(),
            hasher: SetHasher::default(),
        }
    }

    // =========================================================================
    // Membership
    // =========================================================================

    /// Insert `value`; false if it was already present
    pub fn insert(&self, value: T) -> bool {
        let hash = self.hash(&value);
        self.segment_for(hash).insert(hash, value)
    }

    /// Remove `value`; false if it was absent
    pub fn remove(&self, value: &T) -> bool {
        self.take(value).is_some()
    }

    /// Remove `value` and hand back the stored element
    ///
    /// Useful when equality ignores some payload (the stored copy keeps it).
    pub fn take(&self, value: &T) -> Option<T> {
        let hash = self.hash(value);
        self.segment_for(hash).remove(hash, value)
    }

    pub fn contains(&self, value: &T) -> bool {
        let hash = self.hash(value);
        self.segment_for(hash).contains(hash, value)
    }

    /// The stored element equal to `value`
    pub fn get(&self, value: &T) -> Option<T> {
        let hash = self.hash(value);
        self.segment_for(hash).get(hash, value)
    }

    // =========================================================================
    // Random Access
    // =========================================================================

    /// Some element, chosen at random (not uniformly, see module docs)
    pub fn random_get(&self) -> Option<T> {
        let mut rng = rand::thread_rng();
        self.random_with(&mut rng, |segment, rng| segment.random_get(rng))
    }

    /// Remove and return some element, chosen at random
    pub fn random_remove(&self) -> Option<T> {
        let mut rng = rand::thread_rng();
        self.random_with(&mut rng, |segment, rng| segment.random_remove(rng))
    }

    /// Retry random segments until one yields or the whole set reads empty
    fn random_with<R, F>(&self, rng: &mut R, mut pick: F) -> Option<T>
    where
        R: Rng,
        F: FnMut(&Segment<T>, &mut R) -> Option<T>,
    {
        loop {
            let segment = &self.segments[rng.gen_range(0..self.segments.len())];
            if segment.count() > 0 {
                if let Some(value) = pick(segment, &mut *rng) {
                    return Some(value);
                }
            }
            if self.is_empty() {
                return None;
            }
        }
    }

    // =========================================================================
    // Size
    // =========================================================================

    /// Number of elements.
    ///
    /// Sums per-segment counts without locking, accepting the sum once two
    /// consecutive passes see the same total modification stamp. Under
    /// constant churn it falls back to read-locking every segment.
    pub fn len(&self) -> usize {
        let mut last_stamp = None;

        for _ in 0..=RETRIES_BEFORE_LOCK {
            let mut sum = 0usize;
            let mut stamp = 0u64;
            for segment in self.segments.iter() {
                stamp = stamp.wrapping_add(segment.mod_count());
                sum += segment.count();
            }
            if last_stamp == Some(stamp) {
                return sum;
            }
            last_stamp = Some(stamp);
        }

        self.locked_len()
    }

    /// True when no segment holds an element (same retry scheme as `len`)
    pub fn is_empty(&self) -> bool {
        let mut last_stamp = None;

        for _ in 0..=RETRIES_BEFORE_LOCK {
            let mut stamp = 0u64;
            for segment in self.segments.iter() {
                if segment.count() != 0 {
                    return false;
                }
                stamp = stamp.wrapping_add(segment.mod_count());
            }
            if last_stamp == Some(stamp) {
                return true;
            }
            last_stamp = Some(stamp);
        }

        self.locked_len() == 0
    }

    /// Count with every segment read-locked at once (taken in index order)
    fn locked_len(&self) -> usize {
        let guards: Vec<_> = self.segments.iter().map(|s| s.read()).collect();
        guards.iter().map(|g| g.len()).sum()
    }

    /// Total bucket slots across segments
    pub fn capacity(&self) -> usize {
        self.segments.iter().map(|s| s.bucket_count()).sum()
    }

    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    // =========================================================================
    // Bulk
    // =========================================================================

    /// Remove every element, one segment at a time
    pub fn clear(&self) {
        for segment in self.segments.iter() {
            segment.clear();
        }
    }

    /// Copy of every element.
    ///
    /// Each segment is copied atomically; the set as a whole is not frozen.
    pub fn snapshot(&self) -> Vec<T> {
        let mut out = Vec::with_capacity(self.len());
        for segment in self.segments.iter() {
            segment.snapshot_into(&mut out);
        }
        out
    }

    /// Iterate by copying one segment at a time.
    ///
    /// The set may be modified (including removal of yielded elements)
    /// while iterating.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter::new(self)
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn hash(&self, value: &T) -> u32 {
        spread(self.hasher.hash_one(value) as u32)
    }

    #[inline]
    fn segment_for(&self, hash: u32) -> &Segment<T> {
        // checked_shr: a shift of 32 (single segment) selects segment 0
        let index = hash.checked_shr(self.segment_shift).unwrap_or(0) as usize;
        &self.segments[index]
    }

    pub(crate) fn segment_at(&self, index: usize) -> Option<&Segment<T>> {
        self.segments.get(index).map(|s| &**s)
    }
}

impl<T: Hash + Eq + Clone> Default for RandomAccessSet<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Hash + Eq + Clone> Extend<T> for RandomAccessSet<T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for value in iter {
            self.insert(value);
        }
    }
}

impl<T: Hash + Eq + Clone> FromIterator<T> for RandomAccessSet<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let set = Self::new();
        for value in iter {
            set.insert(value);
        }
        set
    }
}

/// Avalanche the CRC so segment bits (high) and slot bits (low) decorrelate
#[inline]
fn spread(mut h: u32) -> u32 {
    h ^= h >> 16;
    h = h.wrapping_mul(0x85eb_ca6b);
    h ^= h >> 13;
    h = h.wrapping_mul(0xc2b2_ae35);
    h ^= h >> 16;
    h
}
