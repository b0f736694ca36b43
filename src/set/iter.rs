//! Segment-at-a-time iterator over a [`RandomAccessSet`].

use std::hash::Hash;
use std::vec;

use super::RandomAccessSet;

/// Iterator that copies one segment at a time.
///
/// Elements inserted into an already-visited segment are not seen;
/// elements removed from a not-yet-visited segment are not yielded.
/// Removing yielded elements from the set mid-iteration is safe.
pub struct Iter<'a, T> {
    set: &'a RandomAccessSet<T>,
    next_segment: usize,
    buffer: vec::IntoIter<T>,
}

impl<'a, T: Hash + Eq + Clone> Iter<'a, T> {
    pub(super) fn new(set: &'a RandomAccessSet<T>) -> Self {
        Self {
            set,
            next_segment: 0,
            buffer: Vec::new().into_iter(),
        }
    }
}

impl<'a, T: Hash + Eq + Clone> Iterator for Iter<'a, T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        loop {
            if let Some(value) = self.buffer.next() {
                return Some(value);
            }

            let segment = self.set.segment_at(self.next_segment)?;
            self.next_segment += 1;

            if segment.count() == 0 {
                continue;
            }

            let mut copy = Vec::new();
            segment.snapshot_into(&mut copy);
            self.buffer = copy.into_iter();
        }
    }
}
