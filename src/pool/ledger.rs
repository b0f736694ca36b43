//! Read ledger
//!
//! Reference counts of identifiers currently checked out for reading.
//! An identifier is present iff its count is positive.

use std::collections::BTreeMap;

use parking_lot::{Mutex, MutexGuard};

use crate::error::{PoolError, Result};
use crate::identifier::ObjectIdentifier;

/// Sorted map of identifier → outstanding reader count
#[derive(Default)]
pub struct ReadLedger {
    readers: Mutex<BTreeMap<ObjectIdentifier, u32>>,
}

/// Held ledger lock, for check-then-register sequences
pub struct LedgerGuard<'a> {
    readers: MutexGuard<'a, BTreeMap<ObjectIdentifier, u32>>,
}

impl ReadLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the ledger lock
    pub fn lock(&self) -> LedgerGuard<'_> {
        LedgerGuard {
            readers: self.readers.lock(),
        }
    }

    /// True while `id` has outstanding reads
    pub fn is_reading(&self, id: &ObjectIdentifier) -> bool {
        self.lock().is_reading(id)
    }

    /// Outstanding reads of `id` (0 when absent)
    pub fn count(&self, id: &ObjectIdentifier) -> u32 {
        self.readers.lock().get(id).copied().unwrap_or(0)
    }

    /// Drop one read of `id`, removing the entry at zero.
    ///
    /// Returns the remaining count.
    pub fn release(&self, id: &ObjectIdentifier) -> Result<u32> {
        let mut readers = self.readers.lock();
        let count = readers
            .get_mut(id)
            .ok_or(PoolError::NotReading(*id))?;

        *count -= 1;
        let remaining = *count;
        if remaining == 0 {
            readers.remove(id);
        }
        Ok(remaining)
    }

    /// Number of distinct identifiers being read
    pub fn len(&self) -> usize {
        self.readers.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.readers.lock().is_empty()
    }
}

impl LedgerGuard<'_> {
    /// Register one more read of `id`; returns the new count
    pub fn acquire(&mut self, id: ObjectIdentifier) -> u32 {
        let count = self.readers.entry(id).or_insert(0);
        *count += 1;
        *count
    }

    pub fn is_reading(&self, id: &ObjectIdentifier) -> bool {
        self.readers.contains_key(id)
    }
}
