//! Rebalance-and-flush cycle
//!
//! Keeps every segment file at or under `max_per_file` records while the
//! in-memory pool grows and shrinks:
//!
//! ```text
//!  available.len() > max      available.len() < max        always
//!  ─────────────────────      ─────────────────────        ──────
//!  drain surplus into the     borrow records from the      rewrite the
//!  last file (or a new one)   tail of the last file        active file
//! ```
//!
//! Every function here expects the caller to hold the persistence lock
//! exclusively.

use crate::error::Result;
use crate::identifier::ObjectIdentifier;

use super::manager::PoolInner;

/// Where a borrow may take records from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BorrowFrom {
    /// Only the highest-numbered file, and only if it is not the active one
    LastFile,
    /// The highest-numbered file that is not the active one
    AnyInactive,
}

/// What one persistence cycle moved
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FlushStats {
    /// Identifiers moved from memory into surplus files
    pub drained: usize,
    /// Identifiers moved from the last file into memory
    pub borrowed: usize,
    /// Records in the active file after the rewrite
    pub written: u64,
}

impl PoolInner {
    /// One full rebalance + active-file rewrite
    pub(crate) fn persist_locked(&self) -> Result<FlushStats> {
        let max = self.config.max_per_file;
        let current = self.available.len();
        let mut stats = FlushStats::default();

        if current > max {
            stats.drained = self.drain_surplus(current - max)?;
        } else if current < max {
            stats.borrowed = self.borrow(max - current, BorrowFrom::LastFile)?;
        }

        stats.written = self.write_active()?;
        Ok(stats)
    }

    /// Rewrite the active file from the in-memory pool.
    ///
    /// An empty pool removes the active file instead of leaving an empty one.
    pub(crate) fn write_active(&self) -> Result<u64> {
        let snapshot = self.available.snapshot();
        if snapshot.is_empty() {
            self.store.remove(self.active_index)?;
            return Ok(0);
        }
        self.store.rewrite(self.active_index, &snapshot)
    }

    /// Move `surplus` identifiers out of memory into non-active files.
    ///
    /// Each identifier leaves the set before it is written, so a crash can
    /// lose the unwritten part of a batch but never duplicate it.
    fn drain_surplus(&self, mut surplus: usize) -> Result<usize> {
        let mut drained = 0;

        while surplus > 0 {
            let (target, room) = self.surplus_target()?;
            let want = surplus.min(room);

            let mut batch: Vec<ObjectIdentifier> = Vec::with_capacity(want);
            for id in self.available.iter() {
                if batch.len() == want {
                    break;
                }
                if let Some(stored) = self.available.take(&id) {
                    batch.push(stored);
                }
            }

            if batch.is_empty() {
                break;
            }

            if let Err(e) = self.store.append(target, &batch) {
                // The append was rolled back on disk; memory gets them back
                for id in batch {
                    self.available.insert(id);
                }
                return Err(e);
            }

            tracing::debug!(file = target, count = batch.len(), "Drained surplus identifiers");
            surplus -= batch.len();
            drained += batch.len();
        }

        Ok(drained)
    }

    /// File to append surplus to, and how many records it can take.
    ///
    /// The last file if it is neither active nor full, else a new file past
    /// both the last and the active index.
    fn surplus_target(&self) -> Result<(u64, usize)> {
        let max = self.config.max_per_file;
        let last = self.store.last_index()?;

        if let Some(last) = last {
            if last != self.active_index {
                let count = self.store.record_count(last)? as usize;
                if count < max {
                    return Ok((last, max - count));
                }
            }
        }

        let next = last.unwrap_or(0).max(self.active_index) + 1;
        Ok((next, max))
    }

    /// Pull up to `need` identifiers off the tail of a donor file into memory
    pub(crate) fn borrow(&self, need: usize, from: BorrowFrom) -> Result<usize> {
        let existing = self.store.discover()?;

        let donor = match from {
            BorrowFrom::LastFile => existing
                .last()
                .copied()
                .filter(|&last| last != self.active_index),
            BorrowFrom::AnyInactive => existing
                .iter()
                .rev()
                .copied()
                .find(|&index| index != self.active_index),
        };

        let Some(donor) = donor else {
            return Ok(0);
        };

        let ids = self.store.take_tail(donor, need as u64)?;
        for id in &ids {
            self.available.insert(*id);
        }

        tracing::debug!(file = donor, count = ids.len(), "Borrowed identifiers from segment file");
        Ok(ids.len())
    }
}
