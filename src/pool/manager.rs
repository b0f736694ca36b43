//! Pool Manager
//!
//! The object identity pool: which identifiers exist in the store under
//! test, which are checked out for reading, and how that state survives
//! restarts.
//!
//! ## Responsibilities
//! - Register identifiers of newly written objects
//! - Hand out live identifiers for reads (shared) and deletes (exclusive)
//! - Never hand an identifier under read to a delete
//! - Persist the available pool through the segment store on a schedule
//!   and once more at shutdown

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::config::PoolConfig;
use crate::error::{PoolError, Result};
use crate::identifier::ObjectIdentifier;
use crate::set::RandomAccessSet;
use crate::storage::SegmentStore;

use super::ledger::ReadLedger;
use super::persister::Persister;
use super::rebalance::{BorrowFrom, FlushStats};
use super::start::{RandomStart, StartFileChooser};

/// Concurrent, disk-backed registry of live object identifiers
///
/// ## Lock Order
/// persistence lock → ledger lock → set segment lock
///
/// - `write_complete` / `get_for_delete` hold the persistence lock shared
///   for their one pool mutation
/// - The flush cycle holds it exclusively
/// - `acquire_for_read` holds the ledger lock while re-checking that its
///   pick is still available, so a delete that removed it either sees the
///   registration or forces the read to pick again
pub struct ObjectPool {
    inner: Arc<PoolInner>,

    /// Background persistence thread; `None` once stopped
    persister: Mutex<Option<Persister>>,
}

/// State shared between the pool handle and its persistence thread
pub(crate) struct PoolInner {
    pub(crate) config: PoolConfig,

    pub(crate) store: SegmentStore,

    /// Identifiers believed live and not checked out for deletion
    pub(crate) available: RandomAccessSet<ObjectIdentifier>,

    ledger: ReadLedger,

    /// Segment file this process rewrites on every flush
    pub(crate) active_index: u64,

    /// Shared by pool mutations, exclusive for a flush
    persist_lock: RwLock<()>,

    closed: AtomicBool,
}

/// What a refill found once it held the exclusive lock
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Refill {
    /// Identifiers came back from disk
    Borrowed,
    /// Nothing on disk to borrow, but memory is not empty
    InMemory,
    /// Nothing anywhere
    Empty,
}

impl ObjectPool {
    /// Open a pool, picking a random existing file as the active one
    pub fn open(config: PoolConfig) -> Result<Self> {
        Self::open_with(config, &RandomStart)
    }

    /// Open a pool with an explicit start-file policy
    ///
    /// On startup:
    /// 1. Validate the config and open the segment directory
    /// 2. Choose the active file among those on disk
    /// 3. Load the active file into memory
    /// 4. Start the background persistence thread
    pub fn open_with(config: PoolConfig, chooser: &dyn StartFileChooser) -> Result<Self> {
        // Step 1: Config and directory
        config.validate()?;
        let store = SegmentStore::open(&config)?;

        // Step 2: Active file
        let existing = store.discover()?;
        let active_index = chooser.choose(&existing);

        // Step 3: Load it
        let loaded = store.load(active_index)?;
        let available = RandomAccessSet::with_capacity_and_segments(
            config.initial_capacity.max(loaded.len()),
            config.segment_count,
        );
        for id in loaded {
            available.insert(id);
        }

        tracing::info!(
            dir = %store.dir().display(),
            files = existing.len(),
            active_index,
            loaded = available.len(),
            "Object pool opened"
        );

        let interval = config.persist_interval;
        let inner = Arc::new(PoolInner {
            config,
            store,
            available,
            ledger: ReadLedger::new(),
            active_index,
            persist_lock: RwLock::new(()),
            closed: AtomicBool::new(false),
        });

        // Step 4: Persistence thread
        let persister = Persister::spawn(Arc::clone(&inner), interval)?;

        Ok(Self {
            inner,
            persister: Mutex::new(Some(persister)),
        })
    }

    // =========================================================================
    // Pool Contract
    // =========================================================================

    /// Register the identifier of a newly written object
    pub fn write_complete(&self, id: ObjectIdentifier) -> Result<()> {
        let _shared = self.inner.persist_lock.read();
        self.inner.ensure_open()?;

        if !self.inner.available.insert(id) {
            tracing::trace!(id = %id, "Identifier already in pool");
        }
        Ok(())
    }

    /// Check out some live identifier for reading, without removing it.
    ///
    /// Reads of the same identifier stack; each needs its own
    /// `release_from_read`, otherwise the identifier can never be deleted.
    pub fn acquire_for_read(&self) -> Result<ObjectIdentifier> {
        self.inner.ensure_open()?;

        loop {
            if let Some(id) = self.inner.pick_for_read() {
                return Ok(id);
            }
            // Any identifier will do for a read, so only a truly empty pool fails
            if self.inner.refill()? == Refill::Empty {
                return Err(PoolError::EmptyPool);
            }
        }
    }

    /// Return one read of `id`
    pub fn release_from_read(&self, id: &ObjectIdentifier) -> Result<()> {
        self.inner.ledger.release(id).map(|_| ())
    }

    /// Remove and return some identifier that no one is reading
    pub fn get_for_delete(&self) -> Result<ObjectIdentifier> {
        let mut last_pass = false;

        loop {
            {
                let _shared = self.inner.persist_lock.read();
                self.inner.ensure_open()?;

                if let Some(id) = self.inner.pick_for_delete() {
                    return Ok(id);
                }
            }

            if last_pass {
                return Err(PoolError::EmptyPool);
            }

            match self.inner.refill()? {
                Refill::Borrowed => {}
                // Identifiers left in memory: one more pass in case a
                // racing delete was holding them aside; after that they
                // are all under read
                Refill::InMemory => last_pass = true,
                Refill::Empty => return Err(PoolError::EmptyPool),
            }
        }
    }

    /// Records across all segment files on disk.
    ///
    /// Identifiers only in memory are not counted until the next flush.
    pub fn saved_count(&self) -> Result<u64> {
        let _shared = self.inner.persist_lock.read();
        self.inner.store.saved_count()
    }

    /// Run one rebalance-and-flush cycle now
    pub fn flush(&self) -> Result<FlushStats> {
        self.inner.ensure_open()?;
        self.inner.persist()
    }

    /// Stop the persistence thread and flush one final time.
    ///
    /// Mutating calls fail with `Closed` afterwards. Calling it again is a
    /// no-op.
    pub fn shutdown(&self) -> Result<()> {
        if self.inner.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        if let Some(persister) = self.persister.lock().take() {
            persister.stop();
        }

        let stats = self.inner.persist()?;
        tracing::info!(
            drained = stats.drained,
            borrowed = stats.borrowed,
            written = stats.written,
            "Object pool shut down"
        );
        Ok(())
    }

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    /// Identifiers currently in memory
    pub fn available_len(&self) -> usize {
        self.inner.available.len()
    }

    /// Distinct identifiers with outstanding reads
    pub fn reading_len(&self) -> usize {
        self.inner.ledger.len()
    }

    /// Outstanding reads of `id`
    pub fn read_count(&self, id: &ObjectIdentifier) -> u32 {
        self.inner.ledger.count(id)
    }

    pub fn active_index(&self) -> u64 {
        self.inner.active_index
    }

    pub fn config(&self) -> &PoolConfig {
        &self.inner.config
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }
}

impl Drop for ObjectPool {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            tracing::error!(error = %e, "Final flush failed while dropping object pool");
        }
    }
}

impl PoolInner {
    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(PoolError::Closed);
        }
        Ok(())
    }

    /// Rebalance and flush under the exclusive persistence lock
    pub(crate) fn persist(&self) -> Result<FlushStats> {
        let _exclusive = self.persist_lock.write();
        self.persist_locked()
    }

    /// Pull identifiers back from disk into an empty-looking pool.
    ///
    /// Borrows from the highest-numbered file other than the active one, so
    /// a cold start on a small file can still reach everything on disk.
    /// Runs under the exclusive lock, so deletes have put back every
    /// candidate they were holding aside by the time memory is inspected.
    fn refill(&self) -> Result<Refill> {
        let _exclusive = self.persist_lock.write();
        self.ensure_open()?;

        let need = self.config.max_per_file.saturating_sub(self.available.len());
        if need > 0 {
            let borrowed = self.borrow(need, BorrowFrom::AnyInactive)?;
            if borrowed > 0 {
                self.write_active()?;
                tracing::debug!(borrowed, "Refilled empty pool from disk");
                return Ok(Refill::Borrowed);
            }
        }

        if self.available.is_empty() {
            Ok(Refill::Empty)
        } else {
            Ok(Refill::InMemory)
        }
    }

    /// Random available identifier, registered in the ledger
    fn pick_for_read(&self) -> Option<ObjectIdentifier> {
        loop {
            let candidate = self.available.random_get()?;

            let mut ledger = self.ledger.lock();
            // A delete may have taken it between the pick and the lock
            if !self.available.contains(&candidate) {
                continue;
            }
            ledger.acquire(candidate);
            return Some(candidate);
        }
    }

    /// Random available identifier with no outstanding reads, removed.
    ///
    /// Candidates under read are held aside and put back once the search
    /// ends, so the search runs out instead of cycling over them.
    fn pick_for_delete(&self) -> Option<ObjectIdentifier> {
        let mut rejected = Vec::new();

        let found = loop {
            let Some(candidate) = self.available.random_remove() else {
                break None;
            };

            if self.ledger.lock().is_reading(&candidate) {
                rejected.push(candidate);
                continue;
            }
            break Some(candidate);
        };

        for id in rejected {
            self.available.insert(id);
        }
        found
    }
}
