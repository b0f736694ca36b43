//! # objpool
//!
//! A concurrent, disk-backed pool of live object identifiers for
//! object-storage load generation:
//! - Lock-striped hash set with O(1) membership and random get/remove
//! - Read ledger keeping identifiers under read away from deletes
//! - Bounded-size segment files rebalanced as the pool grows and shrinks
//! - Fixed-width identifier codec (18 bytes, or 26 with a declared size)
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │              Load-generation worker threads                 │
//! │   write_complete / acquire_for_read / get_for_delete ...    │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                      ObjectPool                             │
//! │          (persistence lock: shared / exclusive)             │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!          ┌────────────┴────────────┐
//!          │                         │
//!          ▼                         ▼
//!   ┌─────────────────┐       ┌─────────────┐
//!   │ RandomAccessSet │       │ ReadLedger  │
//!   │ (segment locks) │       │  (Mutex)    │
//!   └────────┬────────┘       └─────────────┘
//!            │  persister thread / shutdown
//!            ▼
//!   ┌─────────────────┐
//!   │  SegmentStore   │
//!   │ {prefix}N.object│
//!   └─────────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod identifier;
pub mod set;
pub mod storage;
pub mod pool;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{PoolError, Result};
pub use config::PoolConfig;
pub use identifier::{ObjectIdentifier, RecordMode};
pub use set::RandomAccessSet;
pub use storage::SegmentStore;
pub use pool::{FlushStats, ObjectPool};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of objpool
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Log filter the binaries fall back to when `RUST_LOG` is unset
pub const DEFAULT_LOG_FILTER: &str = "info,objpool=debug";
