//! Object Identity Pool Module
//!
//! The manager that load-generation workers talk to.
//!
//! ## Flow
//! ```text
//!   write done ──► write_complete(id) ──► available ◄──┐
//!                                           │          │ borrow
//!   read  ──► acquire_for_read ─► ledger +1 │          │
//!   read done ──► release_from_read ─► -1   │ drain    │
//!                                           ▼          │
//!   delete ──► get_for_delete (skips ids in ledger)  segment files
//!                                                   {prefix}{n}.object
//! ```
//!
//! A background thread runs the rebalance-and-flush cycle every
//! `persist_interval`; `shutdown()` stops it and flushes once more inline.

mod ledger;
mod manager;
mod persister;
mod rebalance;
mod start;

pub use ledger::ReadLedger;
pub use manager::ObjectPool;
pub use rebalance::FlushStats;
pub use start::{FixedStart, LastStart, RandomStart, StartFileChooser};
