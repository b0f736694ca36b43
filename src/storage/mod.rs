//! Storage Module
//!
//! Persistent side of the pool: a chain of bounded segment files.
//!
//! ## Responsibilities
//! - Encode identifiers into fixed-width records on disk
//! - Track how many records each file holds
//! - Support the pool's rebalancing: append to surplus files, borrow from
//!   the tail of the last file, rewrite the active file
//!
//! ## Directory Layout
//! ```text
//! {pool_dir}/
//!   ├── objects0.object     ◄── e.g. the active file (rewritten each cycle)
//!   ├── objects1.object     ◄── surplus, at most max_per_file records
//!   └── objects3.object     ◄── gaps allowed after a file is drained
//! ```

mod manager;
pub mod segment;

pub use manager::{SegmentStore, SEGMENT_EXTENSION};
pub use segment::{SegmentHeader, SegmentLayout, SegmentReader, SegmentWriter};
