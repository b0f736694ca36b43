//! Segment File Module
//!
//! Flat files of fixed-width identifier records.
//!
//! ## File Format
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │ Header (8 bytes, optional; absent in legacy files)      │
//! │   Magic: "OBJP" (4) | Version: u16 (2) | RecordLen (2)  │
//! ├─────────────────────────────────────────────────────────┤
//! │ Records (record_len each, no separators)                │
//! │   [Identifier (18)]                 IdOnly mode         │
//! │   [Identifier (18)][Size u64 BE (8)] Sized mode         │
//! │   ... repeated ...                                      │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! Record count is derived from the file length, so the tail can be cut
//! off with a plain truncate. A file starting with the magic is headed;
//! anything else is a legacy file. A legacy record would need its first
//! four random payload bytes to spell the magic to be misread.

mod reader;
mod writer;

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};

use serde::{Deserialize, Serialize};

use crate::error::{PoolError, Result};
use crate::identifier::RecordMode;

pub use reader::SegmentReader;
pub use writer::SegmentWriter;

// =============================================================================
// Shared Constants (used by reader and writer)
// =============================================================================

/// Magic bytes identifying a versioned segment file
pub(crate) const MAGIC: [u8; 4] = *b"OBJP";

/// Current segment format version
pub(crate) const VERSION: u16 = 1;

/// Header size: Magic (4) + Version (2) + RecordLen (2) = 8 bytes
pub(crate) const HEADER_SIZE: u64 = 8;

// =============================================================================
// Header
// =============================================================================

/// Versioned header, bincode-encoded (fixed-width little-endian fields)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentHeader {
    pub magic: [u8; 4],
    pub version: u16,
    pub record_len: u16,
}

impl SegmentHeader {
    pub fn new(mode: RecordMode) -> Self {
        Self {
            magic: MAGIC,
            version: VERSION,
            record_len: mode.record_len() as u16,
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        let bytes = bincode::serialize(self)?;
        debug_assert_eq!(bytes.len() as u64, HEADER_SIZE);
        Ok(bytes)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        Ok(bincode::deserialize(bytes)?)
    }
}

// =============================================================================
// Layout
// =============================================================================

/// How the bytes of one segment file divide into header and records
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentLayout {
    /// 0 for legacy files, [`HEADER_SIZE`] otherwise
    pub header_len: u64,
    pub record_len: u64,
    /// Whole records present
    pub record_count: u64,
    /// Bytes of a partially written trailing record
    pub torn_bytes: u64,
}

impl SegmentLayout {
    /// Offset just past the last whole record
    pub fn data_end(&self) -> u64 {
        self.header_len + self.record_count * self.record_len
    }

    /// Offset of record `index`
    pub fn record_offset(&self, index: u64) -> u64 {
        self.header_len + index * self.record_len
    }

    pub fn has_header(&self) -> bool {
        self.header_len > 0
    }
}

/// Work out the layout of an open segment file.
///
/// Leaves the file position unspecified.
pub fn inspect(file: &mut File, mode: RecordMode) -> Result<SegmentLayout> {
    let file_len = file.metadata()?.len();
    let record_len = mode.record_len() as u64;

    let mut header_len = 0;
    if file_len >= HEADER_SIZE {
        let mut raw = [0u8; HEADER_SIZE as usize];
        file.seek(SeekFrom::Start(0))?;
        file.read_exact(&mut raw)?;

        if raw[0..4] == MAGIC {
            let header = SegmentHeader::decode(&raw)?;
            if header.version != VERSION {
                return Err(PoolError::Storage(format!(
                    "Unsupported segment version: {}",
                    header.version
                )));
            }
            if u64::from(header.record_len) != record_len {
                return Err(PoolError::Storage(format!(
                    "Segment record width {} does not match configured {:?} ({} bytes)",
                    header.record_len, mode, record_len
                )));
            }
            header_len = HEADER_SIZE;
        }
    }

    let data_len = file_len - header_len;
    Ok(SegmentLayout {
        header_len,
        record_len,
        record_count: data_len / record_len,
        torn_bytes: data_len % record_len,
    })
}
