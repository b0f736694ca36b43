//! Segment Reader
//!
//! Reads whole-record ranges out of a segment file. A torn trailing record
//! is ignored here; the writer repairs it.

use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use crate::error::Result;
use crate::identifier::{ObjectIdentifier, RecordMode};

use super::{inspect, SegmentLayout};

/// Records read per buffered chunk
const READ_CHUNK_RECORDS: u64 = 4096;

/// Reader for one segment file
pub struct SegmentReader {
    file: BufReader<File>,
    layout: SegmentLayout,
    mode: RecordMode,
}

impl SegmentReader {
    /// Open a segment file and work out its layout
    pub fn open(path: &Path, mode: RecordMode) -> Result<Self> {
        let mut file = File::open(path)?;
        let layout = inspect(&mut file, mode)?;

        Ok(Self {
            file: BufReader::new(file),
            layout,
            mode,
        })
    }

    pub fn layout(&self) -> SegmentLayout {
        self.layout
    }

    /// Whole records in the file
    pub fn record_count(&self) -> u64 {
        self.layout.record_count
    }

    /// Every record, in file order
    pub fn read_all(&mut self) -> Result<Vec<ObjectIdentifier>> {
        self.read_range(0, self.layout.record_count)
    }

    /// The last `n` records (fewer if the file is shorter), in file order
    pub fn read_tail(&mut self, n: u64) -> Result<Vec<ObjectIdentifier>> {
        let n = n.min(self.layout.record_count);
        self.read_range(self.layout.record_count - n, n)
    }

    /// `count` records starting at record `first`
    fn read_range(&mut self, first: u64, count: u64) -> Result<Vec<ObjectIdentifier>> {
        let record_len = self.layout.record_len as usize;
        let mut ids = Vec::with_capacity(count as usize);

        self.file
            .seek(SeekFrom::Start(self.layout.record_offset(first)))?;

        let mut remaining = count;
        let mut chunk = Vec::new();
        while remaining > 0 {
            let batch = remaining.min(READ_CHUNK_RECORDS);
            chunk.resize(batch as usize * record_len, 0);
            self.file.read_exact(&mut chunk)?;

            for record in chunk.chunks_exact(record_len) {
                ids.push(self.mode.decode(record)?);
            }
            remaining -= batch;
        }

        Ok(ids)
    }
}
