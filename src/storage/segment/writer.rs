//! Segment Writer
//!
//! Creates, appends to and truncates segment files.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use bytes::BytesMut;

use crate::error::{PoolError, Result};
use crate::identifier::{ObjectIdentifier, RecordMode};

use super::{inspect, SegmentHeader, SegmentReader};

/// Appends fixed-width records to a segment file
pub struct SegmentWriter {
    path: PathBuf,
    writer: BufWriter<File>,
    mode: RecordMode,
    /// Whole records in the file, including those written by this writer
    record_count: u64,
    /// File length to cut back to if this writer's appends must be undone
    rollback_len: u64,
    /// Reused encode buffer
    buf: BytesMut,
}

impl SegmentWriter {
    /// Create (or truncate) a segment file
    ///
    /// Writes the header immediately when `with_header` is set.
    pub fn create(path: &Path, mode: RecordMode, with_header: bool) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;

        let mut writer = BufWriter::new(file);
        if with_header {
            writer.write_all(&SegmentHeader::new(mode).encode()?)?;
        }

        Ok(Self {
            path: path.to_path_buf(),
            writer,
            mode,
            record_count: 0,
            rollback_len: 0,
            buf: BytesMut::new(),
        })
    }

    /// Open a segment file for appending, creating it if missing.
    ///
    /// An existing file keeps its own layout (headed or legacy). A torn
    /// trailing record left by a crash is cut off first.
    pub fn open_append(path: &Path, mode: RecordMode, with_header: bool) -> Result<Self> {
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(path)?;

        let layout = inspect(&mut file, mode)?;

        if layout.torn_bytes > 0 {
            tracing::warn!(
                path = %path.display(),
                torn_bytes = layout.torn_bytes,
                "Cutting partial trailing record from segment file"
            );
            file.set_len(layout.data_end())?;
        }

        let fresh = layout.data_end() == 0;
        file.seek(SeekFrom::Start(layout.data_end()))?;

        let mut writer = BufWriter::new(file);
        if fresh && with_header {
            writer.write_all(&SegmentHeader::new(mode).encode()?)?;
        }

        Ok(Self {
            path: path.to_path_buf(),
            writer,
            mode,
            record_count: layout.record_count,
            rollback_len: layout.data_end(),
            buf: BytesMut::new(),
        })
    }

    /// Append one record
    pub fn append(&mut self, id: &ObjectIdentifier) -> Result<()> {
        self.buf.clear();
        self.mode.encode_into(id, &mut self.buf);
        self.writer.write_all(&self.buf)?;
        self.record_count += 1;
        Ok(())
    }

    /// Append every record in `ids`
    pub fn append_all<'a, I>(&mut self, ids: I) -> Result<()>
    where
        I: IntoIterator<Item = &'a ObjectIdentifier>,
    {
        for id in ids {
            self.append(id)?;
        }
        Ok(())
    }

    /// Records in the file so far
    pub fn record_count(&self) -> u64 {
        self.record_count
    }

    /// Length of the file before this writer appended anything
    pub fn rollback_len(&self) -> u64 {
        self.rollback_len
    }

    /// Flush and fsync; returns the final record count
    pub fn finish(self) -> Result<u64> {
        let file = self.writer.into_inner().map_err(|e| {
            PoolError::Storage(format!(
                "Failed to flush segment {}: {}",
                self.path.display(),
                e
            ))
        })?;
        file.sync_all()?;
        Ok(self.record_count)
    }

    /// Cut the last `n` records off a segment file and return them.
    ///
    /// Returns the records in file order together with the number of whole
    /// records left behind.
    pub fn truncate_tail(
        path: &Path,
        mode: RecordMode,
        n: u64,
    ) -> Result<(Vec<ObjectIdentifier>, u64)> {
        let mut reader = SegmentReader::open(path, mode)?;
        let layout = reader.layout();
        let tail = reader.read_tail(n)?;
        drop(reader);

        let remaining = layout.record_count - tail.len() as u64;
        let file = OpenOptions::new().write(true).open(path)?;
        file.set_len(layout.record_offset(remaining))?;
        file.sync_all()?;

        Ok((tail, remaining))
    }
}
