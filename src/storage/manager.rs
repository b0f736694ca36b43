//! Segment Store
//!
//! The numbered chain of segment files belonging to one pool.
//!
//! ## Responsibilities
//! - Discover existing segment files on startup
//! - Count persisted records without loading them
//! - Append surplus identifiers, cut borrowed identifiers off the tail
//! - Atomically rewrite the active file
//!
//! Files are named `{prefix}{index}.object`. Indices start at 0 and may have
//! gaps once a middle file has been drained and deleted.

use std::fs::{self, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::config::PoolConfig;
use crate::error::{PoolError, Result};
use crate::identifier::{ObjectIdentifier, RecordMode};

use super::{SegmentReader, SegmentWriter};

/// File extension of segment files
pub const SEGMENT_EXTENSION: &str = "object";

/// Suffix of the scratch file used while rewriting
const TMP_SUFFIX: &str = ".tmp";

/// Manages the segment files of one pool directory
///
/// Not synchronized: the pool serializes every call behind its
/// persistence lock.
#[derive(Debug, Clone)]
pub struct SegmentStore {
    /// Directory where segment files are stored
    dir: PathBuf,

    /// Filename prefix
    prefix: String,

    mode: RecordMode,

    /// Write the versioned header on files this store creates
    versioned_header: bool,
}

impl SegmentStore {
    /// Open the store described by `config`, creating its directory
    pub fn open(config: &PoolConfig) -> Result<Self> {
        Self::open_dir(
            &config.pool_dir,
            &config.file_prefix,
            config.record_mode,
            config.versioned_header,
        )
    }

    /// Open a store from explicit parts, creating the directory
    pub fn open_dir(
        dir: &Path,
        prefix: &str,
        mode: RecordMode,
        versioned_header: bool,
    ) -> Result<Self> {
        fs::create_dir_all(dir)?;

        Ok(Self {
            dir: dir.to_path_buf(),
            prefix: prefix.to_string(),
            mode,
            versioned_header,
        })
    }

    /// Indices of all segment files present, ascending
    pub fn discover(&self) -> Result<Vec<u64>> {
        let mut indices = Vec::new();

        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let path = entry.path();

            if path.is_file() {
                if let Some(index) = self.parse_index(&path) {
                    indices.push(index);
                }
            }
        }

        indices.sort_unstable();
        Ok(indices)
    }

    /// Highest index present
    pub fn last_index(&self) -> Result<Option<u64>> {
        Ok(self.discover()?.last().copied())
    }

    pub fn exists(&self, index: u64) -> bool {
        self.path(index).is_file()
    }

    /// Whole records in file `index` (0 when the file is missing)
    pub fn record_count(&self, index: u64) -> Result<u64> {
        match SegmentReader::open(&self.path(index), self.mode) {
            Ok(reader) => Ok(reader.record_count()),
            Err(PoolError::Io(e)) if e.kind() == ErrorKind::NotFound => Ok(0),
            Err(e) => Err(e),
        }
    }

    /// Sum of record counts over every segment file
    pub fn saved_count(&self) -> Result<u64> {
        let mut total = 0;
        for index in self.discover()? {
            total += self.record_count(index)?;
        }
        Ok(total)
    }

    /// Every record of file `index` (empty when the file is missing)
    pub fn load(&self, index: u64) -> Result<Vec<ObjectIdentifier>> {
        match SegmentReader::open(&self.path(index), self.mode) {
            Ok(mut reader) => reader.read_all(),
            Err(PoolError::Io(e)) if e.kind() == ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }

    /// Append records to file `index`, creating it if needed.
    ///
    /// Returns the record count after the append.
    /// On failure the file is cut back to its previous length, so callers
    /// can put `ids` back in memory without creating duplicates.
    pub fn append(&self, index: u64, ids: &[ObjectIdentifier]) -> Result<u64> {
        let path = self.path(index);
        let mut writer = SegmentWriter::open_append(&path, self.mode, self.versioned_header)?;
        let rollback_len = writer.rollback_len();

        let result = match writer.append_all(ids) {
            Ok(()) => writer.finish(),
            Err(e) => Err(e),
        };

        if result.is_err() {
            Self::cut_back(&path, rollback_len);
        }
        result
    }

    /// Cut up to `n` records off the end of file `index`.
    ///
    /// A file left with no records is deleted.
    pub fn take_tail(&self, index: u64, n: u64) -> Result<Vec<ObjectIdentifier>> {
        let path = self.path(index);
        let (tail, remaining) = SegmentWriter::truncate_tail(&path, self.mode, n)?;

        if remaining == 0 {
            tracing::debug!(index, "Segment file drained, removing");
            fs::remove_file(&path)?;
        }

        Ok(tail)
    }

    /// Replace the contents of file `index` with `ids`.
    ///
    /// Written to a scratch file, fsynced, then renamed over the target, so
    /// a crash leaves either the old or the new contents.
    pub fn rewrite<'a, I>(&self, index: u64, ids: I) -> Result<u64>
    where
        I: IntoIterator<Item = &'a ObjectIdentifier>,
    {
        let path = self.path(index);
        let tmp_path = Self::tmp_path(&path);

        let written = SegmentWriter::create(&tmp_path, self.mode, self.versioned_header)
            .and_then(|mut writer| {
                writer.append_all(ids)?;
                writer.finish()
            })
            .and_then(|count| {
                fs::rename(&tmp_path, &path)?;
                Ok(count)
            });

        if written.is_err() {
            Self::discard(&tmp_path);
        }
        written
    }

    /// Delete file `index` if present
    pub fn remove(&self, index: u64) -> Result<()> {
        match fs::remove_file(self.path(index)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn mode(&self) -> RecordMode {
        self.mode
    }

    /// Generate the file path for segment `index`
    pub fn path(&self, index: u64) -> PathBuf {
        self.dir
            .join(format!("{}{}.{}", self.prefix, index, SEGMENT_EXTENSION))
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    /// Parse the index from a segment filename
    /// "objects42.object" → Some(42); "objects042.object" → None
    fn parse_index(&self, path: &Path) -> Option<u64> {
        let name = path.file_name()?.to_str()?;
        let digits = name
            .strip_prefix(self.prefix.as_str())?
            .strip_suffix(SEGMENT_EXTENSION)?
            .strip_suffix('.')?;

        let index: u64 = digits.parse().ok()?;
        // Only the canonical spelling maps back to the same path
        (index.to_string() == digits).then_some(index)
    }

    /// Best-effort undo of a failed append
    fn cut_back(path: &Path, len: u64) {
        let outcome = OpenOptions::new()
            .write(true)
            .open(path)
            .and_then(|file| file.set_len(len));

        if let Err(e) = outcome {
            tracing::error!(
                path = %path.display(),
                error = %e,
                "Could not roll back failed segment append"
            );
        }
    }

    /// Remove a scratch file left by a failed rewrite
    fn discard(path: &Path) {
        match fs::remove_file(path) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => tracing::error!(
                path = %path.display(),
                error = %e,
                "Could not remove scratch file after failed rewrite"
            ),
        }
    }

    fn tmp_path(path: &Path) -> PathBuf {
        let mut name = path.as_os_str().to_os_string();
        name.push(TMP_SUFFIX);
        PathBuf::from(name)
    }
}
