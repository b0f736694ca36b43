//! Configuration for objpool
//!
//! Centralized configuration with sensible defaults. The struct derives
//! serde so an outer configuration loader can hand it over as-is.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{PoolError, Result};
use crate::identifier::RecordMode;

/// Main configuration for an object pool instance
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    // -------------------------------------------------------------------------
    // Segment File Configuration
    // -------------------------------------------------------------------------
    /// Directory holding the segment files
    /// Internal structure:
    ///   {pool_dir}/
    ///     ├── {prefix}0.object
    ///     ├── {prefix}1.object
    ///     └── ...
    pub pool_dir: PathBuf,

    /// Filename prefix shared by every segment file
    pub file_prefix: String,

    /// Maximum number of identifier records per segment file
    pub max_per_file: usize,

    /// Record layout: identifier only, or identifier + declared size
    pub record_mode: RecordMode,

    /// Write the versioned header on newly written files.
    /// Headerless (legacy) files are always readable.
    pub versioned_header: bool,

    // -------------------------------------------------------------------------
    // Persistence Configuration
    // -------------------------------------------------------------------------
    /// Period of the background rebalance-and-flush cycle
    pub persist_interval: Duration,

    // -------------------------------------------------------------------------
    // In-Memory Set Configuration
    // -------------------------------------------------------------------------
    /// Number of independently locked segments (power of two)
    pub segment_count: usize,

    /// Initial capacity hint, spread across segments
    pub initial_capacity: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            pool_dir: PathBuf::from("./objpool_data"),
            file_prefix: "objects".to_string(),
            max_per_file: 1_000_000,
            record_mode: RecordMode::IdOnly,
            versioned_header: true,
            persist_interval: Duration::from_secs(60),
            segment_count: 16,
            initial_capacity: 1024,
        }
    }
}

impl PoolConfig {
    /// Create a new config builder
    pub fn builder() -> PoolConfigBuilder {
        PoolConfigBuilder::default()
    }

    /// Check the values an outer loader could have gotten wrong
    pub fn validate(&self) -> Result<()> {
        if self.max_per_file == 0 {
            return Err(PoolError::Config(
                "max_per_file must be greater than zero".to_string(),
            ));
        }

        if self.file_prefix.is_empty() {
            return Err(PoolError::Config("file_prefix must not be empty".to_string()));
        }

        if self
            .file_prefix
            .chars()
            .any(|c| c == '/' || c == '\\' || c.is_ascii_digit())
        {
            // A trailing digit would make "{prefix}{index}" ambiguous
            return Err(PoolError::Config(format!(
                "file_prefix {:?} must not contain path separators or digits",
                self.file_prefix
            )));
        }

        if self.persist_interval.is_zero() {
            return Err(PoolError::Config(
                "persist_interval must be non-zero".to_string(),
            ));
        }

        if self.segment_count == 0 || !self.segment_count.is_power_of_two() {
            return Err(PoolError::Config(format!(
                "segment_count must be a power of two, got {}",
                self.segment_count
            )));
        }

        Ok(())
    }
}

/// Builder for PoolConfig
#[derive(Default)]
pub struct PoolConfigBuilder {
    config: PoolConfig,
}

impl PoolConfigBuilder {
    /// Set the directory holding segment files
    pub fn pool_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pool_dir = path.into();
        self
    }

    /// Set the segment filename prefix
    pub fn file_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.file_prefix = prefix.into();
        self
    }

    /// Set the maximum number of records per segment file
    pub fn max_per_file(mut self, count: usize) -> Self {
        self.config.max_per_file = count;
        self
    }

    /// Set the record layout
    pub fn record_mode(mut self, mode: RecordMode) -> Self {
        self.config.record_mode = mode;
        self
    }

    /// Enable or disable the versioned header on new files
    pub fn versioned_header(mut self, enabled: bool) -> Self {
        self.config.versioned_header = enabled;
        self
    }

    /// Set the background persistence period
    pub fn persist_interval(mut self, interval: Duration) -> Self {
        self.config.persist_interval = interval;
        self
    }

    /// Set the number of set segments (concurrency level)
    pub fn segment_count(mut self, count: usize) -> Self {
        self.config.segment_count = count;
        self
    }

    /// Set the initial in-memory capacity hint
    pub fn initial_capacity(mut self, capacity: usize) -> Self {
        self.config.initial_capacity = capacity;
        self
    }

    pub fn build(self) -> PoolConfig {
        self.config
    }
}
