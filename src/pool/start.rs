//! Start-file selection
//!
//! Which existing segment file becomes the active one on cold start. Kept
//! behind a trait so tests can pin the choice.

use rand::seq::SliceRandom;

/// Chooses the active segment index from the indices found on disk
pub trait StartFileChooser: Send + Sync {
    /// `existing` is ascending and may be empty
    fn choose(&self, existing: &[u64]) -> u64;
}

/// Any existing file, uniformly at random; 0 for an empty directory
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomStart;

impl StartFileChooser for RandomStart {
    fn choose(&self, existing: &[u64]) -> u64 {
        existing
            .choose(&mut rand::thread_rng())
            .copied()
            .unwrap_or(0)
    }
}

/// Always the given index, whether or not it exists yet
#[derive(Debug, Clone, Copy)]
pub struct FixedStart(pub u64);

impl StartFileChooser for FixedStart {
    fn choose(&self, _existing: &[u64]) -> u64 {
        self.0
    }
}

/// The highest existing index (0 when empty)
#[derive(Debug, Default, Clone, Copy)]
pub struct LastStart;

impl StartFileChooser for LastStart {
    fn choose(&self, existing: &[u64]) -> u64 {
        existing.last().copied().unwrap_or(0)
    }
}
