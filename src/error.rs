//! Error types for objpool
//!
//! Provides a unified error type for all pool operations.

use thiserror::Error;

use crate::identifier::ObjectIdentifier;

/// Result type alias using PoolError
pub type Result<T> = std::result::Result<T, PoolError>;

/// Unified error type for objpool operations
#[derive(Debug, Error)]
pub enum PoolError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Pool Errors
    // -------------------------------------------------------------------------
    /// Nothing left to read or delete, in memory or on disk
    #[error("Object pool is empty")]
    EmptyPool,

    /// `release_from_read` without a matching `acquire_for_read`
    #[error("Identifier {0} has no outstanding reads")]
    NotReading(ObjectIdentifier),

    #[error("Object pool has been shut down")]
    Closed,

    // -------------------------------------------------------------------------
    // Identifier Errors
    // -------------------------------------------------------------------------
    #[error("Malformed identifier: {0}")]
    MalformedIdentifier(String),

    // -------------------------------------------------------------------------
    // Storage Errors
    // -------------------------------------------------------------------------
    #[error("Storage error: {0}")]
    Storage(String),

    // -------------------------------------------------------------------------
    // Serialization Errors
    // -------------------------------------------------------------------------
    #[error("Serialization error: {0}")]
    Serialization(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<bincode::Error> for PoolError {
    fn from(e: bincode::Error) -> Self {
        PoolError::Serialization(e.to_string())
    }
}
