//! Identifier Module
//!
//! Fixed-width identifiers of objects that exist in the store under test.
//!
//! ## Layout
//! ```text
//! ┌──────────────────────────────┬──────────────┐
//! │ Payload (16, UUID halves BE) │ Reserved (2) │   = 18 bytes
//! └──────────────────────────────┴──────────────┘
//!
//! Size-aware records append the declared object size:
//! ┌──────────────────────────────┬──────────────┬─────────────┐
//! │ Payload (16)                 │ Reserved (2) │ Size u64 BE │ = 26 bytes
//! └──────────────────────────────┴──────────────┴─────────────┘
//! ```
//!
//! The size rides along with the identifier but is not part of its
//! identity: equality, ordering and hashing only look at the 18 bytes.

mod codec;

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use codec::{decode_hex, encode_hex};

/// Bytes of random payload
pub const PAYLOAD_LEN: usize = 16;

/// Encoded identifier length: payload + 2 reserved bytes
pub const ID_LEN: usize = 18;

/// Length of the big-endian size suffix
pub const SIZE_LEN: usize = 8;

/// Encoded length of identifier + size
pub const SIZED_LEN: usize = ID_LEN + SIZE_LEN;

/// Identifier of an object believed to exist in the remote store
#[derive(Clone, Copy)]
pub struct ObjectIdentifier {
    key: [u8; ID_LEN],
    size: Option<u64>,
}

impl ObjectIdentifier {
    /// A fresh identifier from a random (v4) UUID
    pub fn random() -> Self {
        Self::from_uuid(Uuid::new_v4())
    }

    /// Two 64-bit halves of the UUID, big-endian, then two zero bytes
    pub fn from_uuid(uuid: Uuid) -> Self {
        let (high, low) = uuid.as_u64_pair();
        let mut key = [0u8; ID_LEN];
        key[0..8].copy_from_slice(&high.to_be_bytes());
        key[8..16].copy_from_slice(&low.to_be_bytes());
        Self { key, size: None }
    }

    /// Wrap raw bytes (no size)
    pub const fn from_bytes(key: [u8; ID_LEN]) -> Self {
        Self { key, size: None }
    }

    /// Attach a declared object size
    pub fn with_size(mut self, size: u64) -> Self {
        self.size = Some(size);
        self
    }

    /// The 18 identity bytes
    pub fn as_bytes(&self) -> &[u8; ID_LEN] {
        &self.key
    }

    /// Declared object size, if one was recorded
    pub fn size(&self) -> Option<u64> {
        self.size
    }

    /// Lowercase hex of the identity bytes (36 chars)
    pub fn to_hex(&self) -> String {
        encode_hex(&self.key)
    }
}

impl PartialEq for ObjectIdentifier {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for ObjectIdentifier {}

impl Hash for ObjectIdentifier {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

impl PartialOrd for ObjectIdentifier {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ObjectIdentifier {
    fn cmp(&self, other: &Self) -> Ordering {
        // Unsigned lexicographic over the encoded bytes
        self.key.cmp(&other.key)
    }
}

impl fmt::Debug for ObjectIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.size {
            Some(size) => write!(f, "ObjectIdentifier({}, size={})", self.to_hex(), size),
            None => write!(f, "ObjectIdentifier({})", self.to_hex()),
        }
    }
}

impl fmt::Display for ObjectIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl From<Uuid> for ObjectIdentifier {
    fn from(uuid: Uuid) -> Self {
        Self::from_uuid(uuid)
    }
}

/// On-disk record layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordMode {
    /// 18-byte records, identifier only
    IdOnly,

    /// 26-byte records, identifier + big-endian declared size
    Sized,
}

impl RecordMode {
    /// Width of one record in bytes
    pub const fn record_len(self) -> usize {
        match self {
            RecordMode::IdOnly => ID_LEN,
            RecordMode::Sized => SIZED_LEN,
        }
    }
}
