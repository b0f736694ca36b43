//! Identifier codec
//!
//! Fixed-width binary and hex forms of [`ObjectIdentifier`]. Every decode
//! checks the exact width; nothing is padded or truncated to fit.

use bytes::{Buf, BufMut};

use crate::error::{PoolError, Result};

use super::{ObjectIdentifier, RecordMode, ID_LEN, SIZED_LEN};

const HEX_DIGITS: &[u8; 16] = b"0123456789abcdef";

impl ObjectIdentifier {
    /// Parse the 36-char hex form of an identifier
    pub fn from_hex(name_hex: &str) -> Result<Self> {
        let bytes = decode_hex(name_hex)?;
        Self::decode(&bytes)
    }

    /// Parse a hex name and attach a declared size
    ///
    /// The size arrives signed from the outside (e.g. a Content-Length
    /// header parsed as i64); negative values are rejected.
    pub fn encode_with_size(name_hex: &str, size: i64) -> Result<Self> {
        if size < 0 {
            return Err(PoolError::MalformedIdentifier(format!(
                "negative object size {} for {}",
                size, name_hex
            )));
        }
        Ok(Self::from_hex(name_hex)?.with_size(size as u64))
    }

    /// Decode exactly [`ID_LEN`] bytes
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let key: [u8; ID_LEN] = bytes.try_into().map_err(|_| {
            PoolError::MalformedIdentifier(format!(
                "expected {} bytes, got {}",
                ID_LEN,
                bytes.len()
            ))
        })?;
        Ok(Self::from_bytes(key))
    }

    /// Decode exactly [`SIZED_LEN`] bytes: identifier then big-endian size
    pub fn decode_sized(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != SIZED_LEN {
            return Err(PoolError::MalformedIdentifier(format!(
                "expected {} bytes, got {}",
                SIZED_LEN,
                bytes.len()
            )));
        }

        let mut buf = bytes;
        let mut key = [0u8; ID_LEN];
        buf.copy_to_slice(&mut key);
        let size = buf.get_u64();

        Ok(Self::from_bytes(key).with_size(size))
    }

    /// The 18-byte encoded form
    pub fn encode(&self) -> [u8; ID_LEN] {
        *self.as_bytes()
    }

    /// The 26-byte encoded form; a missing size is written as 0
    pub fn encode_sized(&self) -> [u8; SIZED_LEN] {
        let mut out = [0u8; SIZED_LEN];
        let mut buf = &mut out[..];
        buf.put_slice(self.as_bytes());
        buf.put_u64(self.size().unwrap_or(0));
        out
    }
}

impl RecordMode {
    /// Append one record for `id` to `buf`
    pub fn encode_into<B: BufMut>(self, id: &ObjectIdentifier, buf: &mut B) {
        buf.put_slice(id.as_bytes());
        if self == RecordMode::Sized {
            buf.put_u64(id.size().unwrap_or(0));
        }
    }

    /// Decode one record of exactly [`RecordMode::record_len`] bytes
    pub fn decode(self, record: &[u8]) -> Result<ObjectIdentifier> {
        match self {
            RecordMode::IdOnly => ObjectIdentifier::decode(record),
            RecordMode::Sized => ObjectIdentifier::decode_sized(record),
        }
    }
}

/// Lowercase hex encoding
pub fn encode_hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for &b in bytes {
        out.push(HEX_DIGITS[(b >> 4) as usize] as char);
        out.push(HEX_DIGITS[(b & 0x0f) as usize] as char);
    }
    out
}

/// Hex decoding, either case
pub fn decode_hex(hex: &str) -> Result<Vec<u8>> {
    let digits = hex.as_bytes();
    if digits.len() % 2 != 0 {
        return Err(PoolError::MalformedIdentifier(format!(
            "odd-length hex string ({} chars)",
            digits.len()
        )));
    }

    digits
        .chunks_exact(2)
        .map(|pair| Ok((hex_value(pair[0])? << 4) | hex_value(pair[1])?))
        .collect()
}

fn hex_value(digit: u8) -> Result<u8> {
    match digit {
        b'0'..=b'9' => Ok(digit - b'0'),
        b'a'..=b'f' => Ok(digit - b'a' + 10),
        b'A'..=b'F' => Ok(digit - b'A' + 10),
        _ => Err(PoolError::MalformedIdentifier(format!(
            "invalid hex digit {:?}",
            digit as char
        ))),
    }
}
