//! # Types — entry model and codec
//!
//! The unit of storage shared by the skip list, the WAL, and the memtable:
//! an [`Entry`] is a key, a value, a tombstone flag, and the engine-assigned
//! version. Keys order lexicographically on raw bytes.
//!
//! ## Binary Entry Body
//!
//! ```text
//! [key_len: u32 LE][key][value_len: u32 LE][value][tombstone: u8][version: u64 LE]
//! ```
//!
//! The codec is deterministic (re-encoding an entry yields identical bytes)
//! and self-delimiting under a known length: [`Entry::decode`] consumes the
//! whole slice it is given and rejects trailing bytes. The WAL relies on both
//! properties when it frames bodies with a length prefix.

use byteorder::{LittleEndian, ReadBytesExt};
use std::io::Read;
use thiserror::Error;

/// A byte-string key. Ordering is lexicographic on bytes.
pub type Key = Vec<u8>;

/// The atomic unit of storage.
///
/// A tombstone entry marks a logical delete: it still occupies the index and
/// the WAL, and dominates older live entries for the same key. `version` is
/// the 64-bit monotonic sequence number minted by the embedding engine;
/// larger version wins on same-key collision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub key: Key,
    pub value: Vec<u8>,
    pub tombstone: bool,
    pub version: u64,
}

/// Errors produced while decoding an entry body.
#[derive(Debug, Error)]
pub enum CodecError {
    /// An underlying read error (including a body shorter than a fixed field).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A length field claims more bytes than the body holds.
    #[error("entry body truncated")]
    Truncated,

    /// The tombstone byte was neither 0 nor 1.
    #[error("invalid tombstone byte {0:#04x}")]
    InvalidTombstone(u8),

    /// The body held bytes beyond a complete entry.
    #[error("{0} trailing bytes after entry body")]
    TrailingBytes(usize),
}

impl Entry {
    /// A live entry.
    pub fn put(key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>, version: u64) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            tombstone: false,
            version,
        }
    }

    /// A delete marker. The value is empty but the entry is still indexed
    /// and logged.
    pub fn tombstone(key: impl Into<Vec<u8>>, version: u64) -> Self {
        Self {
            key: key.into(),
            value: Vec::new(),
            tombstone: true,
            version,
        }
    }

    /// Exact size of the encoded body in bytes.
    pub fn encoded_len(&self) -> usize {
        4 + self.key.len() + 4 + self.value.len() + 1 + 8
    }

    /// Appends the serialised body to `buf`.
    pub fn encode_into(&self, buf: &mut Vec<u8>) {
        buf.reserve(self.encoded_len());
        buf.extend_from_slice(&(self.key.len() as u32).to_le_bytes());
        buf.extend_from_slice(&self.key);
        buf.extend_from_slice(&(self.value.len() as u32).to_le_bytes());
        buf.extend_from_slice(&self.value);
        buf.push(self.tombstone as u8);
        buf.extend_from_slice(&self.version.to_le_bytes());
    }

    /// Serialises the body into a fresh buffer.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.encoded_len());
        self.encode_into(&mut buf);
        buf
    }

    /// Decodes one entry from exactly `buf.len()` bytes.
    ///
    /// # Errors
    ///
    /// Fails on truncation, a malformed tombstone byte, or bytes left over
    /// after the version field.
    pub fn decode(mut buf: &[u8]) -> Result<Entry, CodecError> {
        let key_len = buf.read_u32::<LittleEndian>()? as usize;
        if key_len > buf.len() {
            return Err(CodecError::Truncated);
        }
        let mut key = vec![0u8; key_len];
        buf.read_exact(&mut key)?;

        let value_len = buf.read_u32::<LittleEndian>()? as usize;
        if value_len > buf.len() {
            return Err(CodecError::Truncated);
        }
        let mut value = vec![0u8; value_len];
        buf.read_exact(&mut value)?;

        let tombstone = match buf.read_u8()? {
            0 => false,
            1 => true,
            b => return Err(CodecError::InvalidTombstone(b)),
        };
        let version = buf.read_u64::<LittleEndian>()?;

        if !buf.is_empty() {
            return Err(CodecError::TrailingBytes(buf.len()));
        }

        Ok(Entry {
            key,
            value,
            tombstone,
            version,
        })
    }
}

#[cfg(test)]
mod tests;
