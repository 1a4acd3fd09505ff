//! Core data-model types shared by the WAL, memtable, and SSTable layers.
//!
//! [`Value`] is the in-memory tagged representation of "live bytes or a
//! deletion marker" — the redesign of the on-disk tombstone sentinel into a
//! type that cannot be confused with user data. [`KeyValueRecord`] pairs a
//! key with a [`Value`] and an optional TTL. [`Operation`] is the unit
//! appended to the write-ahead log: a record plus the column family it
//! targets.

use std::time::{SystemTime, UNIX_EPOCH};

use crate::encoding::{self, EncodingError};

/// 32-bit sentinel written on disk in place of a value to mark a deletion.
///
/// Kept only for documentation of the on-disk contract described in the
/// external interface — in memory, [`Value::Tombstone`] is used instead so
/// that no live 4-byte value can ever be mistaken for a deletion marker.
pub const TOMBSTONE_SENTINEL: u32 = 0xDEAD_BEEF;

/// A value stored for a key: either live bytes or a deletion marker.
///
/// This is the in-memory counterpart of the on-disk `TOMBSTONE` sentinel.
/// Using a tagged enum instead of a magic byte string means the invariant
/// "this is a deletion" can never be violated by a value that merely
/// happens to look like the sentinel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// Live bytes associated with the key.
    Live(Vec<u8>),
    /// A deletion marker.
    Tombstone,
}

impl Value {
    /// Returns the live bytes, or `None` if this is a tombstone.
    pub fn as_live(&self) -> Option<&[u8]> {
        match self {
            Value::Live(bytes) => Some(bytes),
            Value::Tombstone => None,
        }
    }

    /// Approximate heap size in bytes, used for memtable size accounting.
    pub fn byte_len(&self) -> usize {
        match self {
            Value::Live(bytes) => bytes.len(),
            Value::Tombstone => 0,
        }
    }

    pub fn is_tombstone(&self) -> bool {
        matches!(self, Value::Tombstone)
    }
}

impl encoding::Encode for Value {
    fn encode_to(&self, buf: &mut Vec<u8>) -> Result<(), EncodingError> {
        match self {
            Value::Live(bytes) => {
                encoding::Encode::encode_to(&0u8, buf)?;
                encoding::Encode::encode_to(bytes, buf)?;
            }
            Value::Tombstone => {
                encoding::Encode::encode_to(&1u8, buf)?;
            }
        }
        Ok(())
    }
}

impl encoding::Decode for Value {
    fn decode_from(buf: &[u8]) -> Result<(Self, usize), EncodingError> {
        let mut offset = 0;
        let (tag, n) = u8::decode_from(&buf[offset..])?;
        offset += n;
        match tag {
            0 => {
                let (bytes, n) = Vec::<u8>::decode_from(&buf[offset..])?;
                offset += n;
                Ok((Value::Live(bytes), offset))
            }
            1 => Ok((Value::Tombstone, offset)),
            _ => Err(EncodingError::InvalidTag {
                tag: tag as u32,
                type_name: "Value",
            }),
        }
    }
}

/// Returns `true` when `ttl` places the record in the past relative to
/// `now_secs`.
///
/// Per the adopted TTL convention, `ttl <= 0` means "no expiry" regardless
/// of how far in the past or future `now_secs` is; only a strictly
/// positive `ttl` that has already elapsed counts as expired.
pub fn is_expired(ttl: i64, now_secs: i64) -> bool {
    ttl > 0 && ttl < now_secs
}

/// Current wall-clock time as Unix seconds, for background subsystems
/// (flush) that have no caller-supplied `now_secs` to work from.
pub fn now_unix_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// A single key-value record as stored in the memtable and SSTables.
///
/// `ttl` is an absolute wall-clock second past which the record is
/// invisible to reads and eligible for removal by flush/compaction.
/// `ttl <= 0` means "no expiry" (see the TTL open question resolution).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyValueRecord {
    pub key: Vec<u8>,
    pub value: Value,
    pub ttl: i64,
}

impl KeyValueRecord {
    pub fn live(key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>, ttl: i64) -> Self {
        Self {
            key: key.into(),
            value: Value::Live(value.into()),
            ttl,
        }
    }

    pub fn tombstone(key: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            value: Value::Tombstone,
            ttl: -1,
        }
    }

    /// Total byte footprint of key + value, used for flush-threshold accounting.
    pub fn byte_len(&self) -> usize {
        self.key.len() + self.value.byte_len()
    }

    pub fn is_visible(&self, now_secs: i64) -> bool {
        !self.value.is_tombstone() && !is_expired(self.ttl, now_secs)
    }
}

impl encoding::Encode for KeyValueRecord {
    fn encode_to(&self, buf: &mut Vec<u8>) -> Result<(), EncodingError> {
        encoding::Encode::encode_to(&self.key, buf)?;
        encoding::Encode::encode_to(&self.value, buf)?;
        encoding::Encode::encode_to(&self.ttl, buf)?;
        Ok(())
    }
}

impl encoding::Decode for KeyValueRecord {
    fn decode_from(buf: &[u8]) -> Result<(Self, usize), EncodingError> {
        let mut offset = 0;
        let (key, n) = Vec::<u8>::decode_from(&buf[offset..])?;
        offset += n;
        let (value, n) = Value::decode_from(&buf[offset..])?;
        offset += n;
        let (ttl, n) = i64::decode_from(&buf[offset..])?;
        offset += n;
        Ok((Self { key, value, ttl }, offset))
    }
}

/// The mutation kind recorded in an [`Operation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpCode {
    Put,
    Delete,
}

impl encoding::Encode for OpCode {
    fn encode_to(&self, buf: &mut Vec<u8>) -> Result<(), EncodingError> {
        let tag: u8 = match self {
            OpCode::Put => 0,
            OpCode::Delete => 1,
        };
        encoding::Encode::encode_to(&tag, buf)
    }
}

impl encoding::Decode for OpCode {
    fn decode_from(buf: &[u8]) -> Result<(Self, usize), EncodingError> {
        let (tag, n) = u8::decode_from(buf)?;
        match tag {
            0 => Ok((OpCode::Put, n)),
            1 => Ok((OpCode::Delete, n)),
            _ => Err(EncodingError::InvalidTag {
                tag: tag as u32,
                type_name: "OpCode",
            }),
        }
    }
}

/// The unit written to the database's write-ahead log and replayed on open.
///
/// Every mutation — on any column family — is framed as one `Operation` and
/// appended to the single, database-wide WAL before being applied to the
/// target column family's memtable.
#[derive(Debug, Clone)]
pub struct Operation {
    pub op_code: OpCode,
    pub record: KeyValueRecord,
    pub column_family: String,
}

impl Operation {
    pub fn put(column_family: impl Into<String>, record: KeyValueRecord) -> Self {
        Self {
            op_code: OpCode::Put,
            record,
            column_family: column_family.into(),
        }
    }

    pub fn delete(column_family: impl Into<String>, key: impl Into<Vec<u8>>) -> Self {
        Self {
            op_code: OpCode::Delete,
            record: KeyValueRecord::tombstone(key),
            column_family: column_family.into(),
        }
    }
}

impl encoding::Encode for Operation {
    fn encode_to(&self, buf: &mut Vec<u8>) -> Result<(), EncodingError> {
        encoding::Encode::encode_to(&self.op_code, buf)?;
        encoding::Encode::encode_to(&self.record, buf)?;
        encoding::Encode::encode_to(&self.column_family, buf)?;
        Ok(())
    }
}

impl encoding::Decode for Operation {
    fn decode_from(buf: &[u8]) -> Result<(Self, usize), EncodingError> {
        let mut offset = 0;
        let (op_code, n) = OpCode::decode_from(&buf[offset..])?;
        offset += n;
        let (record, n) = KeyValueRecord::decode_from(&buf[offset..])?;
        offset += n;
        let (column_family, n) = String::decode_from(&buf[offset..])?;
        offset += n;
        Ok((
            Self {
                op_code,
                record,
                column_family,
            },
            offset,
        ))
    }
}
