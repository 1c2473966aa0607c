//! Record types, sequence numbers and the internal key encoding.
//!
//! An internal key is the user key followed by an 8-byte trailer packing
//! `(sequence << 8) | value_type`. Internal keys order by user key
//! ascending, then by trailer descending, so the newest version of a key is
//! encountered first.

use std::cmp::Ordering;

use crate::coding::{decode_fixed64, put_fixed64};
use crate::error::{Error, Result};

pub type SequenceNumber = u64;

/// Largest sequence number that fits next to the 8-bit type tag.
pub const MAX_SEQUENCE_NUMBER: SequenceNumber = (1u64 << 56) - 1;

/// Size of the packed `(sequence, type)` trailer.
pub const INTERNAL_KEY_TRAILER: usize = 8;

/// Tag of a mutation record. The numeric values are part of the write-batch
/// and table formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum ValueType {
    Deletion = 0x0,
    Value = 0x1,
    Merge = 0x2,
    LogData = 0x3,
}

/// Type used when seeking: sorts before every other type at the same sequence.
pub const VALUE_TYPE_FOR_SEEK: ValueType = ValueType::Merge;

impl TryFrom<u8> for ValueType {
    type Error = Error;

    fn try_from(tag: u8) -> Result<Self> {
        match tag {
            0x0 => Ok(ValueType::Deletion),
            0x1 => Ok(ValueType::Value),
            0x2 => Ok(ValueType::Merge),
            0x3 => Ok(ValueType::LogData),
            other => Err(Error::corruption(format!("unknown value type {other:#x}"))),
        }
    }
}

#[must_use]
pub fn pack_sequence_and_type(seq: SequenceNumber, t: ValueType) -> u64 {
    debug_assert!(seq <= MAX_SEQUENCE_NUMBER);
    (seq << 8) | t as u64
}

/// Appends the encoded internal key for `(user_key, seq, t)` to `dst`.
pub fn append_internal_key(dst: &mut Vec<u8>, user_key: &[u8], seq: SequenceNumber, t: ValueType) {
    dst.extend_from_slice(user_key);
    put_fixed64(dst, pack_sequence_and_type(seq, t));
}

#[must_use]
pub fn encode_internal_key(user_key: &[u8], seq: SequenceNumber, t: ValueType) -> Vec<u8> {
    let mut out = Vec::with_capacity(user_key.len() + INTERNAL_KEY_TRAILER);
    append_internal_key(&mut out, user_key, seq, t);
    out
}

/// A decoded view of an encoded internal key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedInternalKey<'a> {
    pub user_key: &'a [u8],
    pub sequence: SequenceNumber,
    pub value_type: ValueType,
}

pub fn parse_internal_key(internal_key: &[u8]) -> Result<ParsedInternalKey<'_>> {
    if internal_key.len() < INTERNAL_KEY_TRAILER {
        return Err(Error::corruption("internal key too short"));
    }
    let split = internal_key.len() - INTERNAL_KEY_TRAILER;
    let packed = decode_fixed64(&internal_key[split..]);
    Ok(ParsedInternalKey {
        user_key: &internal_key[..split],
        sequence: packed >> 8,
        value_type: ValueType::try_from((packed & 0xff) as u8)?,
    })
}

/// Strips the trailer. Keys shorter than the trailer are returned unchanged.
#[must_use]
pub fn extract_user_key(internal_key: &[u8]) -> &[u8] {
    internal_key
        .len()
        .checked_sub(INTERNAL_KEY_TRAILER)
        .map_or(internal_key, |n| &internal_key[..n])
}

/// Owned internal key, used as the memtable's map key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InternalKey {
    pub user_key: Vec<u8>,
    pub sequence: SequenceNumber,
    pub value_type: ValueType,
}

impl InternalKey {
    pub fn new(user_key: impl Into<Vec<u8>>, sequence: SequenceNumber, value_type: ValueType) -> Self {
        Self {
            user_key: user_key.into(),
            sequence,
            value_type,
        }
    }

    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        encode_internal_key(&self.user_key, self.sequence, self.value_type)
    }
}

impl Ord for InternalKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.user_key.cmp(&other.user_key).then_with(|| {
            pack_sequence_and_type(other.sequence, other.value_type)
                .cmp(&pack_sequence_and_type(self.sequence, self.value_type))
        })
    }
}

impl PartialOrd for InternalKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
