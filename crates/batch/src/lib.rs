//! # Batch - atomic groups of mutations
//!
//! A [`WriteBatch`] is one contiguous byte buffer: a 12-byte header followed
//! by tagged records. The same bytes are appended to the write-ahead log and
//! replayed into the memtable, so the layout is a stable format.
//!
//! ## Binary Format
//!
//! ```text
//! [sequence: u64 LE][count: u32 LE][record ...]
//!
//! record := 0x1 varstring(key) varstring(value)   put
//!         | 0x0 varstring(key)                    delete
//!         | 0x2 varstring(key) varstring(value)   merge
//!         | 0x3 varstring(blob)                   log data
//!
//! varstring := [len: varint32][bytes]
//! ```
//!
//! `count` covers put, delete and merge records. Log-data blobs ride along
//! in the log but are not mutations, so they neither count nor consume a
//! sequence number.
//!
//! ## Example
//!
//! ```rust
//! use batch::{BatchRecord, WriteBatch};
//!
//! let mut b = WriteBatch::new();
//! b.put(b"a", b"1");
//! b.delete(b"b");
//! assert_eq!(b.count(), 2);
//! assert_eq!(b.records().unwrap()[1], BatchRecord::Delete { key: b"b".to_vec() });
//! ```

use common::coding::{
    decode_fixed32, decode_fixed64, encode_fixed32, encode_fixed64, get_length_prefixed_slice,
    put_length_prefixed_slice,
};
use common::{Error, Result, SequenceNumber, ValueType};

/// Size of the `sequence + count` header.
pub const HEADER_SIZE: usize = 12;

/// Callbacks invoked by [`WriteBatch::iterate`], one per record.
///
/// `merge` fails by default: a consumer has to decide explicitly how merges
/// are applied rather than having them silently treated as puts. `log_data`
/// is ignored by default.
pub trait Handler {
    fn put(&mut self, key: &[u8], value: &[u8]) -> Result<()>;

    fn delete(&mut self, key: &[u8]) -> Result<()>;

    fn merge(&mut self, _key: &[u8], _value: &[u8]) -> Result<()> {
        Err(Error::NotSupported("Handler::merge not implemented".into()))
    }

    fn log_data(&mut self, _blob: &[u8]) {}

    /// Checked before each record; returning `false` stops the replay.
    fn should_continue(&self) -> bool {
        true
    }
}

/// One decoded record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchRecord {
    Put { key: Vec<u8>, value: Vec<u8> },
    Delete { key: Vec<u8> },
    Merge { key: Vec<u8>, value: Vec<u8> },
    LogData { blob: Vec<u8> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteBatch {
    rep: Vec<u8>,
}

impl Default for WriteBatch {
    fn default() -> Self {
        Self::new()
    }
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::with_capacity(HEADER_SIZE)
    }

    /// Pre-allocates `reserved_bytes` (at least the header).
    pub fn with_capacity(reserved_bytes: usize) -> Self {
        let mut rep = Vec::with_capacity(reserved_bytes.max(HEADER_SIZE));
        rep.resize(HEADER_SIZE, 0);
        Self { rep }
    }

    /// Wraps raw batch bytes, e.g. a payload read back from the log.
    ///
    /// Only the header length is validated here; record-level damage is
    /// reported by [`iterate`](WriteBatch::iterate).
    pub fn from_contents(contents: Vec<u8>) -> Result<Self> {
        if contents.len() < HEADER_SIZE {
            return Err(Error::corruption("malformed WriteBatch (too small)"));
        }
        Ok(Self { rep: contents })
    }

    /// Replaces the whole buffer. On error the batch is left unchanged.
    pub fn set_contents(&mut self, contents: &[u8]) -> Result<()> {
        if contents.len() < HEADER_SIZE {
            return Err(Error::corruption("malformed WriteBatch (too small)"));
        }
        self.rep.clear();
        self.rep.extend_from_slice(contents);
        Ok(())
    }

    /// Resets to an empty batch (header only, sequence 0).
    pub fn clear(&mut self) {
        self.rep.clear();
        self.rep.resize(HEADER_SIZE, 0);
    }

    pub fn put(&mut self, key: &[u8], value: &[u8]) {
        self.set_count(self.count() + 1);
        self.rep.push(ValueType::Value as u8);
        put_length_prefixed_slice(&mut self.rep, key);
        put_length_prefixed_slice(&mut self.rep, value);
    }

    /// Put whose key and value are given as several parts, concatenated.
    pub fn put_parts(&mut self, key: &[&[u8]], value: &[&[u8]]) {
        self.put(&key.concat(), &value.concat());
    }

    pub fn delete(&mut self, key: &[u8]) {
        self.set_count(self.count() + 1);
        self.rep.push(ValueType::Deletion as u8);
        put_length_prefixed_slice(&mut self.rep, key);
    }

    pub fn merge(&mut self, key: &[u8], value: &[u8]) {
        self.set_count(self.count() + 1);
        self.rep.push(ValueType::Merge as u8);
        put_length_prefixed_slice(&mut self.rep, key);
        put_length_prefixed_slice(&mut self.rep, value);
    }

    /// Attaches an opaque blob that travels with the batch in the log.
    pub fn put_log_data(&mut self, blob: &[u8]) {
        self.rep.push(ValueType::LogData as u8);
        put_length_prefixed_slice(&mut self.rep, blob);
    }

    /// Number of mutation records, as stored in the header.
    #[must_use]
    pub fn count(&self) -> u32 {
        decode_fixed32(&self.rep[8..])
    }

    fn set_count(&mut self, n: u32) {
        encode_fixed32(&mut self.rep[8..], n);
    }

    /// Sequence number of the first record.
    #[must_use]
    pub fn sequence(&self) -> SequenceNumber {
        decode_fixed64(&self.rep)
    }

    pub fn set_sequence(&mut self, seq: SequenceNumber) {
        encode_fixed64(&mut self.rep, seq);
    }

    /// The encoded batch, header included.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.rep
    }

    #[must_use]
    pub fn size(&self) -> usize {
        self.rep.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rep.len() == HEADER_SIZE
    }

    /// Consumes the batch, returning its encoded bytes.
    #[must_use]
    pub fn into_data(self) -> Vec<u8> {
        self.rep
    }

    /// Replays every record, in encoding order, into `handler`.
    ///
    /// # Errors
    ///
    /// - `Corruption` if the buffer is shorter than the header, a tag is
    ///   unknown, a length-prefixed field is truncated, or the number of
    ///   mutation records differs from the header count. Unlike a strict
    ///   count check, it is skipped when the handler stopped the replay early.
    /// - Whatever error a handler callback returns; the replay stops there.
    ///
    /// Records applied before an error stay applied.
    pub fn iterate(&self, handler: &mut dyn Handler) -> Result<()> {
        if self.rep.len() < HEADER_SIZE {
            return Err(Error::corruption("malformed WriteBatch (too small)"));
        }

        let mut input = &self.rep[HEADER_SIZE..];
        let mut found: u32 = 0;
        let mut stopped_early = false;

        while !input.is_empty() {
            if !handler.should_continue() {
                stopped_early = true;
                break;
            }
            let tag = input[0];
            input = &input[1..];
            match ValueType::try_from(tag) {
                Ok(ValueType::Value) => {
                    let (key, value) = read_pair(&mut input).ok_or_else(|| Error::corruption("bad WriteBatch Put"))?;
                    handler.put(key, value)?;
                    found += 1;
                }
                Ok(ValueType::Deletion) => {
                    let key = get_length_prefixed_slice(&mut input)
                        .ok_or_else(|| Error::corruption("bad WriteBatch Delete"))?;
                    handler.delete(key)?;
                    found += 1;
                }
                Ok(ValueType::Merge) => {
                    let (key, value) = read_pair(&mut input).ok_or_else(|| Error::corruption("bad WriteBatch Merge"))?;
                    handler.merge(key, value)?;
                    found += 1;
                }
                Ok(ValueType::LogData) => {
                    let blob = get_length_prefixed_slice(&mut input)
                        .ok_or_else(|| Error::corruption("bad WriteBatch Blob"))?;
                    handler.log_data(blob);
                }
                Err(_) => return Err(Error::corruption("unknown WriteBatch tag")),
            }
        }

        if !stopped_early && found != self.count() {
            return Err(Error::corruption("WriteBatch has wrong count"));
        }
        Ok(())
    }

    /// Decodes every record. Fails like [`iterate`](WriteBatch::iterate).
    pub fn records(&self) -> Result<Vec<BatchRecord>> {
        let mut collector = RecordCollector::default();
        self.iterate(&mut collector)?;
        Ok(collector.records)
    }

    /// Appends `src`'s records to `dst`.
    ///
    /// The count becomes the sum of both counts. Sequence numbers are not
    /// renumbered; assign a fresh one to `dst` before applying it.
    pub fn append(dst: &mut WriteBatch, src: &WriteBatch) {
        dst.set_count(dst.count() + src.count());
        dst.rep.extend_from_slice(&src.rep[HEADER_SIZE..]);
    }
}

fn read_pair<'a>(input: &mut &'a [u8]) -> Option<(&'a [u8], &'a [u8])> {
    let key = get_length_prefixed_slice(input)?;
    let value = get_length_prefixed_slice(input)?;
    Some((key, value))
}

/// Handler that decodes records into [`BatchRecord`]s.
#[derive(Debug, Default)]
struct RecordCollector {
    records: Vec<BatchRecord>,
}

impl Handler for RecordCollector {
    fn put(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        self.records.push(BatchRecord::Put {
            key: key.to_vec(),
            value: value.to_vec(),
        });
        Ok(())
    }

    fn delete(&mut self, key: &[u8]) -> Result<()> {
        self.records.push(BatchRecord::Delete { key: key.to_vec() });
        Ok(())
    }

    fn merge(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        self.records.push(BatchRecord::Merge {
            key: key.to_vec(),
            value: value.to_vec(),
        });
        Ok(())
    }

    fn log_data(&mut self, blob: &[u8]) {
        self.records.push(BatchRecord::LogData { blob: blob.to_vec() });
    }
}

impl FromIterator<BatchRecord> for WriteBatch {
    fn from_iter<I: IntoIterator<Item = BatchRecord>>(iter: I) -> Self {
        let mut b = WriteBatch::new();
        for rec in iter {
            match rec {
                BatchRecord::Put { key, value } => b.put(&key, &value),
                BatchRecord::Delete { key } => b.delete(&key),
                BatchRecord::Merge { key, value } => b.merge(&key, &value),
                BatchRecord::LogData { blob } => b.put_log_data(&blob),
            }
        }
        b
    }
}

#[cfg(test)]
mod tests;
