//! The key-value surface shared by [`Engine`](crate::Engine) and the
//! wrappers layered on top of it.

use batch::WriteBatch;
use common::{DbIterator, Result, SequenceNumber};
use config::{ReadOptions, WriteOptions};

/// Answer of [`Db::key_may_exist`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyMayExist {
    /// The key definitely has no live value.
    Absent,
    /// The key may have a value; it was not read.
    Maybe,
    /// The key exists and its value was read on the way.
    Found(Vec<u8>),
}

impl KeyMayExist {
    #[must_use]
    pub fn may_exist(&self) -> bool {
        !matches!(self, KeyMayExist::Absent)
    }
}

pub trait Db: Send + Sync {
    /// Applies every record of `batch` atomically, assigning it the next
    /// sequence numbers.
    fn write(&self, options: &WriteOptions, batch: WriteBatch) -> Result<()>;

    fn put(&self, options: &WriteOptions, key: &[u8], value: &[u8]) -> Result<()> {
        let mut batch = WriteBatch::new();
        batch.put(key, value);
        self.write(options, batch)
    }

    fn delete(&self, options: &WriteOptions, key: &[u8]) -> Result<()> {
        let mut batch = WriteBatch::new();
        batch.delete(key);
        self.write(options, batch)
    }

    fn merge(&self, options: &WriteOptions, key: &[u8], value: &[u8]) -> Result<()> {
        let mut batch = WriteBatch::new();
        batch.merge(key, value);
        self.write(options, batch)
    }

    /// `Ok(None)` when the key has no live value.
    fn get(&self, options: &ReadOptions, key: &[u8]) -> Result<Option<Vec<u8>>>;

    /// One result per key, in order. A failure for one key does not affect
    /// the others.
    fn multi_get(&self, options: &ReadOptions, keys: &[&[u8]]) -> Vec<Result<Option<Vec<u8>>>> {
        keys.iter().map(|k| self.get(options, k)).collect()
    }

    /// Cheap existence check. May answer `Maybe` for keys that turn out to
    /// be absent, never `Absent` for a live key.
    fn key_may_exist(&self, options: &ReadOptions, key: &[u8]) -> KeyMayExist;

    /// Cursor over live user keys and values as of the read snapshot.
    fn new_iterator(&self, options: &ReadOptions) -> Box<dyn DbIterator>;

    /// Sequence number of the last applied write; reads pinned to it see
    /// exactly the current state.
    fn snapshot(&self) -> SequenceNumber;

    /// Persists the memtable as a table file.
    fn flush(&self) -> Result<()>;

    /// Merges all table files into one, applying the compaction filter.
    fn compact_range(&self) -> Result<()>;
}
