//! The TTL wrapper around a [`Db`].

use std::path::Path;

use batch::{Handler, WriteBatch};
use common::{DbIterator, Result, SequenceNumber};
use config::{Options, ReadOptions, WriteOptions};
use engine::{Db, Engine, KeyMayExist};

use crate::{append_ts, is_stale, sanitize_options, sanity_check_timestamp, strip_owned, TtlIterator, TS_LENGTH};

/// A [`Db`] whose values expire `ttl` seconds after they were written.
///
/// Writes append the current time to every put and merge value; reads
/// check and strip it. Deletes, flushes, compactions and snapshots pass
/// through unchanged.
pub struct TtlDb<D: Db = Engine> {
    db: D,
    ttl: i32,
    stale_read_filter: bool,
}

impl TtlDb<Engine> {
    /// Opens an [`Engine`] at `path` with `options` rewired for TTL values.
    pub fn open<P: AsRef<Path>>(path: P, mut options: Options, ttl: i32) -> Result<Self> {
        sanitize_options(ttl, &mut options);
        Ok(Self::new(Engine::open(path, options)?, ttl))
    }
}

impl<D: Db> TtlDb<D> {
    /// Wraps an already-open store. Its options must have been passed
    /// through [`sanitize_options`] for compactions to expire values.
    pub fn new(db: D, ttl: i32) -> Self {
        Self {
            db,
            ttl,
            stale_read_filter: false,
        }
    }

    /// When enabled, reads treat stale values that compaction has not yet
    /// removed as absent.
    #[must_use]
    pub fn with_stale_read_filter(mut self, enabled: bool) -> Self {
        self.stale_read_filter = enabled;
        self
    }

    pub fn ttl(&self) -> i32 {
        self.ttl
    }

    /// The wrapped store; values read through it keep their timestamps.
    pub fn inner(&self) -> &D {
        &self.db
    }

    pub fn into_inner(self) -> D {
        self.db
    }

    /// Checks and strips a stored value.
    fn unwrap_value(&self, value: Vec<u8>) -> Result<Option<Vec<u8>>> {
        sanity_check_timestamp(&value)?;
        if self.stale_read_filter && is_stale(&value, self.ttl) {
            return Ok(None);
        }
        strip_owned(value).map(Some)
    }
}

/// Rebuilds a batch with every put and merge value timestamped.
struct StampingHandler {
    out: WriteBatch,
}

impl Handler for StampingHandler {
    fn put(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        self.out.put(key, &append_ts(value)?);
        Ok(())
    }

    fn delete(&mut self, key: &[u8]) -> Result<()> {
        self.out.delete(key);
        Ok(())
    }

    fn merge(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        self.out.merge(key, &append_ts(value)?);
        Ok(())
    }

    fn log_data(&mut self, blob: &[u8]) {
        self.out.put_log_data(blob);
    }
}

impl<D: Db> Db for TtlDb<D> {
    fn write(&self, options: &WriteOptions, batch: WriteBatch) -> Result<()> {
        let mut handler = StampingHandler {
            out: WriteBatch::with_capacity(batch.size() + TS_LENGTH * batch.count() as usize),
        };
        batch.iterate(&mut handler)?;
        self.db.write(options, handler.out)
    }

    fn get(&self, options: &ReadOptions, key: &[u8]) -> Result<Option<Vec<u8>>> {
        match self.db.get(options, key)? {
            Some(value) => self.unwrap_value(value),
            None => Ok(None),
        }
    }

    fn multi_get(&self, options: &ReadOptions, keys: &[&[u8]]) -> Vec<Result<Option<Vec<u8>>>> {
        self.db
            .multi_get(options, keys)
            .into_iter()
            .map(|result| match result? {
                Some(value) => self.unwrap_value(value),
                None => Ok(None),
            })
            .collect()
    }

    fn key_may_exist(&self, options: &ReadOptions, key: &[u8]) -> KeyMayExist {
        match self.db.key_may_exist(options, key) {
            KeyMayExist::Found(value) => match self.unwrap_value(value) {
                Ok(Some(value)) => KeyMayExist::Found(value),
                Ok(None) | Err(_) => KeyMayExist::Absent,
            },
            other => other,
        }
    }

    fn new_iterator(&self, options: &ReadOptions) -> Box<dyn DbIterator> {
        Box::new(TtlIterator::new(self.db.new_iterator(options)))
    }

    fn snapshot(&self) -> SequenceNumber {
        self.db.snapshot()
    }

    fn flush(&self) -> Result<()> {
        self.db.flush()
    }

    fn compact_range(&self) -> Result<()> {
        self.db.compact_range()
    }
}
