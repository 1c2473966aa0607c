//! # Engine - LayerKV storage engine
//!
//! Ties the [`memtable`], [`wal`] and [`sstable`] crates together into a
//! log-structured key-value store exposed through the [`Db`] trait.
//!
//! ```text
//! Client
//!   |
//!   v
//! ┌───────────────────────────────────────────────┐
//! │                   ENGINE                      │
//! │                                               │
//! │ write.rs → WAL append → MemTableInserter      │
//! │              |                                │
//! │              |  (write_buffer_size reached?)  │
//! │              v                                │
//! │           flush() → new table file            │
//! │                                               │
//! │ compact_range() → one merged table file       │
//! │                                               │
//! │ read.rs → Memtable → tables newest-first      │
//! │           (merge operands resolved on read)   │
//! └───────────────────────────────────────────────┘
//! ```
//!
//! | Module         | Purpose                                                |
//! |----------------|--------------------------------------------------------|
//! | [`db`]         | The `Db` trait and `KeyMayExist`                       |
//! | [`inserter`]   | `MemTableInserter`: applies batch records to the memtable |
//! | `recovery`     | tmp cleanup, table loading, WAL replay                 |
//! | `write`        | `write()`, `flush()`                                   |
//! | `read`         | point lookups, merge resolution, snapshot iterators    |
//! | `compaction`   | `compact_range()` with compaction filters              |
//!
//! ## Crash safety
//!
//! Every batch is appended to the WAL before it reaches the memtable. The
//! WAL is truncated only after the flushed table has been renamed into
//! place and the directory synced.
mod compaction;
pub mod db;
pub mod inserter;
mod read;
mod recovery;
mod write;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use batch::WriteBatch;
use common::{DbIterator, Result, SequenceNumber};
use config::{Options, ReadOptions, WriteOptions};
use memtable::Memtable;
use parking_lot::Mutex;
use sstable::{Table, TableProperties};
use wal::WalWriter;

pub use db::{Db, KeyMayExist};
pub use inserter::{insert_into, MemTableInserter};

/// Name of the write-ahead log inside the database directory.
pub const WAL_FILE_NAME: &str = "wal.log";

/// A table file that is part of the live database.
pub struct TableFile {
    pub(crate) number: u64,
    pub(crate) table: Arc<Table>,
}

impl TableFile {
    #[must_use]
    pub fn number(&self) -> u64 {
        self.number
    }

    #[must_use]
    pub fn table(&self) -> &Table {
        &self.table
    }
}

pub(crate) struct Inner {
    pub(crate) mem: Memtable,
    /// Newest first.
    pub(crate) tables: Vec<TableFile>,
    pub(crate) wal: WalWriter,
    pub(crate) last_sequence: SequenceNumber,
    pub(crate) next_file_number: u64,
}

/// The storage engine.
///
/// # Write path
///
/// 1. Stamp the batch with the next sequence number.
/// 2. Append it to the WAL (unless `disable_wal`).
/// 3. Replay it into the memtable through [`MemTableInserter`].
/// 4. Flush when the memtable reaches `write_buffer_size`.
///
/// # Read path
///
/// Memtable first, then table files newest to oldest. Merge operands found
/// on the way are collected until a value or tombstone, then resolved
/// through the configured merge operator.
pub struct Engine {
    pub(crate) dir: PathBuf,
    pub(crate) options: Options,
    pub(crate) inner: Mutex<Inner>,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("Engine")
            .field("dir", &self.dir)
            .field("last_sequence", &inner.last_sequence)
            .field("memtable_size", &inner.mem.approx_size())
            .field("memtable_entries", &inner.mem.len())
            .field("table_count", &inner.tables.len())
            .finish()
    }
}

impl Engine {
    pub(crate) fn wal_path(&self) -> PathBuf {
        self.dir.join(WAL_FILE_NAME)
    }

    pub(crate) fn table_path(dir: &Path, number: u64) -> PathBuf {
        dir.join(format!("{number:06}.sst"))
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    #[must_use]
    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Number of live table files.
    #[must_use]
    pub fn table_count(&self) -> usize {
        self.inner.lock().tables.len()
    }

    /// Number of versions currently buffered in the memtable.
    #[must_use]
    pub fn memtable_entries(&self) -> usize {
        self.inner.lock().mem.len()
    }

    /// Properties of every live table, newest first.
    #[must_use]
    pub fn table_properties(&self) -> Vec<(u64, TableProperties)> {
        self.inner
            .lock()
            .tables
            .iter()
            .map(|t| (t.number, t.table.properties().clone()))
            .collect()
    }
}

impl Db for Engine {
    fn write(&self, options: &WriteOptions, batch: WriteBatch) -> Result<()> {
        self.write_batch(options, batch)
    }

    fn get(&self, options: &ReadOptions, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.get_impl(options, key)
    }

    fn multi_get(&self, options: &ReadOptions, keys: &[&[u8]]) -> Vec<Result<Option<Vec<u8>>>> {
        self.multi_get_impl(options, keys)
    }

    fn key_may_exist(&self, options: &ReadOptions, key: &[u8]) -> KeyMayExist {
        self.key_may_exist_impl(options, key)
    }

    fn new_iterator(&self, options: &ReadOptions) -> Box<dyn DbIterator> {
        self.new_iterator_impl(options)
    }

    fn snapshot(&self) -> SequenceNumber {
        self.inner.lock().last_sequence
    }

    fn flush(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        self.flush_locked(&mut inner)
    }

    fn compact_range(&self) -> Result<()> {
        self.compact_range_impl()
    }
}

/// Best-effort flush on drop.
///
/// Errors are ignored because Drop cannot propagate them; the data is still
/// in the WAL and is recovered on the next open.
impl Drop for Engine {
    fn drop(&mut self) {
        let inner = self.inner.get_mut();
        if !inner.mem.is_empty() {
            let _ = Self::flush_inner(&self.dir, &self.options, inner);
        }
    }
}

#[cfg(test)]
mod tests;
