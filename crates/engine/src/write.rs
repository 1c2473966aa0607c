//! Write path: `write()` and memtable flushes.
//!
//! Every batch is stamped with the next sequence number, appended to the WAL
//! and then replayed into the memtable. When the memtable reaches
//! `write_buffer_size` it is persisted as a new table file.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Arc;

use batch::WriteBatch;
use common::dbformat::MAX_SEQUENCE_NUMBER;
use common::perf::PerfTimer;
use common::{Error, Result};
use config::{Options, WriteOptions};
use sstable::{Table, TableBuilder};
use tracing::info;
use wal::WalWriter;

use crate::inserter::insert_into;
use crate::{Engine, Inner, TableFile, WAL_FILE_NAME};

impl Engine {
    pub(crate) fn write_batch(&self, options: &WriteOptions, mut batch: WriteBatch) -> Result<()> {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;

        let count = u64::from(batch.count());
        let first = inner.last_sequence + 1;
        if first + count > MAX_SEQUENCE_NUMBER {
            return Err(Error::invalid_argument("sequence number overflow"));
        }
        batch.set_sequence(first);

        if !options.disable_wal {
            let timer = PerfTimer::start();
            inner.wal.append_with_sync(&batch, options.sync)?;
            timer.stop(|c| &mut c.write_wal_nanos);
        }

        let timer = PerfTimer::start();
        let applied = insert_into(
            &batch,
            &mut inner.mem,
            &inner.tables,
            &self.options,
            self.options.filter_deletes,
        );
        timer.stop(|c| &mut c.write_memtable_nanos);
        // The batch's sequence range is consumed even if a record was corrupt.
        inner.last_sequence += count;
        applied?;

        if inner.mem.approx_size() >= self.options.write_buffer_size {
            self.flush_locked(inner)?;
        }
        Ok(())
    }

    pub(crate) fn flush_locked(&self, inner: &mut Inner) -> Result<()> {
        Self::flush_inner(&self.dir, &self.options, inner)
    }

    /// Writes the memtable as a new table, then truncates the WAL.
    ///
    /// No-op when the memtable is empty.
    pub(crate) fn flush_inner(dir: &Path, options: &Options, inner: &mut Inner) -> Result<()> {
        if inner.mem.is_empty() {
            return Ok(());
        }
        let number = inner.next_file_number;
        inner.next_file_number += 1;

        let path = Self::table_path(dir, number);
        let entries = write_table(dir, &path, options, inner.mem.iter().map(|(k, v)| (k.encode(), v.as_slice())))?;

        let table = Table::open_path(&path)?;
        inner.tables.insert(
            0,
            TableFile {
                number,
                table: Arc::new(table),
            },
        );

        let wal_path = dir.join(WAL_FILE_NAME);
        wal::truncate(&wal_path)?;
        inner.wal = WalWriter::create(&wal_path, false)?;
        inner.mem.clear();

        info!(number, entries, "flushed memtable");
        Ok(())
    }
}

/// Builds a table at `path` from internal-key ordered entries.
///
/// The file is written under a `.sst.tmp` name, synced, renamed into place
/// and the directory synced. Returns the number of entries written.
pub(crate) fn write_table<I, K, V>(dir: &Path, path: &Path, options: &Options, entries: I) -> Result<u64>
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<[u8]>,
    V: AsRef<[u8]>,
{
    let tmp_path = path.with_extension("sst.tmp");
    let file = File::create(&tmp_path)?;
    let mut builder = TableBuilder::new(BufWriter::new(file), options);
    for (key, value) in entries {
        builder.add(key.as_ref(), value.as_ref())?;
    }
    let entries = builder.num_entries();
    let (mut writer, _size) = builder.finish()?;
    writer.flush()?;
    let file = writer.into_inner().map_err(|e| e.into_error())?;
    file.sync_all()?;
    drop(file);

    fs::rename(&tmp_path, path)?;
    sync_dir(dir)?;
    Ok(entries)
}

#[cfg(unix)]
fn sync_dir(dir: &Path) -> Result<()> {
    File::open(dir)?.sync_all()?;
    Ok(())
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> Result<()> {
    Ok(())
}
