//! Cold start: directory setup, table loading and WAL replay.

use std::fs;
use std::io;
use std::path::Path;
use std::sync::Arc;

use batch::WriteBatch;
use common::{Error, Result, SequenceNumber};
use config::Options;
use memtable::Memtable;
use parking_lot::Mutex;
use sstable::Table;
use tracing::{info, warn};
use wal::{WalError, WalReader, WalWriter};

use crate::inserter::insert_into;
use crate::{Engine, Inner, TableFile, WAL_FILE_NAME};

impl Engine {
    /// Opens (or creates) the database in `dir`.
    ///
    /// # Recovery steps
    ///
    /// 1. Create `dir` if missing and allowed by `create_if_missing`.
    /// 2. Remove leftover `.sst.tmp` files from interrupted flushes.
    /// 3. Open every `NNNNNN.sst` table, newest first.
    /// 4. Replay the WAL through the mutation applier.
    /// 5. Resume sequencing after the highest sequence seen.
    pub fn open<P: AsRef<Path>>(dir: P, options: Options) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        if !dir.exists() {
            if !options.create_if_missing {
                return Err(Error::invalid_argument(format!(
                    "{}: does not exist (create_if_missing is false)",
                    dir.display()
                )));
            }
            fs::create_dir_all(&dir)?;
        }
        cleanup_tmp_files(&dir);

        let tables = load_tables(&dir)?;
        let next_file_number = tables.first().map_or(1, |t| t.number + 1);
        let mut last_sequence = tables
            .iter()
            .map(|t| t.table.max_sequence())
            .max()
            .unwrap_or(0);

        // Replay before opening the writer so the log is not shared.
        let wal_path = dir.join(WAL_FILE_NAME);
        let mut mem = Memtable::new();
        let batches = read_wal(&wal_path, options.paranoid_checks)?;
        let replayed = batches.len();
        for batch in batches {
            insert_into(&batch, &mut mem, &tables, &options, options.filter_deletes)?;
            if let Some(end) = batch_end(&batch) {
                last_sequence = last_sequence.max(end);
            }
        }
        let wal = WalWriter::create(&wal_path, false)?;

        info!(
            dir = %dir.display(),
            tables = tables.len(),
            replayed_batches = replayed,
            last_sequence,
            "opened database"
        );

        Ok(Self {
            dir,
            options,
            inner: Mutex::new(Inner {
                mem,
                tables,
                wal,
                last_sequence,
                next_file_number,
            }),
        })
    }
}

/// Reads every batch from the log at `path`. A missing log is an empty one.
///
/// Without `paranoid_checks` a corrupt frame ends replay with a warning and
/// the batches before it are kept.
fn read_wal(path: &Path, paranoid_checks: bool) -> Result<Vec<WriteBatch>> {
    let mut reader = match WalReader::open(path) {
        Ok(reader) => reader,
        Err(WalError::Io(e)) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };
    let mut batches = Vec::new();
    match reader.replay(|batch| batches.push(batch)) {
        Ok(()) => {}
        Err(e @ WalError::Corrupt) if !paranoid_checks => {
            warn!(error = %e, kept = batches.len(), "stopping WAL replay at corrupt record");
        }
        Err(e) => return Err(e.into()),
    }
    Ok(batches)
}

/// Opens every table file in `dir`, newest (highest number) first.
fn load_tables(dir: &Path) -> Result<Vec<TableFile>> {
    let mut numbers: Vec<u64> = fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .filter_map(|e| table_number(&e.path()))
        .collect();
    numbers.sort_unstable_by(|a, b| b.cmp(a));

    numbers
        .into_iter()
        .map(|number| {
            let table = Table::open_path(Engine::table_path(dir, number))?;
            Ok(TableFile {
                number,
                table: Arc::new(table),
            })
        })
        .collect()
}

fn table_number(path: &Path) -> Option<u64> {
    if path.extension()? != "sst" {
        return None;
    }
    path.file_stem()?.to_str()?.parse().ok()
}

/// Removes `.sst.tmp` files left by interrupted flushes or compactions.
fn cleanup_tmp_files(dir: &Path) {
    if let Ok(entries) = fs::read_dir(dir) {
        for entry in entries.flatten() {
            let p = entry.path();
            if let Some(name) = p.file_name().and_then(|n| n.to_str()) {
                if name.ends_with(".sst.tmp") {
                    let _ = fs::remove_file(&p);
                }
            }
        }
    }
}

/// Highest sequence number a replayed batch consumed, if any.
fn batch_end(batch: &WriteBatch) -> Option<SequenceNumber> {
    (batch.count() > 0).then(|| batch.sequence() + u64::from(batch.count()) - 1)
}
