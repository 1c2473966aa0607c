//! Applies decoded batch records to the memtable.
//!
//! [`MemTableInserter`] is the [`Handler`] the write path and WAL recovery
//! replay batches into. Each record consumes one sequence number, including
//! deletes that are filtered out and callbacks that decline to write.

use batch::{Handler, WriteBatch};
use common::statistics::{record_tick, Ticker};
use common::{Result, SequenceNumber, ValueType};
use config::{Options, ReadOptions, UpdateStatus};
use memtable::Memtable;
use tracing::debug;

use crate::read::lookup;
use crate::TableFile;

pub struct MemTableInserter<'a> {
    sequence: SequenceNumber,
    mem: &'a mut Memtable,
    tables: &'a [TableFile],
    options: &'a Options,
    filter_deletes: bool,
}

impl<'a> MemTableInserter<'a> {
    /// `tables` are consulted, newest first, whenever a record needs the
    /// key's current value.
    pub fn new(
        sequence: SequenceNumber,
        mem: &'a mut Memtable,
        tables: &'a [TableFile],
        options: &'a Options,
        filter_deletes: bool,
    ) -> Self {
        Self {
            sequence,
            mem,
            tables,
            options,
            filter_deletes,
        }
    }

    /// The sequence number the next record will receive.
    #[must_use]
    pub fn sequence(&self) -> SequenceNumber {
        self.sequence
    }

    /// Reads `key` as of the record currently being applied, so earlier
    /// records of the same batch are visible.
    fn read_current(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let read_options = ReadOptions::at_snapshot(self.sequence);
        lookup(&*self.mem, self.tables, key, self.sequence, self.options, &read_options)
    }

    fn put_with_callback(&mut self, key: &[u8], value: &[u8]) {
        let options = self.options;
        let Some(callback) = options.inplace_callback.as_ref() else {
            return;
        };
        if self.mem.update_callback(self.sequence, key, value, callback) {
            return;
        }
        // No live value in the memtable: fall back to older data.
        let previous = self.read_current(key).ok().flatten();
        match callback(previous.as_deref(), value) {
            UpdateStatus::UpdatedInplace(merged) | UpdateStatus::Updated(merged) => {
                self.mem.add(self.sequence, ValueType::Value, key, &merged);
                record_tick(options.statistics.as_ref(), Ticker::NumberKeysWritten);
            }
            UpdateStatus::Failed => {}
        }
    }

    /// Resolves `operand` against the current value; `None` when the merge
    /// could not be performed.
    fn eager_merge(&self, key: &[u8], operand: &[u8]) -> Option<Vec<u8>> {
        let merge_operator = self.options.merge_operator.as_ref()?;
        let existing = match self.read_current(key) {
            Ok(existing) => existing,
            Err(e) => {
                debug!(error = %e, "eager merge could not read the current value");
                return None;
            }
        };
        merge_operator.full_merge(key, existing.as_deref(), &[operand.to_vec()])
    }
}

impl Handler for MemTableInserter<'_> {
    fn put(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        if !self.options.inplace_update_support {
            self.mem.add(self.sequence, ValueType::Value, key, value);
        } else if self.options.inplace_callback.is_none() {
            self.mem.update(self.sequence, key, value);
            record_tick(self.options.statistics.as_ref(), Ticker::NumberKeysUpdated);
        } else {
            self.put_with_callback(key, value);
        }
        self.sequence += 1;
        Ok(())
    }

    fn delete(&mut self, key: &[u8]) -> Result<()> {
        if self.filter_deletes && matches!(self.read_current(key), Ok(None)) {
            record_tick(self.options.statistics.as_ref(), Ticker::NumberFilteredDeletes);
            self.sequence += 1;
            return Ok(());
        }
        self.mem.add(self.sequence, ValueType::Deletion, key, &[]);
        self.sequence += 1;
        Ok(())
    }

    fn merge(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        let threshold = self.options.max_successive_merges;
        let mut merged = false;
        if threshold > 0 && self.mem.count_successive_merge_entries(key, self.sequence) >= threshold {
            match self.eager_merge(key, value) {
                Some(new_value) => {
                    self.mem.add(self.sequence, ValueType::Value, key, &new_value);
                    merged = true;
                }
                None => record_tick(self.options.statistics.as_ref(), Ticker::NumberMergeFailures),
            }
        }
        if !merged {
            self.mem.add(self.sequence, ValueType::Merge, key, value);
        }
        self.sequence += 1;
        Ok(())
    }
}

/// Replays every record of `batch` into `mem`, starting at the batch's
/// sequence number.
///
/// Records applied before a corrupt record stay applied.
pub fn insert_into(
    batch: &WriteBatch,
    mem: &mut Memtable,
    tables: &[TableFile],
    options: &Options,
    filter_deletes: bool,
) -> Result<()> {
    let mut inserter = MemTableInserter::new(batch.sequence(), mem, tables, options, filter_deletes);
    batch.iterate(&mut inserter)
}
