//! Read path: point lookups, merge resolution and snapshot iterators.
//!
//! Sources are consulted newest first: the memtable, then each table file.
//! Merge operands are collected until a value or tombstone is found and are
//! resolved through the configured merge operator.

use common::comparator::bytewise;
use common::dbformat::{encode_internal_key, parse_internal_key, InternalKey, VALUE_TYPE_FOR_SEEK};
use common::iterator::{EmptyIterator, VecIterator};
use common::perf::bump_perf_count;
use common::{DbIterator, Error, Result, SequenceNumber, ValueType};
use config::{Options, ReadOptions};
use memtable::{MemLookup, Memtable};

use crate::{Engine, KeyMayExist, TableFile};

/// Every version of every key, sorted by internal key.
pub(crate) type Versions = Vec<(InternalKey, Vec<u8>)>;

/// Looks `key` up as of `snapshot`.
pub(crate) fn lookup(
    mem: &Memtable,
    tables: &[TableFile],
    key: &[u8],
    snapshot: SequenceNumber,
    options: &Options,
    read_options: &ReadOptions,
) -> Result<Option<Vec<u8>>> {
    let mut operands = Vec::new();
    bump_perf_count(|c| &mut c.get_from_memtable_count, 1);
    let base = match mem.get(key, snapshot, &mut operands) {
        MemLookup::Found(value) => Some(value),
        MemLookup::Deleted => None,
        MemLookup::NotFound => search_tables(tables, key, snapshot, read_options, &mut operands)?,
    };
    resolve(key, base, operands, options)
}

/// Searches `tables` newest first. Returns the base value, or `None` when a
/// tombstone or the end of history was reached.
fn search_tables(
    tables: &[TableFile],
    key: &[u8],
    snapshot: SequenceNumber,
    read_options: &ReadOptions,
    operands: &mut Vec<Vec<u8>>,
) -> Result<Option<Vec<u8>>> {
    let target = encode_internal_key(key, snapshot, VALUE_TYPE_FOR_SEEK);
    for file in tables {
        bump_perf_count(|c| &mut c.get_from_table_count, 1);
        let mut iter = file.table.iter(read_options);
        iter.seek(&target);
        while iter.valid() {
            let parsed = parse_internal_key(iter.key())?;
            if parsed.user_key != key {
                break;
            }
            match parsed.value_type {
                ValueType::Value => return Ok(Some(iter.value().to_vec())),
                ValueType::Deletion => return Ok(None),
                ValueType::Merge => operands.push(iter.value().to_vec()),
                ValueType::LogData => {}
            }
            iter.next();
        }
        iter.status()?;
    }
    Ok(None)
}

/// Folds `operands` (newest first) onto `base`.
pub(crate) fn resolve(
    key: &[u8],
    base: Option<Vec<u8>>,
    mut operands: Vec<Vec<u8>>,
    options: &Options,
) -> Result<Option<Vec<u8>>> {
    if operands.is_empty() {
        return Ok(base);
    }
    let Some(merge_operator) = options.merge_operator.as_ref() else {
        return Err(Error::invalid_argument("merge operator not configured"));
    };
    operands.reverse();
    match merge_operator.full_merge(key, base.as_deref(), &operands) {
        Some(value) => Ok(Some(value)),
        None => Err(Error::corruption(format!(
            "merge operator {} failed",
            merge_operator.name()
        ))),
    }
}

/// Resolves one key's versions (newest first) to its live value.
pub(crate) fn resolve_versions(versions: &[(InternalKey, Vec<u8>)], options: &Options) -> Result<Option<Vec<u8>>> {
    let Some((first, _)) = versions.first() else {
        return Ok(None);
    };
    let mut operands = Vec::new();
    let mut base = None;
    for (ikey, value) in versions {
        match ikey.value_type {
            ValueType::Value => {
                base = Some(value.clone());
                break;
            }
            ValueType::Deletion => break,
            ValueType::Merge => operands.push(value.clone()),
            ValueType::LogData => {}
        }
    }
    resolve(&first.user_key, base, operands, options)
}

/// Collects every version visible at `snapshot` from `mem` and `tables`.
pub(crate) fn collect_versions(
    mem: &Memtable,
    tables: &[TableFile],
    snapshot: SequenceNumber,
    read_options: &ReadOptions,
) -> Result<Versions> {
    let mut versions: Versions = mem
        .iter()
        .filter(|(ikey, _)| ikey.sequence <= snapshot)
        .map(|(ikey, value)| (ikey.clone(), value.clone()))
        .collect();
    for file in tables {
        let mut iter = file.table.iter(read_options);
        iter.seek_to_first();
        while iter.valid() {
            let parsed = parse_internal_key(iter.key())?;
            if parsed.sequence <= snapshot {
                versions.push((
                    InternalKey::new(parsed.user_key, parsed.sequence, parsed.value_type),
                    iter.value().to_vec(),
                ));
            }
            iter.next();
        }
        iter.status()?;
    }
    versions.sort_unstable_by(|a, b| a.0.cmp(&b.0));
    Ok(versions)
}

/// Splits sorted versions into per-user-key runs.
pub(crate) fn group_by_user_key(versions: &[(InternalKey, Vec<u8>)]) -> impl Iterator<Item = &[(InternalKey, Vec<u8>)]> {
    versions.chunk_by(|a, b| a.0.user_key == b.0.user_key)
}

impl Engine {
    fn effective_snapshot(&self, options: &ReadOptions, last_sequence: SequenceNumber) -> SequenceNumber {
        options.snapshot.map_or(last_sequence, |s| s.min(last_sequence))
    }

    pub(crate) fn get_impl(&self, options: &ReadOptions, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let inner = self.inner.lock();
        let snapshot = self.effective_snapshot(options, inner.last_sequence);
        lookup(&inner.mem, &inner.tables, key, snapshot, &self.options, options)
    }

    pub(crate) fn multi_get_impl(&self, options: &ReadOptions, keys: &[&[u8]]) -> Vec<Result<Option<Vec<u8>>>> {
        let inner = self.inner.lock();
        let snapshot = self.effective_snapshot(options, inner.last_sequence);
        keys.iter()
            .map(|key| lookup(&inner.mem, &inner.tables, key, snapshot, &self.options, options))
            .collect()
    }

    pub(crate) fn key_may_exist_impl(&self, options: &ReadOptions, key: &[u8]) -> KeyMayExist {
        match self.get_impl(options, key) {
            Ok(Some(value)) => KeyMayExist::Found(value),
            Ok(None) => KeyMayExist::Absent,
            Err(_) => KeyMayExist::Maybe,
        }
    }

    /// Materialises the live view at the read snapshot.
    pub(crate) fn new_iterator_impl(&self, options: &ReadOptions) -> Box<dyn DbIterator> {
        match self.live_entries(options) {
            Ok(entries) => Box::new(VecIterator::new(entries, bytewise())),
            Err(e) => Box::new(EmptyIterator::with_error(e)),
        }
    }

    fn live_entries(&self, options: &ReadOptions) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let inner = self.inner.lock();
        let snapshot = self.effective_snapshot(options, inner.last_sequence);
        let versions = collect_versions(&inner.mem, &inner.tables, snapshot, options)?;
        drop(inner);

        let mut entries = Vec::new();
        for run in group_by_user_key(&versions) {
            if let Some(value) = resolve_versions(run, &self.options)? {
                entries.push((run[0].0.user_key.clone(), value));
            }
        }
        Ok(entries)
    }
}
