//! # Memtable - sequence-tagged in-memory store
//!
//! Every mutation is kept as its own version, keyed by [`InternalKey`]
//! (user key ascending, sequence descending). A read at snapshot `s` sees
//! the newest version with `sequence <= s`; merge operands found on the way
//! are handed back to the caller so it can keep resolving against older
//! data on disk.

use std::collections::BTreeMap;
use std::ops::Bound;

use common::dbformat::{InternalKey, VALUE_TYPE_FOR_SEEK};
use common::{SequenceNumber, ValueType};
use config::{InplaceCallback, UpdateStatus};

/// Result of a point lookup in the memtable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemLookup {
    /// A live value ends the search.
    Found(Vec<u8>),
    /// A tombstone ends the search.
    Deleted,
    /// No base entry here; older sources must be consulted.
    NotFound,
}

/// Per-entry accounting overhead (sequence + type trailer).
const ENTRY_OVERHEAD: usize = 8;

#[derive(Debug, Default)]
pub struct Memtable {
    map: BTreeMap<InternalKey, Vec<u8>>,
    approx_size: usize,
}

impl Memtable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one version. `value` is ignored for deletions by readers but
    /// stored as given.
    pub fn add(&mut self, seq: SequenceNumber, value_type: ValueType, key: &[u8], value: &[u8]) {
        debug_assert!(value_type != ValueType::LogData, "log data never reaches the memtable");
        self.approx_size += key.len() + value.len() + ENTRY_OVERHEAD;
        if let Some(old) = self
            .map
            .insert(InternalKey::new(key, seq, value_type), value.to_vec())
        {
            self.approx_size = self
                .approx_size
                .saturating_sub(key.len() + old.len() + ENTRY_OVERHEAD);
        }
    }

    /// Overwrites the newest visible value of `key` in place, or adds a new
    /// version when the newest entry is not a live value.
    pub fn update(&mut self, seq: SequenceNumber, key: &[u8], value: &[u8]) {
        if let Some(slot) = self.newest_value_mut(key, seq) {
            let old_len = slot.len();
            *slot = value.to_vec();
            self.approx_size = (self.approx_size + value.len()).saturating_sub(old_len);
            return;
        }
        self.add(seq, ValueType::Value, key, value);
    }

    /// Runs `callback` against the newest visible value of `key`.
    ///
    /// Returns `false` when the key has no live value in the memtable; the
    /// caller is then responsible for reading older data. Otherwise applies
    /// the callback's decision and returns `true`.
    pub fn update_callback(
        &mut self,
        seq: SequenceNumber,
        key: &[u8],
        delta: &[u8],
        callback: &InplaceCallback,
    ) -> bool {
        let Some(slot) = self.newest_value_mut(key, seq) else {
            return false;
        };
        match callback(Some(slot.as_slice()), delta) {
            UpdateStatus::UpdatedInplace(new_value) => {
                let old_len = slot.len();
                *slot = new_value;
                let new_len = slot.len();
                self.approx_size = (self.approx_size + new_len).saturating_sub(old_len);
            }
            UpdateStatus::Updated(new_value) => {
                self.add(seq, ValueType::Value, key, &new_value);
            }
            UpdateStatus::Failed => {}
        }
        true
    }

    /// Number of consecutive merge operands at the head of `key`'s version
    /// chain, as visible at `seq`.
    pub fn count_successive_merge_entries(&self, key: &[u8], seq: SequenceNumber) -> usize {
        self.versions(key, seq)
            .take_while(|(ik, _)| ik.value_type == ValueType::Merge)
            .count()
    }

    /// Point lookup at snapshot `seq`.
    ///
    /// Merge operands encountered before a base entry are pushed onto
    /// `operands`, newest first.
    pub fn get(&self, key: &[u8], seq: SequenceNumber, operands: &mut Vec<Vec<u8>>) -> MemLookup {
        for (ik, value) in self.versions(key, seq) {
            match ik.value_type {
                ValueType::Value => return MemLookup::Found(value.clone()),
                ValueType::Deletion => return MemLookup::Deleted,
                ValueType::Merge => operands.push(value.clone()),
                ValueType::LogData => {}
            }
        }
        MemLookup::NotFound
    }

    /// True if any version of `key` is visible at `seq`.
    pub fn contains_key(&self, key: &[u8], seq: SequenceNumber) -> bool {
        self.versions(key, seq).next().is_some()
    }

    /// Ordered iterator over every version, newest first within a key.
    pub fn iter(&self) -> impl Iterator<Item = (&InternalKey, &Vec<u8>)> {
        self.map.iter()
    }

    /// Number of stored versions.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn approx_size(&self) -> usize {
        self.approx_size
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Drops every entry, keeping nothing.
    pub fn clear(&mut self) {
        self.map.clear();
        self.approx_size = 0;
    }

    /// Largest sequence number stored, or 0 when empty.
    pub fn max_sequence(&self) -> SequenceNumber {
        self.map.keys().map(|k| k.sequence).max().unwrap_or(0)
    }

    /// Versions of `key` visible at `seq`, newest first.
    fn versions<'a>(
        &'a self,
        key: &'a [u8],
        seq: SequenceNumber,
    ) -> impl Iterator<Item = (&'a InternalKey, &'a Vec<u8>)> + 'a {
        let start = InternalKey::new(key, seq, VALUE_TYPE_FOR_SEEK);
        self.map
            .range((Bound::Included(start), Bound::Unbounded))
            .take_while(move |(ik, _)| ik.user_key == key)
    }

    fn newest_value_mut(&mut self, key: &[u8], seq: SequenceNumber) -> Option<&mut Vec<u8>> {
        let start = InternalKey::new(key, seq, VALUE_TYPE_FOR_SEEK);
        let (ik, value) = self
            .map
            .range_mut((Bound::Included(start), Bound::Unbounded))
            .next()?;
        (ik.user_key == key && ik.value_type == ValueType::Value).then_some(value)
    }
}

#[cfg(test)]
mod tests;
