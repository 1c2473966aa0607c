//! The cursor protocol every sorted source implements.
//!
//! A cursor is either positioned at an entry (`valid()`), or exhausted.
//! Errors do not abort movement calls; they are reported through
//! `status()`, which callers check once they stop iterating.

use std::cmp::Ordering;
use std::sync::Arc;

use crate::comparator::Comparator;
use crate::error::{Error, Result};

pub trait DbIterator {
    /// True while positioned at an entry.
    fn valid(&self) -> bool;

    fn seek_to_first(&mut self);

    fn seek_to_last(&mut self);

    /// Positions at the first entry with key >= `target`.
    fn seek(&mut self, target: &[u8]);

    /// Requires `valid()`.
    fn next(&mut self);

    /// Requires `valid()`.
    fn prev(&mut self);

    /// Requires `valid()`.
    fn key(&self) -> &[u8];

    /// Requires `valid()`.
    fn value(&self) -> &[u8];

    fn status(&self) -> Result<()>;
}

impl<I: DbIterator + ?Sized> DbIterator for Box<I> {
    fn valid(&self) -> bool {
        (**self).valid()
    }
    fn seek_to_first(&mut self) {
        (**self).seek_to_first();
    }
    fn seek_to_last(&mut self) {
        (**self).seek_to_last();
    }
    fn seek(&mut self, target: &[u8]) {
        (**self).seek(target);
    }
    fn next(&mut self) {
        (**self).next();
    }
    fn prev(&mut self) {
        (**self).prev();
    }
    fn key(&self) -> &[u8] {
        (**self).key()
    }
    fn value(&self) -> &[u8] {
        (**self).value()
    }
    fn status(&self) -> Result<()> {
        (**self).status()
    }
}

/// A cursor over nothing, optionally carrying an error status.
///
/// Block readers hand one of these out when a block cannot be loaded, so
/// the failure travels through the normal `status()` channel.
#[derive(Debug, Default)]
pub struct EmptyIterator {
    status: Option<Error>,
}

impl EmptyIterator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_error(err: Error) -> Self {
        Self { status: Some(err) }
    }
}

impl DbIterator for EmptyIterator {
    fn valid(&self) -> bool {
        false
    }
    fn seek_to_first(&mut self) {}
    fn seek_to_last(&mut self) {}
    fn seek(&mut self, _target: &[u8]) {}
    fn next(&mut self) {
        debug_assert!(false, "next() on empty iterator");
    }
    fn prev(&mut self) {
        debug_assert!(false, "prev() on empty iterator");
    }
    fn key(&self) -> &[u8] {
        &[]
    }
    fn value(&self) -> &[u8] {
        &[]
    }
    fn status(&self) -> Result<()> {
        match &self.status {
            Some(e) => Err(e.clone()),
            None => Ok(()),
        }
    }
}

/// A cursor over an owned, already-sorted vector of entries.
pub struct VecIterator {
    entries: Vec<(Vec<u8>, Vec<u8>)>,
    pos: Option<usize>,
    cmp: Arc<dyn Comparator>,
}

impl VecIterator {
    /// `entries` must already be sorted under `cmp`.
    pub fn new(entries: Vec<(Vec<u8>, Vec<u8>)>, cmp: Arc<dyn Comparator>) -> Self {
        debug_assert!(entries
            .windows(2)
            .all(|w| cmp.compare(&w[0].0, &w[1].0) != Ordering::Greater));
        Self {
            entries,
            pos: None,
            cmp,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl DbIterator for VecIterator {
    fn valid(&self) -> bool {
        self.pos.is_some()
    }

    fn seek_to_first(&mut self) {
        self.pos = if self.entries.is_empty() { None } else { Some(0) };
    }

    fn seek_to_last(&mut self) {
        self.pos = self.entries.len().checked_sub(1);
    }

    fn seek(&mut self, target: &[u8]) {
        let idx = self
            .entries
            .partition_point(|(k, _)| self.cmp.compare(k, target) == Ordering::Less);
        self.pos = (idx < self.entries.len()).then_some(idx);
    }

    fn next(&mut self) {
        self.pos = match self.pos {
            Some(i) if i + 1 < self.entries.len() => Some(i + 1),
            _ => None,
        };
    }

    fn prev(&mut self) {
        self.pos = self.pos.and_then(|i| i.checked_sub(1));
    }

    fn key(&self) -> &[u8] {
        self.pos.map_or(&[][..], |i| &self.entries[i].0)
    }

    fn value(&self) -> &[u8] {
        self.pos.map_or(&[][..], |i| &self.entries[i].1)
    }

    fn status(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comparator::bytewise;

    fn entries(keys: &[&str]) -> Vec<(Vec<u8>, Vec<u8>)> {
        keys.iter()
            .map(|k| (k.as_bytes().to_vec(), k.to_uppercase().into_bytes()))
            .collect()
    }

    #[test]
    fn vec_iterator_walks_both_directions() {
        let mut it = VecIterator::new(entries(&["a", "c", "e"]), bytewise());
        it.seek_to_first();
        assert_eq!(it.key(), b"a");
        it.next();
        assert_eq!(it.value(), b"C");
        it.seek_to_last();
        assert_eq!(it.key(), b"e");
        it.prev();
        it.prev();
        assert_eq!(it.key(), b"a");
        it.prev();
        assert!(!it.valid());
    }

    #[test]
    fn vec_iterator_seek_lands_on_successor() {
        let mut it = VecIterator::new(entries(&["a", "c", "e"]), bytewise());
        it.seek(b"b");
        assert_eq!(it.key(), b"c");
        it.seek(b"f");
        assert!(!it.valid());
        assert!(it.status().is_ok());
    }

    #[test]
    fn empty_iterator_reports_its_error() {
        let it = EmptyIterator::with_error(Error::Incomplete("pending read".into()));
        assert!(!it.valid());
        assert!(it.status().unwrap_err().is_incomplete());
    }
}
