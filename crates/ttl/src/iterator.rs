//! Cursor that hides timestamp suffixes.

use common::coding::decode_fixed32;
use common::{DbIterator, Error, Result};

use crate::TS_LENGTH;

/// Wraps a cursor over timestamped values.
///
/// `value()` is the user value; [`timestamp`](TtlIterator::timestamp) is
/// the write time. An entry too short to carry a timestamp yields an empty
/// value and a `Corruption` status.
pub struct TtlIterator {
    inner: Box<dyn DbIterator>,
}

impl TtlIterator {
    pub fn new(inner: Box<dyn DbIterator>) -> Self {
        Self { inner }
    }

    /// Write time of the current entry, `0` if it has none. Requires
    /// `valid()`.
    pub fn timestamp(&self) -> u32 {
        let value = self.inner.value();
        value
            .len()
            .checked_sub(TS_LENGTH)
            .map_or(0, |n| decode_fixed32(&value[n..]))
    }
}

impl DbIterator for TtlIterator {
    fn valid(&self) -> bool {
        self.inner.valid()
    }

    fn seek_to_first(&mut self) {
        self.inner.seek_to_first();
    }

    fn seek_to_last(&mut self) {
        self.inner.seek_to_last();
    }

    fn seek(&mut self, target: &[u8]) {
        self.inner.seek(target);
    }

    fn next(&mut self) {
        self.inner.next();
    }

    fn prev(&mut self) {
        self.inner.prev();
    }

    fn key(&self) -> &[u8] {
        self.inner.key()
    }

    fn value(&self) -> &[u8] {
        let value = self.inner.value();
        value.len().checked_sub(TS_LENGTH).map_or(&[][..], |n| &value[..n])
    }

    fn status(&self) -> Result<()> {
        self.inner.status()?;
        if self.inner.valid() && self.inner.value().len() < TS_LENGTH {
            return Err(Error::corruption("value is shorter than its timestamp"));
        }
        Ok(())
    }
}
