//! Composes an index cursor with lazily built data-block cursors.
//!
//! The index cursor yields encoded block handles as values. For the entry
//! it is positioned at, a caller-supplied block function turns the handle
//! into a data cursor. The handle bytes used to build the current data
//! cursor are cached, so re-positioning onto the same index entry reuses
//! the existing cursor instead of reading the block again.
//!
//! A data cursor that is exhausted is skipped over, but one whose status is
//! `Incomplete` is not: its data simply is not available yet, and moving
//! past it would silently drop entries.

use common::{DbIterator, Error, Result};

/// Keeps the first error seen.
fn save_error(slot: &mut Option<Error>, status: Result<()>) {
    if slot.is_none() {
        if let Err(e) = status {
            *slot = Some(e);
        }
    }
}

pub struct TwoLevelIterator<F>
where
    F: FnMut(&[u8]) -> Box<dyn DbIterator>,
{
    index_iter: Box<dyn DbIterator>,
    block_function: F,
    data_iter: Option<Box<dyn DbIterator>>,
    /// Index value `data_iter` was built from; meaningful only while
    /// `data_iter` is `Some`.
    data_block_handle: Vec<u8>,
    status: Option<Error>,
}

impl<F> TwoLevelIterator<F>
where
    F: FnMut(&[u8]) -> Box<dyn DbIterator>,
{
    pub fn new(index_iter: Box<dyn DbIterator>, block_function: F) -> Self {
        Self {
            index_iter,
            block_function,
            data_iter: None,
            data_block_handle: Vec::new(),
            status: None,
        }
    }

    fn data_is_exhausted(&self) -> bool {
        match &self.data_iter {
            None => true,
            Some(d) => !d.valid() && !matches!(d.status(), Err(ref e) if e.is_incomplete()),
        }
    }

    fn skip_empty_data_blocks_forward(&mut self) {
        while self.data_is_exhausted() {
            if !self.index_iter.valid() {
                self.set_data_iter(None);
                return;
            }
            self.index_iter.next();
            self.init_data_block();
            if let Some(d) = self.data_iter.as_mut() {
                d.seek_to_first();
            }
        }
    }

    fn skip_empty_data_blocks_backward(&mut self) {
        while self.data_is_exhausted() {
            if !self.index_iter.valid() {
                self.set_data_iter(None);
                return;
            }
            self.index_iter.prev();
            self.init_data_block();
            if let Some(d) = self.data_iter.as_mut() {
                d.seek_to_last();
            }
        }
    }

    /// Replaces the data cursor, remembering the old one's error.
    fn set_data_iter(&mut self, data_iter: Option<Box<dyn DbIterator>>) {
        if let Some(old) = self.data_iter.take() {
            save_error(&mut self.status, old.status());
        }
        self.data_iter = data_iter;
    }

    fn init_data_block(&mut self) {
        if !self.index_iter.valid() {
            self.set_data_iter(None);
            return;
        }
        let handle = self.index_iter.value();
        if self.data_iter.is_some() && handle == self.data_block_handle.as_slice() {
            return;
        }

        // Release the old block before building the new one.
        if let Some(old) = self.data_iter.take() {
            save_error(&mut self.status, old.status());
        }
        let iter = (self.block_function)(handle);
        self.data_block_handle.clear();
        self.data_block_handle.extend_from_slice(handle);
        self.data_iter = Some(iter);
    }
}

impl<F> DbIterator for TwoLevelIterator<F>
where
    F: FnMut(&[u8]) -> Box<dyn DbIterator>,
{
    fn valid(&self) -> bool {
        self.data_iter.as_ref().is_some_and(|d| d.valid())
    }

    fn seek(&mut self, target: &[u8]) {
        self.index_iter.seek(target);
        self.init_data_block();
        if let Some(d) = self.data_iter.as_mut() {
            d.seek(target);
        }
        self.skip_empty_data_blocks_forward();
    }

    fn seek_to_first(&mut self) {
        self.index_iter.seek_to_first();
        self.init_data_block();
        if let Some(d) = self.data_iter.as_mut() {
            d.seek_to_first();
        }
        self.skip_empty_data_blocks_forward();
    }

    fn seek_to_last(&mut self) {
        self.index_iter.seek_to_last();
        self.init_data_block();
        if let Some(d) = self.data_iter.as_mut() {
            d.seek_to_last();
        }
        self.skip_empty_data_blocks_backward();
    }

    fn next(&mut self) {
        debug_assert!(self.valid());
        if let Some(d) = self.data_iter.as_mut() {
            d.next();
        }
        self.skip_empty_data_blocks_forward();
    }

    fn prev(&mut self) {
        debug_assert!(self.valid());
        if let Some(d) = self.data_iter.as_mut() {
            d.prev();
        }
        self.skip_empty_data_blocks_backward();
    }

    fn key(&self) -> &[u8] {
        debug_assert!(self.valid());
        self.data_iter.as_ref().map_or(&[][..], |d| d.key())
    }

    fn value(&self) -> &[u8] {
        debug_assert!(self.valid());
        self.data_iter.as_ref().map_or(&[][..], |d| d.value())
    }

    /// Index errors first, then the live data cursor, then anything saved
    /// from data cursors already released.
    fn status(&self) -> Result<()> {
        self.index_iter.status()?;
        if let Some(d) = &self.data_iter {
            d.status()?;
        }
        match &self.status {
            Some(e) => Err(e.clone()),
            None => Ok(()),
        }
    }
}
