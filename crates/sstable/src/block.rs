//! Read side of the sorted block format written by
//! [`BlockBuilder`](crate::BlockBuilder).

use std::cmp::Ordering;
use std::sync::Arc;

use common::coding::{decode_fixed32, get_varint32};
use common::comparator::Comparator;
use common::iterator::EmptyIterator;
use common::{DbIterator, Error, Result};

/// Parsed block contents. Cloning shares the underlying bytes.
#[derive(Debug, Clone)]
pub struct Block {
    data: Arc<Vec<u8>>,
    restart_offset: usize,
    num_restarts: u32,
}

impl Block {
    /// Validates the restart array of `contents`. Every restart point must
    /// fall inside the entry region.
    pub fn new(contents: Vec<u8>) -> Result<Self> {
        if contents.len() < 4 {
            return Err(Error::corruption("bad block contents"));
        }
        let num_restarts = decode_fixed32(&contents[contents.len() - 4..]);
        let max_restarts = (contents.len() - 4) / 4;
        if num_restarts as usize > max_restarts {
            return Err(Error::corruption("bad block contents"));
        }
        let restart_offset = contents.len() - (1 + num_restarts as usize) * 4;
        let restarts = &contents[restart_offset..contents.len() - 4];
        if restarts
            .chunks_exact(4)
            .any(|r| decode_fixed32(r) as usize > restart_offset)
        {
            return Err(Error::corruption("bad block restart point"));
        }
        Ok(Self {
            data: Arc::new(contents),
            restart_offset,
            num_restarts,
        })
    }

    /// Size of the contents, restart array included.
    #[must_use]
    pub fn size(&self) -> usize {
        self.data.len()
    }

    pub fn iter(&self, cmp: Arc<dyn Comparator>) -> Box<dyn DbIterator> {
        if self.num_restarts == 0 {
            return Box::new(EmptyIterator::new());
        }
        Box::new(BlockIter {
            data: Arc::clone(&self.data),
            restart_offset: self.restart_offset,
            num_restarts: self.num_restarts,
            cmp,
            current: self.restart_offset,
            restart_index: self.num_restarts,
            key: Vec::new(),
            value: (self.restart_offset, self.restart_offset),
            status: None,
        })
    }
}

/// Header of one entry: shared, non-shared and value lengths plus the
/// number of bytes the three varints took.
fn decode_entry(mut input: &[u8]) -> Option<(usize, usize, usize, usize)> {
    let before = input.len();
    let shared = get_varint32(&mut input)? as usize;
    let non_shared = get_varint32(&mut input)? as usize;
    let value_len = get_varint32(&mut input)? as usize;
    let header = before - input.len();
    if input.len() < non_shared + value_len {
        return None;
    }
    Some((shared, non_shared, value_len, header))
}

struct BlockIter {
    data: Arc<Vec<u8>>,
    restart_offset: usize,
    num_restarts: u32,
    cmp: Arc<dyn Comparator>,
    /// Offset of the current entry; `>= restart_offset` when invalid.
    current: usize,
    /// Restart block containing `current`.
    restart_index: u32,
    key: Vec<u8>,
    /// Byte range of the current value in `data`.
    value: (usize, usize),
    status: Option<Error>,
}

impl BlockIter {
    fn next_entry_offset(&self) -> usize {
        self.value.1
    }

    fn restart_point(&self, index: u32) -> usize {
        debug_assert!(index < self.num_restarts);
        decode_fixed32(&self.data[self.restart_offset + index as usize * 4..]) as usize
    }

    fn seek_to_restart_point(&mut self, index: u32) {
        self.key.clear();
        self.restart_index = index;
        let offset = self.restart_point(index);
        self.value = (offset, offset);
    }

    fn mark_invalid(&mut self) {
        self.current = self.restart_offset;
        self.restart_index = self.num_restarts;
    }

    fn corruption_error(&mut self) {
        self.mark_invalid();
        self.status = Some(Error::corruption("bad entry in block"));
        self.key.clear();
        self.value = (self.restart_offset, self.restart_offset);
    }

    fn parse_next_key(&mut self) -> bool {
        self.current = self.next_entry_offset();
        if self.current >= self.restart_offset {
            self.mark_invalid();
            return false;
        }

        let entry = &self.data[self.current..self.restart_offset];
        match decode_entry(entry) {
            Some((shared, non_shared, value_len, header)) if self.key.len() >= shared => {
                let key_start = self.current + header;
                let value_start = key_start + non_shared;
                self.key.truncate(shared);
                self.key.extend_from_slice(&self.data[key_start..value_start]);
                self.value = (value_start, value_start + value_len);
                while self.restart_index + 1 < self.num_restarts
                    && self.restart_point(self.restart_index + 1) < self.current
                {
                    self.restart_index += 1;
                }
                true
            }
            _ => {
                self.corruption_error();
                false
            }
        }
    }
}

impl DbIterator for BlockIter {
    fn valid(&self) -> bool {
        self.current < self.restart_offset
    }

    fn seek_to_first(&mut self) {
        self.seek_to_restart_point(0);
        self.parse_next_key();
    }

    fn seek_to_last(&mut self) {
        self.seek_to_restart_point(self.num_restarts - 1);
        while self.parse_next_key() && self.next_entry_offset() < self.restart_offset {}
    }

    fn seek(&mut self, target: &[u8]) {
        // Binary search for the last restart point whose key is < target.
        let mut left = 0u32;
        let mut right = self.num_restarts - 1;
        while left < right {
            let mid = (left + right + 1) / 2;
            let region = self.restart_point(mid);
            let restart_key = match decode_entry(&self.data[region..self.restart_offset]) {
                Some((0, non_shared, _, header)) => &self.data[region + header..region + header + non_shared],
                _ => {
                    self.corruption_error();
                    return;
                }
            };
            if self.cmp.compare(restart_key, target) == Ordering::Less {
                left = mid;
            } else {
                right = mid - 1;
            }
        }

        self.seek_to_restart_point(left);
        loop {
            if !self.parse_next_key() {
                return;
            }
            if self.cmp.compare(&self.key, target) != Ordering::Less {
                return;
            }
        }
    }

    fn next(&mut self) {
        debug_assert!(self.valid());
        self.parse_next_key();
    }

    fn prev(&mut self) {
        debug_assert!(self.valid());
        let original = self.current;
        while self.restart_point(self.restart_index) >= original {
            if self.restart_index == 0 {
                self.mark_invalid();
                return;
            }
            self.restart_index -= 1;
        }

        self.seek_to_restart_point(self.restart_index);
        while self.parse_next_key() && self.next_entry_offset() < original {}
    }

    fn key(&self) -> &[u8] {
        &self.key
    }

    fn value(&self) -> &[u8] {
        &self.data[self.value.0..self.value.1]
    }

    fn status(&self) -> Result<()> {
        match &self.status {
            Some(e) => Err(e.clone()),
            None => Ok(()),
        }
    }
}
