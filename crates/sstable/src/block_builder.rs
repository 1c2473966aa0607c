//! Builds sorted blocks with restart-point prefix compression.
//!
//! ```text
//! entry   := [shared: varint32][non_shared: varint32][value_len: varint32]
//!            [key delta: non_shared bytes][value: value_len bytes]
//! block   := entry* [restart offset: u32 LE]* [num_restarts: u32 LE]
//! ```
//!
//! Every `restart_interval` entries the full key is stored (`shared == 0`)
//! and the entry's offset is recorded as a restart point, which is what
//! binary search in [`Block`](crate::Block) lands on.

use std::cmp::Ordering;
use std::sync::Arc;

use common::coding::{put_fixed32, put_varint32};
use common::comparator::Comparator;

pub struct BlockBuilder {
    restart_interval: usize,
    cmp: Arc<dyn Comparator>,
    buffer: Vec<u8>,
    restarts: Vec<u32>,
    counter: usize,
    finished: bool,
    last_key: Vec<u8>,
}

impl BlockBuilder {
    pub fn new(restart_interval: usize, cmp: Arc<dyn Comparator>) -> Self {
        assert!(restart_interval >= 1, "restart interval must be at least 1");
        Self {
            restart_interval,
            cmp,
            buffer: Vec::new(),
            restarts: vec![0],
            counter: 0,
            finished: false,
            last_key: Vec::new(),
        }
    }

    /// Clears the builder so it can produce another block.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.restarts.clear();
        self.restarts.push(0);
        self.counter = 0;
        self.finished = false;
        self.last_key.clear();
    }

    /// `key` must sort after every key added since the last reset.
    pub fn add(&mut self, key: &[u8], value: &[u8]) {
        assert!(!self.finished, "add() after finish()");
        debug_assert!(
            self.is_empty() || self.cmp.compare(key, &self.last_key) == Ordering::Greater,
            "keys must be added in strictly increasing order"
        );

        let mut shared = 0;
        if self.counter < self.restart_interval {
            let limit = self.last_key.len().min(key.len());
            while shared < limit && self.last_key[shared] == key[shared] {
                shared += 1;
            }
        } else {
            self.restarts.push(self.buffer.len() as u32);
            self.counter = 0;
        }
        let non_shared = key.len() - shared;

        put_varint32(&mut self.buffer, shared as u32);
        put_varint32(&mut self.buffer, non_shared as u32);
        put_varint32(&mut self.buffer, value.len() as u32);
        self.buffer.extend_from_slice(&key[shared..]);
        self.buffer.extend_from_slice(value);

        self.last_key.truncate(shared);
        self.last_key.extend_from_slice(&key[shared..]);
        self.counter += 1;
    }

    /// Appends the restart array and returns the finished block. The slice
    /// stays valid until the next `reset()`.
    pub fn finish(&mut self) -> &[u8] {
        if !self.finished {
            for &r in &self.restarts {
                put_fixed32(&mut self.buffer, r);
            }
            put_fixed32(&mut self.buffer, self.restarts.len() as u32);
            self.finished = true;
        }
        &self.buffer
    }

    /// Size of the block if it were finished now.
    #[must_use]
    pub fn current_size_estimate(&self) -> usize {
        self.buffer.len() + self.restarts.len() * 4 + 4
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}
