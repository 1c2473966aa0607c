//! # WAL - Write-Ahead Log
//!
//! Crash-safe durability for LayerKV. Every [`WriteBatch`] is appended to the
//! log as one frame **before** it is applied to the memtable. On open the log
//! is replayed batch by batch, and a batch is only ever recovered whole.
//!
//! ## Frame Format
//!
//! ```text
//! [frame_len: u32 LE][crc32: u32 LE][batch bytes ...]
//! ```
//!
//! `frame_len` covers the CRC and the payload but not itself. The payload is
//! exactly [`WriteBatch::data`], header included, so the first sequence
//! number of every batch is recoverable from the log alone.
//!
//! ## Example
//!
//! ```rust,no_run
//! use batch::WriteBatch;
//! use wal::{WalReader, WalWriter};
//!
//! let mut b = WriteBatch::new();
//! b.set_sequence(1);
//! b.put(b"hello", b"world");
//!
//! let mut w = WalWriter::create("wal.log", true).unwrap();
//! w.append(&b).unwrap();
//! drop(w);
//!
//! let mut r = WalReader::open("wal.log").unwrap();
//! r.replay(|batch| println!("seq {} count {}", batch.sequence(), batch.count())).unwrap();
//! ```

use batch::{WriteBatch, HEADER_SIZE};
use byteorder::{LittleEndian, ReadBytesExt};
use crc32fast::Hasher as Crc32;
use std::fs::{File, OpenOptions};
use std::io::{self, BufReader, Read, Write};
use std::path::Path;
use std::sync::Arc;

use thiserror::Error;

/// Frames larger than this are treated as corruption rather than allocated.
pub const MAX_FRAME_SIZE: u32 = 64 * 1024 * 1024;

/// Errors that can occur during WAL operations.
#[derive(Debug, Error)]
pub enum WalError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// A frame failed CRC validation or carried an impossible length.
    #[error("corrupt wal frame")]
    Corrupt,
}

impl From<WalError> for common::Error {
    fn from(e: WalError) -> Self {
        match e {
            WalError::Io(io) => common::Error::Io(Arc::new(io)),
            WalError::Corrupt => common::Error::corruption("corrupt wal frame"),
        }
    }
}

/// Append-only WAL writer.
///
/// Each batch is framed in a scratch buffer and written with a single
/// `write_all`. With `sync` set every append is followed by `sync_all()`.
pub struct WalWriter {
    file: File,
    sync: bool,
    buf: Vec<u8>,
}

impl WalWriter {
    /// Opens (or creates) a WAL file in append mode.
    pub fn create<P: AsRef<Path>>(path: P, sync: bool) -> Result<Self, WalError> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .read(true)
            .open(path)?;
        Ok(Self {
            file,
            sync,
            buf: Vec::with_capacity(256),
        })
    }

    /// Appends one batch as a single frame.
    pub fn append(&mut self, batch: &WriteBatch) -> Result<(), WalError> {
        self.append_with_sync(batch, self.sync)
    }

    /// Like [`append`](Self::append), forcing an fsync when `sync` is set
    /// even if the writer was created without one.
    pub fn append_with_sync(&mut self, batch: &WriteBatch, sync: bool) -> Result<(), WalError> {
        let payload = batch.data();
        let frame_len = payload.len() as u64 + 4;
        if frame_len > u64::from(MAX_FRAME_SIZE) {
            return Err(WalError::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                "write batch too large for a wal frame",
            )));
        }

        let mut hasher = Crc32::new();
        hasher.update(payload);
        let crc = hasher.finalize();

        self.buf.clear();
        self.buf.extend_from_slice(&(frame_len as u32).to_le_bytes());
        self.buf.extend_from_slice(&crc.to_le_bytes());
        self.buf.extend_from_slice(payload);

        self.file.write_all(&self.buf)?;
        self.file.flush()?;

        if sync || self.sync {
            self.file.sync_all()?;
        }
        Ok(())
    }

    /// Forces buffered data to disk via `sync_all()`.
    pub fn sync_to_disk(&mut self) -> Result<(), WalError> {
        self.file.flush()?;
        self.file.sync_all()?;
        Ok(())
    }
}

/// Truncates the log at `path` to zero bytes, creating it if missing.
pub fn truncate<P: AsRef<Path>>(path: P) -> Result<(), WalError> {
    let f = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(path)?;
    f.sync_all()?;
    Ok(())
}

/// Sequential WAL reader.
///
/// A truncated tail (a crash mid-append) ends the replay cleanly; every
/// complete frame before it is still delivered.
pub struct WalReader<R: Read> {
    rdr: BufReader<R>,
}

impl WalReader<File> {
    /// Opens an existing WAL file for replay.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<WalReader<File>, WalError> {
        let f = File::open(path)?;
        Ok(WalReader {
            rdr: BufReader::new(f),
        })
    }
}

impl<R: Read> WalReader<R> {
    pub fn from_reader(reader: R) -> Self {
        WalReader {
            rdr: BufReader::new(reader),
        }
    }

    /// Replays every complete frame, in log order, as a [`WriteBatch`].
    ///
    /// # Termination
    ///
    /// - Clean EOF or a truncated tail -> `Ok(())`.
    /// - CRC mismatch, impossible frame length, or a payload shorter than
    ///   a batch header -> `Err(WalError::Corrupt)`.
    /// - I/O error -> `Err(WalError::Io(..))`.
    pub fn replay<F>(&mut self, mut apply: F) -> Result<(), WalError>
    where
        F: FnMut(WriteBatch),
    {
        loop {
            let frame_len = match self.rdr.read_u32::<LittleEndian>() {
                Ok(v) => v,
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(()),
                Err(e) => return Err(WalError::Io(e)),
            };
            if frame_len <= 4 || frame_len > MAX_FRAME_SIZE {
                return Err(WalError::Corrupt);
            }

            let crc = match self.rdr.read_u32::<LittleEndian>() {
                Ok(v) => v,
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(()),
                Err(e) => return Err(WalError::Io(e)),
            };

            let mut payload = vec![0u8; (frame_len - 4) as usize];
            match self.rdr.read_exact(&mut payload) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                    tracing::warn!(frame_len, "ignoring truncated wal tail");
                    return Ok(());
                }
                Err(e) => return Err(WalError::Io(e)),
            }

            let mut hasher = Crc32::new();
            hasher.update(&payload);
            if hasher.finalize() != crc {
                return Err(WalError::Corrupt);
            }
            if payload.len() < HEADER_SIZE {
                return Err(WalError::Corrupt);
            }

            let batch = WriteBatch::from_contents(payload).map_err(|_| WalError::Corrupt)?;
            apply(batch);
        }
    }
}
