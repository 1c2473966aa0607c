//! Block handles, the table footer, and raw block reads.
//!
//! ## Block trailer (5 bytes)
//!
//! ```text
//! [block contents ...][type: u8][crc32: u32 LE]
//! ```
//!
//! `type` is always `0` (uncompressed). The CRC covers the contents and the
//! type byte.
//!
//! ## Footer (48 bytes, always last)
//!
//! ```text
//! [metaindex handle][index handle][zero padding to 40 bytes][magic: u64 LE]
//! ```

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use common::coding::{decode_fixed32, decode_fixed64, get_varint64, put_fixed32, put_fixed64, put_varint64};
use common::perf::{bump_perf_count, PerfTimer};
use common::{Error, Result};
use crc32fast::Hasher as Crc32;
use parking_lot::Mutex;

/// Magic number identifying LayerKV table files (ASCII "LayerKV1").
pub const TABLE_MAGIC_NUMBER: u64 = 0x4c61_7965_724b_5631;

/// `type` byte + crc32.
pub const BLOCK_TRAILER_SIZE: usize = 5;

/// Only uncompressed blocks are written.
pub const NO_COMPRESSION: u8 = 0;

/// Location of a block inside a table file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BlockHandle {
    pub offset: u64,
    /// Size of the block contents, trailer excluded.
    pub size: u64,
}

impl BlockHandle {
    /// Two varint64s.
    pub const MAX_ENCODED_LENGTH: usize = 10 + 10;

    #[must_use]
    pub fn new(offset: u64, size: u64) -> Self {
        Self { offset, size }
    }

    pub fn encode_to(&self, dst: &mut Vec<u8>) {
        put_varint64(dst, self.offset);
        put_varint64(dst, self.size);
    }

    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut v = Vec::with_capacity(Self::MAX_ENCODED_LENGTH);
        self.encode_to(&mut v);
        v
    }

    /// Decodes a handle from the front of `input`, advancing it.
    pub fn decode_from(input: &mut &[u8]) -> Result<Self> {
        match (get_varint64(input), get_varint64(input)) {
            (Some(offset), Some(size)) => Ok(Self { offset, size }),
            _ => Err(Error::invalid_argument("bad block handle")),
        }
    }
}

/// Fixed-size tail of every table file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Footer {
    pub metaindex_handle: BlockHandle,
    pub index_handle: BlockHandle,
}

impl Footer {
    pub const ENCODED_LENGTH: usize = 2 * BlockHandle::MAX_ENCODED_LENGTH + 8;

    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut dst = Vec::with_capacity(Self::ENCODED_LENGTH);
        self.metaindex_handle.encode_to(&mut dst);
        self.index_handle.encode_to(&mut dst);
        dst.resize(2 * BlockHandle::MAX_ENCODED_LENGTH, 0);
        put_fixed64(&mut dst, TABLE_MAGIC_NUMBER);
        debug_assert_eq!(dst.len(), Self::ENCODED_LENGTH);
        dst
    }

    /// Decodes the last [`Footer::ENCODED_LENGTH`] bytes of `input`.
    pub fn decode(input: &[u8]) -> Result<Self> {
        if input.len() < Self::ENCODED_LENGTH {
            return Err(Error::corruption("footer too short"));
        }
        let tail = &input[input.len() - Self::ENCODED_LENGTH..];
        let magic = decode_fixed64(&tail[Self::ENCODED_LENGTH - 8..]);
        if magic != TABLE_MAGIC_NUMBER {
            return Err(Error::corruption("not a table file (bad magic number)"));
        }
        let mut handles = &tail[..Self::ENCODED_LENGTH - 8];
        let metaindex_handle = BlockHandle::decode_from(&mut handles)?;
        let index_handle = BlockHandle::decode_from(&mut handles)?;
        Ok(Self {
            metaindex_handle,
            index_handle,
        })
    }
}

/// Positional reads over an immutable table file.
pub trait RandomAccessFile: Send + Sync {
    /// Reads exactly `len` bytes starting at `offset`.
    fn read_at(&self, offset: u64, len: usize) -> Result<Vec<u8>>;

    fn size(&self) -> u64;
}

/// A table file on disk. The handle stays open for the reader's lifetime.
pub struct FileReader {
    file: Mutex<File>,
    size: u64,
}

impl FileReader {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        let size = file.metadata()?.len();
        Ok(Self {
            file: Mutex::new(file),
            size,
        })
    }
}

impl RandomAccessFile for FileReader {
    fn read_at(&self, offset: u64, len: usize) -> Result<Vec<u8>> {
        let mut f = self.file.lock();
        f.seek(SeekFrom::Start(offset))?;
        let mut buf = vec![0u8; len];
        f.read_exact(&mut buf)?;
        Ok(buf)
    }

    fn size(&self) -> u64 {
        self.size
    }
}

impl RandomAccessFile for Vec<u8> {
    fn read_at(&self, offset: u64, len: usize) -> Result<Vec<u8>> {
        let start = usize::try_from(offset).map_err(|_| Error::corruption("read past end of file"))?;
        match start.checked_add(len) {
            Some(end) if end <= self.len() => Ok(self[start..end].to_vec()),
            _ => Err(Error::corruption("read past end of file")),
        }
    }

    fn size(&self) -> u64 {
        self.len() as u64
    }
}

pub fn read_footer(file: &dyn RandomAccessFile) -> Result<Footer> {
    let size = file.size();
    if size < Footer::ENCODED_LENGTH as u64 {
        return Err(Error::corruption("file is too short to be a table"));
    }
    let buf = file.read_at(size - Footer::ENCODED_LENGTH as u64, Footer::ENCODED_LENGTH)?;
    Footer::decode(&buf)
}

/// Computes the trailer CRC over `contents` followed by the type byte.
#[must_use]
pub fn block_crc(contents: &[u8], block_type: u8) -> u32 {
    let mut hasher = Crc32::new();
    hasher.update(contents);
    hasher.update(&[block_type]);
    hasher.finalize()
}

/// Appends the 5-byte trailer for `contents` to `dst`.
pub fn put_block_trailer(dst: &mut Vec<u8>, contents: &[u8]) {
    dst.push(NO_COMPRESSION);
    put_fixed32(dst, block_crc(contents, NO_COMPRESSION));
}

/// Reads the block at `handle`, returning its contents without the trailer.
///
/// Bumps the per-thread `block_read_*` perf counters.
pub fn read_block(file: &dyn RandomAccessFile, handle: &BlockHandle, verify_checksums: bool) -> Result<Vec<u8>> {
    let timer = PerfTimer::start();
    let n = usize::try_from(handle.size).map_err(|_| Error::corruption("block size overflows"))?;
    let mut buf = file.read_at(handle.offset, n + BLOCK_TRAILER_SIZE)?;
    bump_perf_count(|c| &mut c.block_read_count, 1);
    bump_perf_count(|c| &mut c.block_read_byte, buf.len() as u64);
    timer.stop(|c| &mut c.block_read_nanos);

    let block_type = buf[n];
    if verify_checksums {
        let expected = decode_fixed32(&buf[n + 1..]);
        if block_crc(&buf[..n], block_type) != expected {
            return Err(Error::corruption("block checksum mismatch"));
        }
    }
    if block_type != NO_COMPRESSION {
        return Err(Error::corruption(format!("unknown block type {block_type}")));
    }
    buf.truncate(n);
    Ok(buf)
}
