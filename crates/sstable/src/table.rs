use std::path::Path;
use std::sync::Arc;

use common::coding::get_varint64;
use common::comparator::{bytewise, internal, Comparator};
use common::iterator::EmptyIterator;
use common::{DbIterator, Result, SequenceNumber};
use config::ReadOptions;

use crate::block::Block;
use crate::format::{read_block, read_footer, BlockHandle, FileReader, RandomAccessFile};
use crate::meta_blocks::{find_meta_block, read_properties};
use crate::table_properties::{names, TableProperties, PROPERTIES_BLOCK};
use crate::two_level::TwoLevelIterator;

/// An open, immutable table.
///
/// The index block and the properties are loaded on open; data blocks are
/// read on demand by the iterators handed out by [`Table::iter`].
pub struct Table {
    file: Arc<dyn RandomAccessFile>,
    index_block: Block,
    properties: TableProperties,
    cmp: Arc<dyn Comparator>,
}

impl std::fmt::Debug for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Table")
            .field("file_size", &self.file.size())
            .field("index_block_size", &self.index_block.size())
            .field("num_entries", &self.properties.num_entries)
            .finish()
    }
}

impl Table {
    /// Reads the footer, index block and properties of `file`.
    ///
    /// # Errors
    ///
    /// `Corruption` for a short file, bad magic, a checksum mismatch in the
    /// index block, or a missing properties block.
    pub fn open(file: Arc<dyn RandomAccessFile>) -> Result<Self> {
        let footer = read_footer(file.as_ref())?;
        let index_block = Block::new(read_block(file.as_ref(), &footer.index_handle, true)?)?;

        let metaindex = Block::new(read_block(file.as_ref(), &footer.metaindex_handle, true)?)?;
        let mut meta_iter = metaindex.iter(bytewise());
        let handle = find_meta_block(meta_iter.as_mut(), PROPERTIES_BLOCK)?;
        let properties = read_properties(&handle.encode(), file.as_ref())?;

        Ok(Self {
            file,
            index_block,
            properties,
            cmp: internal(),
        })
    }

    pub fn open_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open(Arc::new(FileReader::open(path)?))
    }

    #[must_use]
    pub fn properties(&self) -> &TableProperties {
        &self.properties
    }

    /// Largest sequence number stored in the table, `0` if unknown.
    #[must_use]
    pub fn max_sequence(&self) -> SequenceNumber {
        self.properties
            .user_collected_properties
            .get(names::MAX_SEQUENCE)
            .and_then(|v| get_varint64(&mut v.as_slice()))
            .unwrap_or(0)
    }

    /// Cursor over every entry, keyed by encoded internal key.
    ///
    /// Block read failures surface through the iterator's `status()`.
    pub fn iter(&self, read_options: &ReadOptions) -> Box<dyn DbIterator> {
        let file = Arc::clone(&self.file);
        let cmp = Arc::clone(&self.cmp);
        let verify = read_options.verify_checksums;
        let block_function = move |handle_value: &[u8]| -> Box<dyn DbIterator> {
            let mut input = handle_value;
            let loaded = BlockHandle::decode_from(&mut input)
                .and_then(|handle| read_block(file.as_ref(), &handle, verify))
                .and_then(Block::new);
            match loaded {
                Ok(block) => block.iter(Arc::clone(&cmp)),
                Err(e) => Box::new(EmptyIterator::with_error(e)),
            }
        };
        Box::new(TwoLevelIterator::new(
            self.index_block.iter(Arc::clone(&self.cmp)),
            block_function,
        ))
    }
}
