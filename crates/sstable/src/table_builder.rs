use std::io::Write;

use common::coding::put_varint64;
use common::comparator::internal;
use common::dbformat::parse_internal_key;
use common::properties::{TablePropertiesCollector, UserCollectedProperties};
use common::{Result, SequenceNumber};
use config::Options;

use crate::block_builder::BlockBuilder;
use crate::format::{put_block_trailer, BlockHandle, Footer, BLOCK_TRAILER_SIZE};
use crate::meta_blocks::{notify_collectors_on_add, notify_collectors_on_finish, MetaIndexBuilder, PropertyBlockBuilder};
use crate::table_properties::{names, TableProperties, PROPERTIES_BLOCK};

/// Tracks the largest sequence number written to the table.
#[derive(Default)]
struct SequenceCollector {
    max_sequence: SequenceNumber,
}

impl TablePropertiesCollector for SequenceCollector {
    fn add(&mut self, key: &[u8], _value: &[u8]) -> Result<()> {
        let parsed = parse_internal_key(key)?;
        self.max_sequence = self.max_sequence.max(parsed.sequence);
        Ok(())
    }

    fn finish(&mut self, properties: &mut UserCollectedProperties) -> Result<()> {
        let mut v = Vec::new();
        put_varint64(&mut v, self.max_sequence);
        properties.insert(names::MAX_SEQUENCE.to_string(), v);
        Ok(())
    }

    fn name(&self) -> &str {
        "SequenceCollector"
    }
}

/// Streams internal-key entries into the table format.
///
/// ```text
/// [data block]* [index block] [properties block] [meta-index block] [footer]
/// ```
///
/// Each block is followed by its 5-byte trailer. The index maps the last
/// key of every data block to that block's handle.
pub struct TableBuilder<W: Write> {
    writer: W,
    offset: u64,
    block_size: usize,
    data_block: BlockBuilder,
    index_block: BlockBuilder,
    last_key: Vec<u8>,
    /// Set after a data block is written, until its index entry is added.
    pending_index_entry: bool,
    pending_handle: BlockHandle,
    props: TableProperties,
    collectors: Vec<Box<dyn TablePropertiesCollector>>,
}

impl<W: Write> TableBuilder<W> {
    pub fn new(writer: W, options: &Options) -> Self {
        let mut collectors: Vec<Box<dyn TablePropertiesCollector>> = options
            .table_properties_collectors
            .iter()
            .map(|f| f.create_collector())
            .collect();
        collectors.push(Box::new(SequenceCollector::default()));

        Self {
            writer,
            offset: 0,
            block_size: options.block_size.max(1),
            data_block: BlockBuilder::new(options.block_restart_interval.max(1), internal()),
            index_block: BlockBuilder::new(1, internal()),
            last_key: Vec::new(),
            pending_index_entry: false,
            pending_handle: BlockHandle::default(),
            props: TableProperties::default(),
            collectors,
        }
    }

    /// Adds an entry. `key` is an encoded internal key and must sort after
    /// every key added before it.
    pub fn add(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        if self.pending_index_entry {
            self.index_block.add(&self.last_key, &self.pending_handle.encode());
            self.pending_index_entry = false;
        }

        self.data_block.add(key, value);
        self.props.num_entries += 1;
        self.props.raw_key_size += key.len() as u64;
        self.props.raw_value_size += value.len() as u64;
        notify_collectors_on_add(key, value, &mut self.collectors);

        self.last_key.clear();
        self.last_key.extend_from_slice(key);

        if self.data_block.current_size_estimate() >= self.block_size {
            self.flush()?;
        }
        Ok(())
    }

    /// Writes the pending data block, if any.
    fn flush(&mut self) -> Result<()> {
        if self.data_block.is_empty() {
            return Ok(());
        }
        debug_assert!(!self.pending_index_entry);
        let contents = self.data_block.finish();
        self.pending_handle = write_raw_block(&mut self.writer, &mut self.offset, contents)?;
        self.data_block.reset();
        self.pending_index_entry = true;
        self.props.num_data_blocks += 1;
        Ok(())
    }

    #[must_use]
    pub fn num_entries(&self) -> u64 {
        self.props.num_entries
    }

    /// Bytes written so far.
    #[must_use]
    pub fn file_size(&self) -> u64 {
        self.offset
    }

    /// Writes the remaining blocks and the footer. Returns the writer (for
    /// the caller to sync) and the final file size.
    pub fn finish(mut self) -> Result<(W, u64)> {
        self.flush()?;
        self.props.data_size = self.offset;

        if self.pending_index_entry {
            self.index_block.add(&self.last_key, &self.pending_handle.encode());
            self.pending_index_entry = false;
        }
        let index_handle = write_raw_block(&mut self.writer, &mut self.offset, self.index_block.finish())?;
        self.props.index_size = index_handle.size + BLOCK_TRAILER_SIZE as u64;

        let mut property_block = PropertyBlockBuilder::new();
        property_block.add_table_properties(&self.props);
        notify_collectors_on_finish(&mut self.collectors, &mut property_block);
        let properties_handle = write_raw_block(&mut self.writer, &mut self.offset, &property_block.finish())?;

        let mut meta_index = MetaIndexBuilder::new();
        meta_index.add(PROPERTIES_BLOCK, &properties_handle);
        let metaindex_handle = write_raw_block(&mut self.writer, &mut self.offset, &meta_index.finish())?;

        let footer = Footer {
            metaindex_handle,
            index_handle,
        };
        self.writer.write_all(&footer.encode())?;
        self.offset += Footer::ENCODED_LENGTH as u64;
        self.writer.flush()?;

        Ok((self.writer, self.offset))
    }
}

fn write_raw_block<W: Write>(writer: &mut W, offset: &mut u64, contents: &[u8]) -> Result<BlockHandle> {
    let handle = BlockHandle::new(*offset, contents.len() as u64);
    let mut trailer = Vec::with_capacity(BLOCK_TRAILER_SIZE);
    put_block_trailer(&mut trailer, contents);
    writer.write_all(contents)?;
    writer.write_all(&trailer)?;
    *offset += (contents.len() + BLOCK_TRAILER_SIZE) as u64;
    Ok(handle)
}
