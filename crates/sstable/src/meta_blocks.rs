//! Meta-index and properties blocks.
//!
//! Both are ordinary sorted blocks built with a restart interval of 1, so
//! every key is stored whole. Entries are buffered in a `BTreeMap` and
//! written in key order when the builder is finished; `finish` consumes the
//! builder.

use std::collections::BTreeMap;

use common::coding::{get_varint64, put_varint64};
use common::comparator::bytewise;
use common::properties::{TablePropertiesCollector, UserCollectedProperties};
use common::{DbIterator, Error, Result};
use tracing::warn;

use crate::block::Block;
use crate::block_builder::BlockBuilder;
use crate::format::{read_block, read_footer, BlockHandle, RandomAccessFile};
use crate::table_properties::{names, TableProperties, PROPERTIES_BLOCK};

/// Maps meta block names to their handles.
#[derive(Default)]
pub struct MetaIndexBuilder {
    handles: BTreeMap<String, Vec<u8>>,
}

impl MetaIndexBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, name: &str, handle: &BlockHandle) {
        self.handles.insert(name.to_string(), handle.encode());
    }

    pub fn finish(self) -> Vec<u8> {
        let mut block = BlockBuilder::new(1, bytewise());
        for (name, handle) in &self.handles {
            block.add(name.as_bytes(), handle);
        }
        block.finish().to_vec()
    }
}

#[derive(Default)]
pub struct PropertyBlockBuilder {
    props: BTreeMap<String, Vec<u8>>,
}

impl PropertyBlockBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a raw property. The first value added under a name is kept.
    pub fn add_raw(&mut self, name: &str, value: &[u8]) {
        self.props.entry(name.to_string()).or_insert_with(|| value.to_vec());
    }

    /// Adds a varint64-encoded property.
    pub fn add_u64(&mut self, name: &str, value: u64) {
        debug_assert!(!self.props.contains_key(name), "duplicate property {name}");
        let mut dst = Vec::new();
        put_varint64(&mut dst, value);
        self.add_raw(name, &dst);
    }

    pub fn add_user_collected(&mut self, props: &UserCollectedProperties) {
        for (name, value) in props {
            self.add_raw(name, value);
        }
    }

    pub fn add_table_properties(&mut self, props: &TableProperties) {
        self.add_u64(names::RAW_KEY_SIZE, props.raw_key_size);
        self.add_u64(names::RAW_VALUE_SIZE, props.raw_value_size);
        self.add_u64(names::DATA_SIZE, props.data_size);
        self.add_u64(names::INDEX_SIZE, props.index_size);
        self.add_u64(names::NUM_ENTRIES, props.num_entries);
        self.add_u64(names::NUM_DATA_BLOCKS, props.num_data_blocks);
        self.add_u64(names::FILTER_SIZE, props.filter_size);
        self.add_u64(names::FORMAT_VERSION, props.format_version);
        self.add_u64(names::FIXED_KEY_LEN, props.fixed_key_len);
        if !props.filter_policy_name.is_empty() {
            self.add_raw(names::FILTER_POLICY, props.filter_policy_name.as_bytes());
        }
    }

    pub fn finish(self) -> Vec<u8> {
        let mut block = BlockBuilder::new(1, bytewise());
        for (name, value) in &self.props {
            block.add(name.as_bytes(), value);
        }
        block.finish().to_vec()
    }
}

fn log_collection_error(method: &str, collector: &str, err: &Error) {
    warn!(
        method,
        collector,
        error = %err,
        "table properties collector failed"
    );
}

/// Feeds one entry to every collector. Returns `false` if any failed; the
/// failures are logged and do not stop the remaining collectors.
pub fn notify_collectors_on_add(key: &[u8], value: &[u8], collectors: &mut [Box<dyn TablePropertiesCollector>]) -> bool {
    let mut all_succeeded = true;
    for collector in collectors.iter_mut() {
        if let Err(e) = collector.add(key, value) {
            all_succeeded = false;
            log_collection_error("add", collector.name(), &e);
        }
    }
    all_succeeded
}

/// Finishes every collector and adds what the successful ones produced.
pub fn notify_collectors_on_finish(
    collectors: &mut [Box<dyn TablePropertiesCollector>],
    builder: &mut PropertyBlockBuilder,
) -> bool {
    let mut all_succeeded = true;
    for collector in collectors.iter_mut() {
        let mut props = UserCollectedProperties::new();
        match collector.finish(&mut props) {
            Ok(()) => builder.add_user_collected(&props),
            Err(e) => {
                all_succeeded = false;
                log_collection_error("finish", collector.name(), &e);
            }
        }
    }
    all_succeeded
}

/// Parses the properties block referenced by the encoded `handle_value`.
///
/// Malformed well-known values are logged and skipped; the field keeps its
/// default.
pub fn read_properties(handle_value: &[u8], file: &dyn RandomAccessFile) -> Result<TableProperties> {
    let mut input = handle_value;
    let handle = BlockHandle::decode_from(&mut input)
        .map_err(|_| Error::invalid_argument("failed to decode properties block handle"))?;

    let block = Block::new(read_block(file, &handle, false)?)?;
    let mut iter = block.iter(bytewise());

    let mut props = TableProperties::default();
    let mut last_key: Vec<u8> = Vec::new();
    iter.seek_to_first();
    while iter.valid() {
        iter.status()?;

        let key = iter.key();
        debug_assert!(
            last_key.is_empty() || key > last_key.as_slice(),
            "properties block keys must be strictly increasing"
        );
        last_key.clear();
        last_key.extend_from_slice(key);

        let name = String::from_utf8_lossy(key).into_owned();
        let mut raw = iter.value();
        if let Some(field) = props.u64_field_mut(&name) {
            match get_varint64(&mut raw) {
                Some(v) => *field = v,
                None => warn!(
                    key = %name,
                    value = ?iter.value(),
                    "malformed value in properties block"
                ),
            }
        } else if name == names::FILTER_POLICY {
            props.filter_policy_name = String::from_utf8_lossy(raw).into_owned();
        } else {
            props.user_collected_properties.insert(name, raw.to_vec());
        }
        iter.next();
    }
    iter.status()?;
    Ok(props)
}

/// Reads the properties of the table in `file` via its footer and
/// meta-index.
pub fn read_table_properties(file: &dyn RandomAccessFile) -> Result<TableProperties> {
    let footer = read_footer(file)?;
    let metaindex = Block::new(read_block(file, &footer.metaindex_handle, false)?)?;
    let mut meta_iter = metaindex.iter(bytewise());

    meta_iter.seek(PROPERTIES_BLOCK.as_bytes());
    meta_iter.status()?;
    if meta_iter.valid() && meta_iter.key() == PROPERTIES_BLOCK.as_bytes() {
        read_properties(meta_iter.value(), file)
    } else {
        warn!("cannot find properties block in table file");
        Err(Error::corruption("unable to read the property block"))
    }
}

/// Looks up `name` in a meta-index cursor.
pub fn find_meta_block(meta_iter: &mut dyn DbIterator, name: &str) -> Result<BlockHandle> {
    meta_iter.seek(name.as_bytes());
    if meta_iter.status().is_ok() && meta_iter.valid() && meta_iter.key() == name.as_bytes() {
        let mut v = meta_iter.value();
        BlockHandle::decode_from(&mut v)
    } else {
        Err(Error::corruption(format!("cannot find the meta block: {name}")))
    }
}
