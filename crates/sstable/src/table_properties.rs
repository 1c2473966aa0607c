//! Well-known per-table statistics stored in the properties block.

use std::fmt;

use common::properties::UserCollectedProperties;

/// Property names as stored in the properties block.
pub mod names {
    pub const RAW_KEY_SIZE: &str = "layerkv.raw.key.size";
    pub const RAW_VALUE_SIZE: &str = "layerkv.raw.value.size";
    pub const DATA_SIZE: &str = "layerkv.data.size";
    pub const INDEX_SIZE: &str = "layerkv.index.size";
    pub const NUM_ENTRIES: &str = "layerkv.num.entries";
    pub const NUM_DATA_BLOCKS: &str = "layerkv.num.data.blocks";
    pub const FILTER_SIZE: &str = "layerkv.filter.size";
    pub const FORMAT_VERSION: &str = "layerkv.format.version";
    pub const FIXED_KEY_LEN: &str = "layerkv.fixed.key.length";
    pub const FILTER_POLICY: &str = "layerkv.filter.policy";
    /// Written by the built-in sequence collector.
    pub const MAX_SEQUENCE: &str = "layerkv.max.sequence";
}

/// Meta-index name of the properties block.
pub const PROPERTIES_BLOCK: &str = "layerkv.properties";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableProperties {
    pub raw_key_size: u64,
    pub raw_value_size: u64,
    pub data_size: u64,
    pub index_size: u64,
    pub num_entries: u64,
    pub num_data_blocks: u64,
    pub filter_size: u64,
    pub format_version: u64,
    pub fixed_key_len: u64,
    /// Empty when the table has no filter.
    pub filter_policy_name: String,
    pub user_collected_properties: UserCollectedProperties,
}

impl TableProperties {
    /// The field a well-known `u64` property decodes into, if `name` is one.
    pub(crate) fn u64_field_mut(&mut self, name: &str) -> Option<&mut u64> {
        Some(match name {
            names::RAW_KEY_SIZE => &mut self.raw_key_size,
            names::RAW_VALUE_SIZE => &mut self.raw_value_size,
            names::DATA_SIZE => &mut self.data_size,
            names::INDEX_SIZE => &mut self.index_size,
            names::NUM_ENTRIES => &mut self.num_entries,
            names::NUM_DATA_BLOCKS => &mut self.num_data_blocks,
            names::FILTER_SIZE => &mut self.filter_size,
            names::FORMAT_VERSION => &mut self.format_version,
            names::FIXED_KEY_LEN => &mut self.fixed_key_len,
            _ => return None,
        })
    }
}

impl fmt::Display for TableProperties {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "# entries: {}; # data blocks: {}; raw key size: {}; raw value size: {}; data size: {}; index size: {}",
            self.num_entries,
            self.num_data_blocks,
            self.raw_key_size,
            self.raw_value_size,
            self.data_size,
            self.index_size,
        )?;
        if !self.filter_policy_name.is_empty() {
            write!(f, "; filter policy: {}", self.filter_policy_name)?;
        }
        Ok(())
    }
}
