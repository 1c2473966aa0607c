//! # SSTable - Sorted String Table
//!
//! Immutable, block-structured table files for the LayerKV storage engine.
//! A flush or compaction streams sorted internal-key entries through a
//! [`TableBuilder`]; readers open the file as a [`Table`] and iterate it
//! through a [`TwoLevelIterator`] (index block over data blocks).
//!
//! ## File layout
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │ DATA BLOCK 0 .. N   (sorted block + trailer) │
//! ├──────────────────────────────────────────────┤
//! │ INDEX BLOCK   last key of block i -> handle  │
//! ├──────────────────────────────────────────────┤
//! │ PROPERTIES BLOCK   name -> value             │
//! ├──────────────────────────────────────────────┤
//! │ META-INDEX BLOCK   block name -> handle      │
//! ├──────────────────────────────────────────────┤
//! │ FOOTER (48 B)   metaindex + index handles,   │
//! │                 padding, magic "LayerKV1"    │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! Every block ends with a 5-byte trailer: a type byte and a CRC32 of the
//! contents plus type.
//!
//! ## Modules
//!
//! | Module                 | Purpose                                           |
//! |------------------------|---------------------------------------------------|
//! | [`format`]             | Block handles, footer, trailer, raw block reads   |
//! | `block_builder`        | Prefix-compressed sorted block writer             |
//! | `block`                | Sorted block reader and cursor                    |
//! | [`two_level`]          | Index-over-data-blocks cursor                     |
//! | [`table_properties`]   | Well-known property names and values              |
//! | [`meta_blocks`]        | Meta-index and properties block I/O               |
//! | `table_builder`        | Streaming table writer                            |
//! | `table`                | Table reader                                      |

mod block;
mod block_builder;
pub mod format;
pub mod meta_blocks;
mod table;
mod table_builder;
pub mod table_properties;
pub mod two_level;

pub use block::Block;
pub use block_builder::BlockBuilder;
pub use format::{BlockHandle, FileReader, Footer, RandomAccessFile};
pub use table::Table;
pub use table_builder::TableBuilder;
pub use table_properties::TableProperties;
pub use two_level::TwoLevelIterator;

#[cfg(test)]
mod tests;
