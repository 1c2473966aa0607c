//! # Common - shared building blocks for LayerKV
//!
//! Everything more than one crate needs lives here:
//!
//! | Module                | Purpose                                              |
//! |-----------------------|------------------------------------------------------|
//! | [`error`]             | `Error` status kinds and the `Result` alias          |
//! | [`coding`]            | Fixed-width and varint encodings                     |
//! | [`dbformat`]          | Value types, sequence numbers, internal keys         |
//! | [`comparator`]        | Bytewise and internal-key orderings                  |
//! | [`iterator`]          | The `DbIterator` cursor protocol                     |
//! | [`merge_operator`]    | Merge capability + stock operators                   |
//! | [`compaction_filter`] | Compaction filter capability and its factory         |
//! | [`properties`]        | Table-properties collector hooks                     |
//! | [`statistics`]        | Write-path tickers                                   |
//! | [`perf`]              | Thread-local performance counters                    |

pub mod coding;
pub mod comparator;
pub mod compaction_filter;
pub mod dbformat;
pub mod error;
pub mod iterator;
pub mod merge_operator;
pub mod perf;
pub mod properties;
pub mod statistics;

pub use compaction_filter::{CompactionFilter, CompactionFilterContext, CompactionFilterFactory, FilterDecision};
pub use dbformat::{SequenceNumber, ValueType};
pub use error::{Error, Result};
pub use iterator::DbIterator;
pub use merge_operator::MergeOperator;
