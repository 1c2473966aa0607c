//! # Config - tunables for the LayerKV engine
//!
//! [`Options`] carries every knob the write path, table builder and
//! compaction consult, plus the pluggable capabilities (merge operator,
//! compaction filter, property collectors, statistics sink).
//! [`ReadOptions`] and [`WriteOptions`] are per-call.
//!
//! ## Environment
//!
//! [`Options::from_env`] starts from the defaults and overrides:
//!
//! ```text
//! LAYERKV_WRITE_BUFFER_KB      memtable flush threshold in KiB   (default: 4096)
//! LAYERKV_BLOCK_SIZE           target data block size in bytes  (default: 4096)
//! LAYERKV_RESTART_INTERVAL     keys between block restarts      (default: 16)
//! LAYERKV_MAX_SUCCESSIVE_MERGES eager-merge threshold, 0 = lazy (default: 0)
//! LAYERKV_INPLACE_UPDATE       "true" enables in-place puts     (default: false)
//! LAYERKV_FILTER_DELETES       "true" drops impossible deletes  (default: false)
//! ```

use std::fmt;
use std::sync::Arc;

use common::properties::TablePropertiesCollectorFactory;
use common::statistics::Statistics;
use common::{CompactionFilter, CompactionFilterFactory, MergeOperator, SequenceNumber};

/// Outcome of an in-place update callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateStatus {
    /// Nothing is written.
    Failed,
    /// The previous value was rewritten; this is its new content.
    UpdatedInplace(Vec<u8>),
    /// A fresh value was computed and must be added.
    Updated(Vec<u8>),
}

/// Called on `put` when in-place updates are enabled. Receives the previous
/// value, if any, and the value being written.
pub type InplaceCallback = Arc<dyn Fn(Option<&[u8]>, &[u8]) -> UpdateStatus + Send + Sync>;

/// Engine-wide options.
#[derive(Clone)]
pub struct Options {
    /// Create the database directory when it does not exist.
    pub create_if_missing: bool,
    /// Memtable size (approximate bytes) that triggers a flush.
    pub write_buffer_size: usize,
    /// Target uncompressed size of a data block.
    pub block_size: usize,
    /// Keys between restart points in data blocks.
    pub block_restart_interval: usize,
    /// Overwrite the newest value of a key instead of adding a version.
    pub inplace_update_support: bool,
    pub inplace_callback: Option<InplaceCallback>,
    /// Resolve merges eagerly once this many operands are chained on a key.
    /// `0` keeps merges lazy.
    pub max_successive_merges: usize,
    /// Drop deletes of keys that cannot exist.
    pub filter_deletes: bool,
    pub merge_operator: Option<Arc<dyn MergeOperator>>,
    pub compaction_filter: Option<Arc<dyn CompactionFilter>>,
    pub compaction_filter_factory: Option<Arc<dyn CompactionFilterFactory>>,
    pub table_properties_collectors: Vec<Arc<dyn TablePropertiesCollectorFactory>>,
    pub statistics: Option<Arc<Statistics>>,
    /// Check block checksums on every read.
    pub paranoid_checks: bool,
}

/// Defaults used when neither code nor environment overrides them.
pub const DEFAULT_WRITE_BUFFER_SIZE: usize = 4 * 1024 * 1024;
pub const DEFAULT_BLOCK_SIZE: usize = 4 * 1024;
pub const DEFAULT_BLOCK_RESTART_INTERVAL: usize = 16;

impl Default for Options {
    fn default() -> Self {
        Self {
            create_if_missing: true,
            write_buffer_size: DEFAULT_WRITE_BUFFER_SIZE,
            block_size: DEFAULT_BLOCK_SIZE,
            block_restart_interval: DEFAULT_BLOCK_RESTART_INTERVAL,
            inplace_update_support: false,
            inplace_callback: None,
            max_successive_merges: 0,
            filter_deletes: false,
            merge_operator: None,
            compaction_filter: None,
            compaction_filter_factory: None,
            table_properties_collectors: Vec::new(),
            statistics: None,
            paranoid_checks: true,
        }
    }
}

/// Reads a configuration value from the environment, falling back to `default`.
fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

impl Options {
    /// Defaults overridden by `LAYERKV_*` environment variables.
    /// Unparseable values fall back to the default.
    #[must_use]
    pub fn from_env() -> Self {
        let d = Self::default();
        let write_buffer_kb: usize = env_or("LAYERKV_WRITE_BUFFER_KB", "")
            .parse()
            .unwrap_or(d.write_buffer_size / 1024);
        Self {
            write_buffer_size: write_buffer_kb.max(1) * 1024,
            block_size: env_or("LAYERKV_BLOCK_SIZE", "").parse().unwrap_or(d.block_size),
            block_restart_interval: env_or("LAYERKV_RESTART_INTERVAL", "")
                .parse::<usize>()
                .unwrap_or(d.block_restart_interval)
                .max(1),
            max_successive_merges: env_or("LAYERKV_MAX_SUCCESSIVE_MERGES", "")
                .parse()
                .unwrap_or(d.max_successive_merges),
            inplace_update_support: env_or("LAYERKV_INPLACE_UPDATE", "false").parse().unwrap_or(false),
            filter_deletes: env_or("LAYERKV_FILTER_DELETES", "false").parse().unwrap_or(false),
            ..d
        }
    }

    #[must_use]
    pub fn with_merge_operator(mut self, op: Arc<dyn MergeOperator>) -> Self {
        self.merge_operator = Some(op);
        self
    }

    #[must_use]
    pub fn with_compaction_filter(mut self, filter: Arc<dyn CompactionFilter>) -> Self {
        self.compaction_filter = Some(filter);
        self
    }

    #[must_use]
    pub fn with_statistics(mut self, stats: Arc<Statistics>) -> Self {
        self.statistics = Some(stats);
        self
    }

    /// Logs every option at info level.
    pub fn dump(&self) {
        tracing::info!(
            create_if_missing = self.create_if_missing,
            write_buffer_size = self.write_buffer_size,
            block_size = self.block_size,
            block_restart_interval = self.block_restart_interval,
            inplace_update_support = self.inplace_update_support,
            inplace_callback = self.inplace_callback.is_some(),
            max_successive_merges = self.max_successive_merges,
            filter_deletes = self.filter_deletes,
            paranoid_checks = self.paranoid_checks,
            "options"
        );
        tracing::info!(
            merge_operator = self.merge_operator.as_ref().map_or("None", |m| m.name()),
            compaction_filter = self.compaction_filter.as_ref().map_or("None", |f| f.name()),
            compaction_filter_factory = self.compaction_filter_factory.as_ref().map_or("None", |f| f.name()),
            table_properties_collectors = self.table_properties_collectors.len(),
            statistics = self.statistics.is_some(),
            "options: capabilities"
        );
    }
}

impl fmt::Debug for Options {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Options")
            .field("create_if_missing", &self.create_if_missing)
            .field("write_buffer_size", &self.write_buffer_size)
            .field("block_size", &self.block_size)
            .field("block_restart_interval", &self.block_restart_interval)
            .field("inplace_update_support", &self.inplace_update_support)
            .field("max_successive_merges", &self.max_successive_merges)
            .field("filter_deletes", &self.filter_deletes)
            .field("merge_operator", &self.merge_operator.as_ref().map(|m| m.name().to_string()))
            .field("compaction_filter", &self.compaction_filter.as_ref().map(|c| c.name().to_string()))
            .finish_non_exhaustive()
    }
}

/// Per-read options.
#[derive(Debug, Clone, Default)]
pub struct ReadOptions {
    /// Read as of this sequence number; `None` reads the latest state.
    pub snapshot: Option<SequenceNumber>,
    pub verify_checksums: bool,
}

impl ReadOptions {
    #[must_use]
    pub fn at_snapshot(seq: SequenceNumber) -> Self {
        Self {
            snapshot: Some(seq),
            ..Self::default()
        }
    }
}

/// Per-write options.
#[derive(Debug, Clone, Copy, Default)]
pub struct WriteOptions {
    /// fsync the log before acknowledging the write.
    pub sync: bool,
    /// Skip the log entirely; the write is lost on crash.
    pub disable_wal: bool,
}
