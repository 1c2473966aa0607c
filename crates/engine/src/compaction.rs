//! Manual full compaction: merges every table into one.
//!
//! The memtable is flushed first, so the output is the single bottom level
//! and tombstones can be dropped. Merge operands are resolved and the
//! configured compaction filter sees every surviving value.

use std::fs;
use std::sync::Arc;

use common::dbformat::{InternalKey, MAX_SEQUENCE_NUMBER};
use common::{CompactionFilter, CompactionFilterContext, FilterDecision, Result, ValueType};
use config::ReadOptions;
use sstable::Table;
use tracing::{info, warn};

use crate::read::{collect_versions, group_by_user_key, resolve_versions};
use crate::write::write_table;
use crate::{Engine, TableFile};

#[derive(Debug, Default)]
struct CompactionStats {
    input_versions: usize,
    output_entries: usize,
    dropped: usize,
    filtered: usize,
}

impl Engine {
    pub(crate) fn compact_range_impl(&self) -> Result<()> {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        self.flush_locked(inner)?;
        if inner.tables.is_empty() {
            return Ok(());
        }

        let read_options = ReadOptions {
            snapshot: None,
            verify_checksums: self.options.paranoid_checks,
        };
        let versions = collect_versions(&inner.mem, &inner.tables, MAX_SEQUENCE_NUMBER, &read_options)?;

        let product;
        let filter: Option<&dyn CompactionFilter> = match &self.options.compaction_filter {
            Some(f) => Some(f.as_ref()),
            None => {
                let context = CompactionFilterContext {
                    is_full_compaction: true,
                    is_manual_compaction: true,
                };
                product = self
                    .options
                    .compaction_filter_factory
                    .as_ref()
                    .and_then(|factory| factory.create_compaction_filter(&context));
                product.as_deref()
            }
        };

        let mut stats = CompactionStats {
            input_versions: versions.len(),
            ..CompactionStats::default()
        };
        let mut output: Vec<(Vec<u8>, Vec<u8>)> = Vec::new();
        for run in group_by_user_key(&versions) {
            let (newest, _) = &run[0];
            if self.options.merge_operator.is_none() && has_pending_operands(run) {
                // Cannot resolve without an operator; carry the history over.
                output.extend(run.iter().map(|(k, v)| (k.encode(), v.clone())));
                continue;
            }
            let Some(value) = resolve_versions(run, &self.options)? else {
                stats.dropped += 1;
                continue;
            };
            let value = match filter.map(|f| f.filter(0, &newest.user_key, &value)) {
                None | Some(FilterDecision::Keep) => value,
                Some(FilterDecision::Change(changed)) => changed,
                Some(FilterDecision::Remove) => {
                    stats.filtered += 1;
                    continue;
                }
            };
            let key = InternalKey::new(newest.user_key.clone(), newest.sequence, ValueType::Value);
            output.push((key.encode(), value));
        }
        stats.output_entries = output.len();

        let mut compacted = Vec::new();
        if !output.is_empty() {
            let number = inner.next_file_number;
            inner.next_file_number += 1;
            let path = Self::table_path(&self.dir, number);
            write_table(&self.dir, &path, &self.options, output)?;
            compacted.push(TableFile {
                number,
                table: Arc::new(Table::open_path(&path)?),
            });
        }

        let inputs = std::mem::replace(&mut inner.tables, compacted);
        for old in &inputs {
            let path = Self::table_path(&self.dir, old.number);
            if let Err(e) = fs::remove_file(&path) {
                warn!(path = %path.display(), error = %e, "failed to remove compacted table");
            }
        }

        info!(
            input_tables = inputs.len(),
            input_versions = stats.input_versions,
            output_entries = stats.output_entries,
            dropped = stats.dropped,
            filtered = stats.filtered,
            "manual compaction finished"
        );
        Ok(())
    }
}

/// True if merge operands sit above the key's base entry.
fn has_pending_operands(run: &[(InternalKey, Vec<u8>)]) -> bool {
    run.iter()
        .map(|(k, _)| k.value_type)
        .take_while(|t| !matches!(t, ValueType::Value | ValueType::Deletion))
        .any(|t| t == ValueType::Merge)
}
