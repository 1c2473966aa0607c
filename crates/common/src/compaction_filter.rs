//! Hooks that let callers drop or rewrite values while tables are merged.

/// What a [`CompactionFilter`] wants done with one value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterDecision {
    Keep,
    Remove,
    /// Keep the key but store this value instead.
    Change(Vec<u8>),
}

pub trait CompactionFilter: Send + Sync {
    fn filter(&self, level: usize, key: &[u8], existing_value: &[u8]) -> FilterDecision;

    fn name(&self) -> &str;
}

/// Describes the compaction a filter is created for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompactionFilterContext {
    /// Every table participates.
    pub is_full_compaction: bool,
    /// Requested explicitly by the caller.
    pub is_manual_compaction: bool,
}

/// Produces one filter per compaction run. Returning `None` means no
/// filtering for that run.
pub trait CompactionFilterFactory: Send + Sync {
    fn create_compaction_filter(&self, context: &CompactionFilterContext) -> Option<Box<dyn CompactionFilter>>;

    fn name(&self) -> &str;
}
