//! Compaction-time expiry.

use std::sync::Arc;

use common::{CompactionFilter, CompactionFilterContext, CompactionFilterFactory, FilterDecision};

use crate::{is_stale, strip_ts, TS_LENGTH};

/// Removes stale values, then lets the user's filter judge the rest on
/// their stripped form.
pub struct TtlCompactionFilter {
    ttl: i32,
    user: Option<Arc<dyn CompactionFilter>>,
}

impl TtlCompactionFilter {
    pub fn new(ttl: i32, user: Option<Arc<dyn CompactionFilter>>) -> Self {
        Self { ttl, user }
    }
}

impl CompactionFilter for TtlCompactionFilter {
    fn filter(&self, level: usize, key: &[u8], existing_value: &[u8]) -> FilterDecision {
        if is_stale(existing_value, self.ttl) {
            return FilterDecision::Remove;
        }
        let Some(user) = &self.user else {
            return FilterDecision::Keep;
        };
        let Ok(stripped) = strip_ts(existing_value) else {
            return FilterDecision::Keep;
        };
        match user.filter(level, key, stripped) {
            FilterDecision::Change(mut changed) => {
                // Keep the original write time.
                changed.extend_from_slice(&existing_value[existing_value.len() - TS_LENGTH..]);
                FilterDecision::Change(changed)
            }
            decision => decision,
        }
    }

    fn name(&self) -> &str {
        "Delete By TTL"
    }
}

/// Hands out a [`TtlCompactionFilter`] for every compaction, wrapping
/// whatever the user's factory produces.
pub struct TtlCompactionFilterFactory {
    ttl: i32,
    user_factory: Option<Arc<dyn CompactionFilterFactory>>,
}

impl TtlCompactionFilterFactory {
    pub fn new(ttl: i32, user_factory: Option<Arc<dyn CompactionFilterFactory>>) -> Self {
        Self { ttl, user_factory }
    }
}

impl CompactionFilterFactory for TtlCompactionFilterFactory {
    fn create_compaction_filter(&self, context: &CompactionFilterContext) -> Option<Box<dyn CompactionFilter>> {
        let user = self
            .user_factory
            .as_ref()
            .and_then(|f| f.create_compaction_filter(context))
            .map(Arc::from);
        Some(Box::new(TtlCompactionFilter::new(self.ttl, user)))
    }

    fn name(&self) -> &str {
        "TtlCompactionFilterFactory"
    }
}
