//! Key orderings used by sorted blocks.

use std::cmp::Ordering;
use std::sync::Arc;

use crate::coding::decode_fixed64;
use crate::dbformat::{extract_user_key, INTERNAL_KEY_TRAILER};

pub trait Comparator: Send + Sync {
    fn compare(&self, a: &[u8], b: &[u8]) -> Ordering;

    /// Identifies the ordering; persisted nowhere yet but used in logs.
    fn name(&self) -> &str;
}

/// Plain lexicographic byte ordering. Meta-index and property blocks use it.
#[derive(Debug, Default, Clone, Copy)]
pub struct BytewiseComparator;

impl Comparator for BytewiseComparator {
    fn compare(&self, a: &[u8], b: &[u8]) -> Ordering {
        a.cmp(b)
    }

    fn name(&self) -> &str {
        "layerkv.BytewiseComparator"
    }
}

/// Orders encoded internal keys: user key ascending, then sequence/type
/// trailer descending.
#[derive(Debug, Default, Clone, Copy)]
pub struct InternalKeyComparator;

impl Comparator for InternalKeyComparator {
    fn compare(&self, a: &[u8], b: &[u8]) -> Ordering {
        extract_user_key(a).cmp(extract_user_key(b)).then_with(|| {
            if a.len() < INTERNAL_KEY_TRAILER || b.len() < INTERNAL_KEY_TRAILER {
                return a.len().cmp(&b.len());
            }
            let ta = decode_fixed64(&a[a.len() - INTERNAL_KEY_TRAILER..]);
            let tb = decode_fixed64(&b[b.len() - INTERNAL_KEY_TRAILER..]);
            tb.cmp(&ta)
        })
    }

    fn name(&self) -> &str {
        "layerkv.InternalKeyComparator"
    }
}

#[must_use]
pub fn bytewise() -> Arc<dyn Comparator> {
    Arc::new(BytewiseComparator)
}

#[must_use]
pub fn internal() -> Arc<dyn Comparator> {
    Arc::new(InternalKeyComparator)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dbformat::{encode_internal_key, ValueType};

    #[test]
    fn newer_sequence_sorts_first() {
        let cmp = InternalKeyComparator;
        let old = encode_internal_key(b"k", 1, ValueType::Value);
        let new = encode_internal_key(b"k", 9, ValueType::Value);
        assert_eq!(cmp.compare(&new, &old), Ordering::Less);
    }

    #[test]
    fn user_key_dominates_sequence() {
        let cmp = InternalKeyComparator;
        let a = encode_internal_key(b"a", 1, ValueType::Value);
        let b = encode_internal_key(b"b", 100, ValueType::Value);
        assert_eq!(cmp.compare(&a, &b), Ordering::Less);
    }
}
