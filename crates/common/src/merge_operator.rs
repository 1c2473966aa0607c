//! Pluggable read-modify-write semantics for `merge` records.

use crate::coding::{decode_fixed64, put_fixed64};

/// Combines a base value with a run of merge operands.
///
/// Operands are always passed oldest first. Returning `None` signals a
/// failed merge; callers decide whether that is fatal.
pub trait MergeOperator: Send + Sync {
    fn full_merge(&self, key: &[u8], existing: Option<&[u8]>, operands: &[Vec<u8>]) -> Option<Vec<u8>>;

    /// Collapses several operands into one without a base value.
    /// Operators that cannot do this keep the default.
    fn partial_merge_multi(&self, _key: &[u8], _operands: &[&[u8]]) -> Option<Vec<u8>> {
        None
    }

    fn name(&self) -> &str;
}

/// Concatenates operands onto the existing value, separated by `delimiter`.
#[derive(Debug, Clone)]
pub struct StringAppendOperator {
    delimiter: u8,
}

impl StringAppendOperator {
    #[must_use]
    pub fn new(delimiter: u8) -> Self {
        Self { delimiter }
    }
}

impl MergeOperator for StringAppendOperator {
    fn full_merge(&self, _key: &[u8], existing: Option<&[u8]>, operands: &[Vec<u8>]) -> Option<Vec<u8>> {
        let mut out = existing.map(<[u8]>::to_vec);
        for op in operands {
            match out.as_mut() {
                Some(buf) => {
                    buf.push(self.delimiter);
                    buf.extend_from_slice(op);
                }
                None => out = Some(op.clone()),
            }
        }
        Some(out.unwrap_or_default())
    }

    fn partial_merge_multi(&self, key: &[u8], operands: &[&[u8]]) -> Option<Vec<u8>> {
        let owned: Vec<Vec<u8>> = operands.iter().map(|o| o.to_vec()).collect();
        self.full_merge(key, None, &owned)
    }

    fn name(&self) -> &str {
        "StringAppendOperator"
    }
}

/// Treats values and operands as fixed64 counters and sums them.
/// A value that is not exactly 8 bytes fails the merge.
#[derive(Debug, Default, Clone, Copy)]
pub struct UInt64AddOperator;

impl UInt64AddOperator {
    fn decode(bytes: &[u8]) -> Option<u64> {
        (bytes.len() == 8).then(|| decode_fixed64(bytes))
    }

    fn encode(v: u64) -> Vec<u8> {
        let mut out = Vec::with_capacity(8);
        put_fixed64(&mut out, v);
        out
    }
}

impl MergeOperator for UInt64AddOperator {
    fn full_merge(&self, _key: &[u8], existing: Option<&[u8]>, operands: &[Vec<u8>]) -> Option<Vec<u8>> {
        let mut sum = match existing {
            Some(v) => Self::decode(v)?,
            None => 0,
        };
        for op in operands {
            sum = sum.wrapping_add(Self::decode(op)?);
        }
        Some(Self::encode(sum))
    }

    fn partial_merge_multi(&self, _key: &[u8], operands: &[&[u8]]) -> Option<Vec<u8>> {
        let mut sum = 0u64;
        for op in operands {
            sum = sum.wrapping_add(Self::decode(op)?);
        }
        Some(Self::encode(sum))
    }

    fn name(&self) -> &str {
        "UInt64AddOperator"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_append_joins_in_operand_order() {
        let op = StringAppendOperator::new(b',');
        let merged = op.full_merge(b"k", Some(b"a"), &[b"b".to_vec(), b"c".to_vec()]);
        assert_eq!(merged.as_deref(), Some(&b"a,b,c"[..]));
        let merged = op.full_merge(b"k", None, &[b"x".to_vec()]);
        assert_eq!(merged.as_deref(), Some(&b"x"[..]));
    }

    #[test]
    fn uint64_add_rejects_malformed_operand() {
        let op = UInt64AddOperator;
        let one = UInt64AddOperator::encode(1);
        assert_eq!(
            op.full_merge(b"k", Some(&one), &[one.clone(), one.clone()]),
            Some(UInt64AddOperator::encode(3))
        );
        assert_eq!(op.full_merge(b"k", None, &[b"bad".to_vec()]), None);
    }
}
