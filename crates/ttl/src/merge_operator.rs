//! Merging timestamped values.

use std::sync::Arc;

use common::coding::put_fixed32;
use common::MergeOperator;
use tracing::warn;

use crate::{current_time, strip_ts};

/// Strips the existing value and every operand, runs the user's operator
/// and stamps the result with the current time.
///
/// A value too short to carry a timestamp fails the merge.
pub struct TtlMergeOperator {
    user: Arc<dyn MergeOperator>,
}

impl TtlMergeOperator {
    pub fn new(user: Arc<dyn MergeOperator>) -> Self {
        Self { user }
    }

    fn stamp(mut merged: Vec<u8>) -> Option<Vec<u8>> {
        match current_time() {
            Ok(now) => {
                put_fixed32(&mut merged, now);
                Some(merged)
            }
            Err(e) => {
                warn!(error = %e, "cannot read the clock to stamp a merge result");
                None
            }
        }
    }
}

impl MergeOperator for TtlMergeOperator {
    fn full_merge(&self, key: &[u8], existing: Option<&[u8]>, operands: &[Vec<u8>]) -> Option<Vec<u8>> {
        let existing = match existing.map(strip_ts).transpose() {
            Ok(existing) => existing,
            Err(_) => {
                warn!("existing value too short for ttl merge");
                return None;
            }
        };
        let mut stripped = Vec::with_capacity(operands.len());
        for operand in operands {
            let Ok(op) = strip_ts(operand) else {
                warn!("operand too short for ttl merge");
                return None;
            };
            stripped.push(op.to_vec());
        }
        let merged = self.user.full_merge(key, existing, &stripped)?;
        Self::stamp(merged)
    }

    fn partial_merge_multi(&self, key: &[u8], operands: &[&[u8]]) -> Option<Vec<u8>> {
        let mut stripped = Vec::with_capacity(operands.len());
        for operand in operands {
            let Ok(op) = strip_ts(operand) else {
                warn!("operand too short for ttl partial merge");
                return None;
            };
            stripped.push(op);
        }
        let merged = self.user.partial_merge_multi(key, &stripped)?;
        Self::stamp(merged)
    }

    fn name(&self) -> &str {
        "Merge By TTL"
    }
}
