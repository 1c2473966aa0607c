//! # TTL - expiring values on top of any [`Db`](engine::Db)
//!
//! Every value written through [`TtlDb`] carries a 4-byte little-endian
//! write time (seconds since the UNIX epoch) appended to it. Reads strip the
//! suffix; compactions drop values whose age exceeds the configured TTL.
//!
//! ```text
//! stored value = user value | fixed32 LE timestamp
//! ```
//!
//! | Module               | Purpose                                         |
//! |----------------------|-------------------------------------------------|
//! | [`db`]               | `TtlDb`: stamping writes, stripping reads       |
//! | [`iterator`]         | `TtlIterator`: strips values, exposes timestamps|
//! | [`compaction_filter`]| Drops stale values during compaction            |
//! | [`merge_operator`]   | Merges user values, re-stamps the result        |
//!
//! Expiry is enforced only by compaction: a stale value stays readable until
//! a compaction removes it, unless the stale-read filter is enabled.

pub mod compaction_filter;
pub mod db;
pub mod iterator;
pub mod merge_operator;

use std::io;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use common::coding::{decode_fixed32, put_fixed32};
use common::{Error, Result};
use config::Options;

pub use compaction_filter::{TtlCompactionFilter, TtlCompactionFilterFactory};
pub use db::TtlDb;
pub use iterator::TtlIterator;
pub use merge_operator::TtlMergeOperator;

/// Bytes of the timestamp suffix.
pub const TS_LENGTH: usize = 4;

/// Smallest timestamp a valid value can carry; anything older predates the
/// suffix format.
pub const MIN_TIMESTAMP: u32 = 1_368_146_402;

pub const MAX_TIMESTAMP: u32 = i32::MAX as u32;

/// Current wall-clock time in whole seconds.
pub fn current_time() -> Result<u32> {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(io::Error::other)?
        .as_secs();
    u32::try_from(secs).map_err(|_| Error::from(io::Error::other("clock beyond timestamp range")))
}

/// Returns `value` with the current time appended.
pub fn append_ts(value: &[u8]) -> Result<Vec<u8>> {
    let now = current_time()?;
    let mut out = Vec::with_capacity(value.len() + TS_LENGTH);
    out.extend_from_slice(value);
    put_fixed32(&mut out, now);
    Ok(out)
}

/// Checks that `value` ends in a plausible timestamp.
pub fn sanity_check_timestamp(value: &[u8]) -> Result<()> {
    let ts = timestamp(value)?;
    if ts < MIN_TIMESTAMP {
        return Err(Error::corruption("timestamp is older than the ttl format"));
    }
    Ok(())
}

/// The user value without its timestamp suffix.
pub fn strip_ts(value: &[u8]) -> Result<&[u8]> {
    value
        .len()
        .checked_sub(TS_LENGTH)
        .map(|n| &value[..n])
        .ok_or_else(|| Error::corruption("value is shorter than its timestamp"))
}

/// The timestamp suffix of `value`.
pub fn timestamp(value: &[u8]) -> Result<u32> {
    let n = strip_ts(value)?.len();
    Ok(decode_fixed32(&value[n..]))
}

/// True when `value` was written more than `ttl` seconds ago.
///
/// A non-positive `ttl` never expires anything. Values that are too short or
/// cannot be compared against the clock are treated as fresh.
pub fn is_stale(value: &[u8], ttl: i32) -> bool {
    if ttl <= 0 {
        return false;
    }
    let (Ok(ts), Ok(now)) = (timestamp(value), current_time()) else {
        return false;
    };
    i64::from(ts) + i64::from(ttl) < i64::from(now)
}

/// Strips the suffix from an owned value in place.
pub(crate) fn strip_owned(mut value: Vec<u8>) -> Result<Vec<u8>> {
    let n = strip_ts(&value)?.len();
    value.truncate(n);
    Ok(value)
}

/// Rewires `options` so that the store sees timestamped values.
///
/// - A user compaction filter is wrapped in a [`TtlCompactionFilter`].
/// - Otherwise a [`TtlCompactionFilterFactory`] is installed, wrapping the
///   user's factory if there is one, so stale values are always dropped.
/// - A user merge operator is wrapped in a [`TtlMergeOperator`].
pub fn sanitize_options(ttl: i32, options: &mut Options) {
    if let Some(user) = options.compaction_filter.take() {
        options.compaction_filter = Some(Arc::new(TtlCompactionFilter::new(ttl, Some(user))));
    } else {
        let user_factory = options.compaction_filter_factory.take();
        options.compaction_filter_factory = Some(Arc::new(TtlCompactionFilterFactory::new(ttl, user_factory)));
    }
    if let Some(user) = options.merge_operator.take() {
        options.merge_operator = Some(Arc::new(TtlMergeOperator::new(user)));
    }
}
