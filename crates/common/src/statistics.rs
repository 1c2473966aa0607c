//! Informational counters for the write path.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ticker {
    /// Values added by the in-place update callback path.
    NumberKeysWritten,
    /// Values overwritten in place.
    NumberKeysUpdated,
    /// Eager merges that failed and fell back to storing the operand.
    NumberMergeFailures,
    /// Deletes dropped because the key could not exist.
    NumberFilteredDeletes,
}

const TICKER_COUNT: usize = 4;

impl Ticker {
    pub const ALL: [Ticker; TICKER_COUNT] = [
        Ticker::NumberKeysWritten,
        Ticker::NumberKeysUpdated,
        Ticker::NumberMergeFailures,
        Ticker::NumberFilteredDeletes,
    ];

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Ticker::NumberKeysWritten => "layerkv.number.keys.written",
            Ticker::NumberKeysUpdated => "layerkv.number.keys.updated",
            Ticker::NumberMergeFailures => "layerkv.number.merge.failures",
            Ticker::NumberFilteredDeletes => "layerkv.number.deletes.filtered",
        }
    }
}

#[derive(Debug, Default)]
pub struct Statistics {
    tickers: [AtomicU64; TICKER_COUNT],
}

impl Statistics {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_tick(&self, ticker: Ticker, count: u64) {
        self.tickers[ticker as usize].fetch_add(count, Ordering::Relaxed);
    }

    #[must_use]
    pub fn ticker_count(&self, ticker: Ticker) -> u64 {
        self.tickers[ticker as usize].load(Ordering::Relaxed)
    }

    /// Human-readable dump, one `name COUNT : n` line per ticker.
    #[must_use]
    pub fn to_report(&self) -> String {
        Ticker::ALL
            .iter()
            .map(|t| format!("{} COUNT : {}\n", t.name(), self.ticker_count(*t)))
            .collect()
    }
}

/// Bumps `ticker` by one when a statistics sink is configured.
pub fn record_tick(stats: Option<&Arc<Statistics>>, ticker: Ticker) {
    if let Some(s) = stats {
        s.record_tick(ticker, 1);
    }
}
