//! Thread-local performance counters.
//!
//! Each thread carries its own [`PerfContext`] and [`PerfLevel`]. Counters
//! are only touched when the level enables them, so the disabled path costs
//! one thread-local read.

use std::cell::{Cell, RefCell};
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum PerfLevel {
    #[default]
    Disable,
    /// Count events only.
    EnableCount,
    /// Count events and measure elapsed time.
    EnableTime,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PerfContext {
    pub block_read_count: u64,
    pub block_read_byte: u64,
    pub block_read_nanos: u64,
    pub get_from_memtable_count: u64,
    pub get_from_table_count: u64,
    pub write_wal_nanos: u64,
    pub write_memtable_nanos: u64,
}

thread_local! {
    static PERF_LEVEL: Cell<PerfLevel> = const { Cell::new(PerfLevel::Disable) };
    static PERF_CONTEXT: RefCell<PerfContext> = RefCell::new(PerfContext::default());
}

pub fn set_perf_level(level: PerfLevel) {
    PERF_LEVEL.with(|l| l.set(level));
}

#[must_use]
pub fn perf_level() -> PerfLevel {
    PERF_LEVEL.with(Cell::get)
}

/// Snapshot of the calling thread's counters.
#[must_use]
pub fn perf_context() -> PerfContext {
    PERF_CONTEXT.with(|c| c.borrow().clone())
}

pub fn reset_perf_context() {
    PERF_CONTEXT.with(|c| *c.borrow_mut() = PerfContext::default());
}

/// Adds `delta` to the counter selected by `field` when counting is enabled.
pub fn bump_perf_count(field: fn(&mut PerfContext) -> &mut u64, delta: u64) {
    if perf_level() >= PerfLevel::EnableCount {
        PERF_CONTEXT.with(|c| *field(&mut c.borrow_mut()) += delta);
    }
}

/// Measures a span and adds it to one counter when timing is enabled.
pub struct PerfTimer {
    start: Option<Instant>,
}

impl PerfTimer {
    #[must_use]
    pub fn start() -> Self {
        let start = (perf_level() >= PerfLevel::EnableTime).then(Instant::now);
        Self { start }
    }

    pub fn stop(self, field: fn(&mut PerfContext) -> &mut u64) {
        if let Some(start) = self.start {
            let nanos = u64::try_from(start.elapsed().as_nanos()).unwrap_or(u64::MAX);
            PERF_CONTEXT.with(|c| *field(&mut c.borrow_mut()) += nanos);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_stay_zero_when_disabled() {
        reset_perf_context();
        set_perf_level(PerfLevel::Disable);
        bump_perf_count(|c| &mut c.block_read_count, 3);
        assert_eq!(perf_context().block_read_count, 0);
    }

    #[test]
    fn counters_are_per_thread() {
        reset_perf_context();
        set_perf_level(PerfLevel::EnableCount);
        bump_perf_count(|c| &mut c.block_read_count, 2);

        let other = std::thread::spawn(|| {
            bump_perf_count(|c| &mut c.block_read_count, 5);
            perf_context().block_read_count
        })
        .join()
        .unwrap();

        assert_eq!(other, 0);
        assert_eq!(perf_context().block_read_count, 2);
        set_perf_level(PerfLevel::Disable);
    }

    #[test]
    fn timer_only_records_with_time_level() {
        reset_perf_context();
        set_perf_level(PerfLevel::EnableCount);
        PerfTimer::start().stop(|c| &mut c.write_wal_nanos);
        assert_eq!(perf_context().write_wal_nanos, 0);
        set_perf_level(PerfLevel::Disable);
    }
}
