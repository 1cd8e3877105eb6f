//! Monotonic engine counters, observable without blocking writers.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// The engine's statistics block: six independent monotonic counters.
///
/// All operations use `Ordering::Relaxed` because these are purely
/// statistical counters:
///
/// 1. No control flow dependencies - no code path depends on these values
///    being "up to date"
/// 2. Eventual visibility is acceptable - slightly stale reads are fine for
///    observability
/// 3. No happens-before relationships needed - unlike the region cursors,
///    these don't guard any other data or coordinate the producer-consumer
///    handoff
#[derive(Debug, Default)]
pub struct Stats {
    /// Records entering `log()`.
    total_accepted: AtomicU64,
    /// Records accepted by the API but never placed into a region.
    total_dropped: AtomicU64,
    /// Flush units drained to the sink without error.
    total_flushes: AtomicU64,
    /// Bytes written to the sink.
    bytes_written: AtomicU64,
    /// Sink write failures and recovered background panics.
    flush_errors: AtomicU64,
    /// Successful active-region swaps in double-buffered strategies.
    set_swaps: AtomicU64,
}

impl Stats {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub(crate) fn record_accepted(&self) {
        self.total_accepted.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_dropped(&self) {
        self.total_dropped.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_flush(&self) {
        self.total_flushes.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn add_bytes_written(&self, bytes: u64) {
        self.bytes_written.fetch_add(bytes, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_flush_error(&self) {
        self.flush_errors.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_swap(&self) {
        self.set_swaps.fetch_add(1, Ordering::Relaxed);
    }

    /// Takes a snapshot of each counter independently. Cross-counter ratios
    /// may be slightly inconsistent at any instant.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            total_accepted: self.total_accepted.load(Ordering::Relaxed),
            total_dropped: self.total_dropped.load(Ordering::Relaxed),
            total_flushes: self.total_flushes.load(Ordering::Relaxed),
            bytes_written: self.bytes_written.load(Ordering::Relaxed),
            flush_errors: self.flush_errors.load(Ordering::Relaxed),
            set_swaps: self.set_swaps.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time view of the engine counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub total_accepted: u64,
    pub total_dropped: u64,
    pub total_flushes: u64,
    pub bytes_written: u64,
    pub flush_errors: u64,
    pub set_swaps: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_accumulate() {
        let stats = Stats::new();
        stats.record_accepted();
        stats.record_accepted();
        stats.record_dropped();
        stats.record_flush();
        stats.add_bytes_written(128);
        stats.record_flush_error();
        stats.record_swap();

        let snap = stats.snapshot();
        assert_eq!(snap.total_accepted, 2);
        assert_eq!(snap.total_dropped, 1);
        assert_eq!(snap.total_flushes, 1);
        assert_eq!(snap.bytes_written, 128);
        assert_eq!(snap.flush_errors, 1);
        assert_eq!(snap.set_swaps, 1);
    }
}
