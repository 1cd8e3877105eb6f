//! Sharded double-buffer strategies: two shard groups, wholesale swap.
//!
//! Swapping the whole group rather than one shard means producers never see
//! a transiently inconsistent mix of sealed and unsealed peers, the incoming
//! group starts empty, and the flush worker drains the outgoing group without
//! interference.

use crate::config::ShardLayout;
use crate::stats::Stats;
use crate::strategy::{FlushUnit, WritePath};
use shardbuf::{ShardGroup, WriteMode};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// How the active-group designation moves to the peer.
enum SwapCtl {
    /// Exclusive lock; losers find it taken and proceed.
    Locked(Mutex<()>),
    /// CAS with a guard flag that keeps concurrent swap attempts from doing
    /// redundant work.
    Cas { guard: AtomicBool },
}

pub(crate) struct ShardedDouble {
    groups: [Arc<ShardGroup>; 2],
    active: AtomicUsize,
    swap: SwapCtl,
    tx: mpsc::Sender<FlushUnit>,
    stats: Arc<Stats>,
    name: &'static str,
}

impl ShardedDouble {
    /// The `sharded-double-buffer` variant: locked swap, locked shard
    /// appends.
    pub(crate) fn locked(
        layout: ShardLayout,
        tx: mpsc::Sender<FlushUnit>,
        stats: Arc<Stats>,
    ) -> Self {
        Self::new(
            layout,
            WriteMode::Locked,
            SwapCtl::Locked(Mutex::new(())),
            tx,
            stats,
            "sharded-double-buffer",
        )
    }

    /// The `sharded-double-buffer-cas` variant: CAS swap, CAS shard appends.
    pub(crate) fn cas(
        layout: ShardLayout,
        tx: mpsc::Sender<FlushUnit>,
        stats: Arc<Stats>,
    ) -> Self {
        Self::new(
            layout,
            WriteMode::Cas,
            SwapCtl::Cas {
                guard: AtomicBool::new(false),
            },
            tx,
            stats,
            "sharded-double-buffer-cas",
        )
    }

    fn new(
        layout: ShardLayout,
        mode: WriteMode,
        swap: SwapCtl,
        tx: mpsc::Sender<FlushUnit>,
        stats: Arc<Stats>,
        name: &'static str,
    ) -> Self {
        Self {
            groups: [
                Arc::new(ShardGroup::new(layout.count, layout.per_shard, mode)),
                Arc::new(ShardGroup::new(layout.count, layout.per_shard, mode)),
            ],
            active: AtomicUsize::new(0),
            swap,
            tx,
            stats,
            name,
        }
    }

    fn active_index(&self) -> usize {
        self.active.load(Ordering::Acquire)
    }

    /// Attempts to move the active designation away from `observed` and
    /// enqueue the whole outgoing group. Losers simply proceed and retry
    /// their write against whatever is now active.
    fn swap_from(&self, observed: usize) {
        match &self.swap {
            SwapCtl::Locked(lock) => {
                if let Ok(_guard) = lock.try_lock() {
                    self.try_flip(observed);
                }
            }
            SwapCtl::Cas { guard } => {
                if guard
                    .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                    .is_ok()
                {
                    self.try_flip(observed);
                    guard.store(false, Ordering::Release);
                }
            }
        }
    }

    fn try_flip(&self, observed: usize) {
        if self
            .active
            .compare_exchange(observed, 1 - observed, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            self.stats.record_swap();
            // Seal every shard of the outgoing set before the handoff so the
            // consumer only ever receives regions that take no new
            // reservations.
            self.groups[observed].seal_all();
            // Non-blocking handoff; a full channel keeps the outgoing group
            // sealed-in-place until a later swap or the final drain.
            let _ = self
                .tx
                .try_send(FlushUnit::Group(Arc::clone(&self.groups[observed])));
        }
    }
}

impl WritePath for ShardedDouble {
    fn append(&self, record: &[u8]) -> bool {
        let idx = self.active_index();
        match self.groups[idx].append(record) {
            Ok(w) => {
                if w.sealed {
                    // The dispatched shard just filled: rotate the whole set.
                    self.swap_from(idx);
                }
                true
            }
            Err(_) => {
                self.swap_from(idx);
                let now = self.active_index();
                self.groups[now].append(record).is_ok()
            }
        }
    }

    fn tick(&self) {
        let idx = self.active_index();
        if self.groups[idx].has_data() {
            self.swap_from(idx);
        }
    }

    fn drain_units(&self) -> Vec<FlushUnit> {
        let idx = self.active_index();
        vec![
            FlushUnit::Group(Arc::clone(&self.groups[idx])),
            FlushUnit::Group(Arc::clone(&self.groups[1 - idx])),
        ]
    }

    fn name(&self) -> &'static str {
        self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strategy(cas: bool, per_shard: usize) -> (ShardedDouble, mpsc::Receiver<FlushUnit>) {
        let (tx, rx) = mpsc::channel(2);
        let layout = ShardLayout {
            count: 2,
            per_shard,
        };
        let stats = Arc::new(Stats::new());
        let s = if cas {
            ShardedDouble::cas(layout, tx, stats)
        } else {
            ShardedDouble::locked(layout, tx, stats)
        };
        (s, rx)
    }

    #[test]
    fn test_seal_rotates_whole_group() {
        for cas in [false, true] {
            let (s, mut rx) = strategy(cas, 8);

            assert!(s.append(b"1234567")); // fills group 0 / shard 0 exactly
            assert_eq!(s.active_index(), 1);
            assert_eq!(s.stats.snapshot().set_swaps, 1);

            match rx.try_recv().expect("outgoing group enqueued") {
                FlushUnit::Group(group) => {
                    assert!(group.has_data());
                    assert_eq!(group.total_len(), 8);
                    // Every shard of the outgoing set is sealed at handoff.
                    assert!(group.shards().all(shardbuf::Shard::is_sealed));
                }
                _ => panic!("expected a group unit"),
            }
        }
    }

    #[test]
    fn test_losing_swap_retries_on_new_active() {
        let (s, _rx) = strategy(true, 8);

        assert!(s.append(b"1234567")); // rotate to group 1
        // Group 1 takes the next two records on its two shards.
        assert!(s.append(b"abc"));
        assert!(s.append(b"def"));
        assert_eq!(s.active_index(), 1);
    }

    #[test]
    fn test_tick_rotates_partial_group() {
        let (s, mut rx) = strategy(true, 1024);

        s.tick();
        assert!(rx.try_recv().is_err());

        assert!(s.append(b"partial"));
        s.tick();
        assert_eq!(s.active_index(), 1);
        assert!(matches!(rx.try_recv(), Ok(FlushUnit::Group(_))));
    }

    #[test]
    fn test_drain_lists_both_groups() {
        let (s, _rx) = strategy(false, 1024);
        assert!(s.append(b"data"));
        let units = s.drain_units();
        assert_eq!(units.len(), 2);
    }
}
