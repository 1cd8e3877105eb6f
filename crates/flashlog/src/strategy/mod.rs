//! The six buffering strategies behind the engine's write path.
//!
//! Every variant materializes the same external contract: records are
//! accepted or dropped synchronously, sealed regions are handed to the flush
//! pipeline as [`FlushUnit`]s, and the periodic tick promotes partially
//! filled regions so data never goes stale.

mod double;
mod sharded;
mod single;

use crate::config::{Config, Strategy};
use crate::stats::Stats;
use shardbuf::{LogBuffer, ShardGroup, WriteMode};
use std::sync::Arc;
use tokio::sync::mpsc;

pub(crate) use double::ShardedDouble;
pub(crate) use sharded::ShardedSingle;
pub(crate) use single::SingleBuffer;

/// The handoff token placed on the flush channel.
///
/// The swap winner transfers the unit to the flush consumer, which has
/// exclusive drain access until it completes the sink write and reset.
pub(crate) enum FlushUnit {
    /// One leaf of a double-buffered pair.
    Leaf(Arc<LogBuffer>),
    /// A single shard of a group (sharded-single strategies).
    Shard(Arc<ShardGroup>, usize),
    /// A whole outgoing shard group (sharded double-buffer strategies).
    Group(Arc<ShardGroup>),
}

/// Strategy-side write path: producers call `append`, the tick task calls
/// `tick`, the consumer calls `drain_units` once at shutdown.
pub(crate) trait WritePath: Send + Sync {
    /// Best-effort append. Returns false when the record was dropped.
    fn append(&self, record: &[u8]) -> bool;

    /// Promotes non-empty regions to the flush queue. Never blocks writers.
    fn tick(&self);

    /// Every region that may still hold data, active first.
    fn drain_units(&self) -> Vec<FlushUnit>;

    /// Stable strategy identifier for diagnostics.
    fn name(&self) -> &'static str;
}

/// Flush channel capacity: one pending handoff per shard, doubled, for the
/// sharded-single variants; two generations for everything else.
pub(crate) fn flush_channel_capacity(config: &Config) -> usize {
    match config.strategy {
        Strategy::Sharded | Strategy::ShardedCas => 2 * config.shard_layout().count,
        _ => 2,
    }
}

/// Builds the configured strategy over engine-owned regions.
pub(crate) fn build(
    config: &Config,
    tx: mpsc::Sender<FlushUnit>,
    stats: Arc<Stats>,
) -> Arc<dyn WritePath> {
    let layout = config.shard_layout();
    match config.strategy {
        Strategy::Mutex => Arc::new(SingleBuffer::locked(config.capacity, tx, stats)),
        Strategy::Atomic => Arc::new(SingleBuffer::atomic(config.capacity, tx, stats)),
        Strategy::Sharded => Arc::new(ShardedSingle::new(
            layout,
            WriteMode::Locked,
            "sharded",
            tx,
        )),
        Strategy::ShardedCas => Arc::new(ShardedSingle::new(
            layout,
            WriteMode::Cas,
            "sharded-cas",
            tx,
        )),
        Strategy::ShardedDoubleBuffer => Arc::new(ShardedDouble::locked(layout, tx, stats)),
        Strategy::ShardedDoubleBufferCas => Arc::new(ShardedDouble::cas(layout, tx, stats)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Strategy;

    #[test]
    fn test_channel_capacity_per_strategy() {
        let base = Config::default().with_capacity(16 * 1024 * 1024);
        assert_eq!(
            flush_channel_capacity(&base.clone().with_strategy(Strategy::Atomic)),
            2
        );
        assert_eq!(
            flush_channel_capacity(&base.clone().with_strategy(Strategy::ShardedCas)),
            32
        );
        assert_eq!(
            flush_channel_capacity(&base.with_strategy(Strategy::ShardedDoubleBufferCas)),
            2
        );
    }

    #[test]
    fn test_build_reports_stable_names() {
        let config = Config::default();
        for strategy in Strategy::all() {
            let (tx, _rx) = mpsc::channel(4);
            let path = build(
                &config.clone().with_strategy(strategy),
                tx,
                Arc::new(Stats::new()),
            );
            assert_eq!(path.name(), strategy.as_str());
        }
    }
}
