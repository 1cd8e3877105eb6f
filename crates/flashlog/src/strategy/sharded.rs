//! Sharded-single strategies: one shard group, per-shard flush handoff.
//!
//! No double-buffering. A sealed shard is enqueued by index and stays out of
//! service until the consumer recycles it; its round-robin peers keep
//! accepting writes in the meantime.

use crate::config::ShardLayout;
use crate::strategy::{FlushUnit, WritePath};
use shardbuf::{GroupError, ShardGroup, WriteMode};
use std::sync::Arc;
use tokio::sync::mpsc;

pub(crate) struct ShardedSingle {
    group: Arc<ShardGroup>,
    tx: mpsc::Sender<FlushUnit>,
    name: &'static str,
}

impl ShardedSingle {
    pub(crate) fn new(
        layout: ShardLayout,
        mode: WriteMode,
        name: &'static str,
        tx: mpsc::Sender<FlushUnit>,
    ) -> Self {
        Self {
            group: Arc::new(ShardGroup::new(layout.count, layout.per_shard, mode)),
            tx,
            name,
        }
    }

    fn enqueue_shard(&self, shard: usize) -> bool {
        self.tx
            .try_send(FlushUnit::Shard(Arc::clone(&self.group), shard))
            .is_ok()
    }
}

impl WritePath for ShardedSingle {
    fn append(&self, record: &[u8]) -> bool {
        match self.group.append(record) {
            Ok(w) => {
                if w.sealed {
                    // Exact fill: hand the shard to the pipeline. A full
                    // channel loses only the flush request; the tick will
                    // resubmit the sealed shard.
                    let _ = self.enqueue_shard(w.shard);
                }
                true
            }
            Err(GroupError::ShardSealed { shard }) => {
                if !self.enqueue_shard(shard) {
                    // Handoff channel full: the record drops.
                    return false;
                }
                // Retry against the same shard. This succeeds only if the
                // consumer already recycled it, so bursts that outrun the
                // pipeline show up as drops here.
                self.group.shard(shard).push(record).is_ok()
            }
        }
    }

    fn tick(&self) {
        for (i, shard) in self.group.shards().enumerate() {
            if shard.has_data() {
                // Seal before enqueueing so the consumer never drains a
                // shard that is still taking reservations.
                shard.seal();
                let _ = self.enqueue_shard(i);
            }
        }
    }

    fn drain_units(&self) -> Vec<FlushUnit> {
        vec![FlushUnit::Group(Arc::clone(&self.group))]
    }

    fn name(&self) -> &'static str {
        self.name
    }
}
