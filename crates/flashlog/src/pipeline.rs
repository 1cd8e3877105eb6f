//! The flush pipeline: a single background consumer that drains flush units
//! to the sink.
//!
//! The consumer owns the sink exclusively. Producers only ever touch the
//! bounded handoff channel, so no write path is ever blocked on I/O.

use crate::sink::SinkBoxed;
use crate::stats::Stats;
use crate::strategy::{FlushUnit, WritePath};
use futures_util::FutureExt;
use shardbuf::LogBuffer;
use std::io;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, Semaphore};

/// Consumer task body. Runs until the shutdown signal arrives, then drains
/// the queue, flushes every region the strategy still holds, and releases
/// the sink.
pub(crate) async fn run(
    mut rx: mpsc::Receiver<FlushUnit>,
    mut sink: Box<dyn SinkBoxed>,
    strategy: Arc<dyn WritePath>,
    stats: Arc<Stats>,
    mut shutdown_rx: oneshot::Receiver<()>,
) {
    // Capacity-1 gate serializing sink writes. Held for the duration of one
    // unit's write, never across iterations.
    let gate = Semaphore::new(1);

    loop {
        tokio::select! {
            unit = rx.recv() => {
                match unit {
                    Some(unit) => process_unit(&gate, &mut sink, &unit, &stats).await,
                    None => break,
                }
            }
            _ = &mut shutdown_rx => {
                // Final drain: first whatever is already queued...
                while let Ok(unit) = rx.try_recv() {
                    process_unit(&gate, &mut sink, &unit, &stats).await;
                }
                // ...then the active structure and any peer still holding
                // data.
                for unit in strategy.drain_units() {
                    process_unit(&gate, &mut sink, &unit, &stats).await;
                }
                break;
            }
        }
    }

    if let Err(e) = sink.sync_boxed().await {
        stats.record_flush_error();
        eprintln!("flashlog: final sync failed: {e}");
    }
    if let Err(e) = sink.close_boxed().await {
        stats.record_flush_error();
        eprintln!("flashlog: sink close failed: {e}");
    }
}

/// Processes one unit under the flush permit, recovering from panics so the
/// consumer keeps running.
async fn process_unit(
    gate: &Semaphore,
    sink: &mut Box<dyn SinkBoxed>,
    unit: &FlushUnit,
    stats: &Stats,
) {
    // Non-blocking acquire: if another flush holds the gate, skip this unit.
    // Skipped units are not re-enqueued - the sink is append-only and sealed
    // regions keep their data, so the tick or a later swap resubmits them
    // without any risk of a double write.
    let Ok(_permit) = gate.try_acquire() else {
        return;
    };

    if AssertUnwindSafe(flush_unit(sink, unit, stats))
        .catch_unwind()
        .await
        .is_err()
    {
        stats.record_flush_error();
        eprintln!("flashlog: flush panicked; consumer continues");
    }
}

async fn flush_unit(sink: &mut Box<dyn SinkBoxed>, unit: &FlushUnit, stats: &Stats) {
    match unit {
        FlushUnit::Leaf(leaf) => {
            drain_region(sink, leaf, stats).await;
        }
        FlushUnit::Shard(group, idx) => {
            drain_region(sink, group.shard(*idx).buffer(), stats).await;
        }
        FlushUnit::Group(group) => {
            // Shards are drained in index order. A shard-level error is
            // counted but does not abort its peers.
            let mut bytes = 0u64;
            let mut failed = false;
            for shard in group.shards() {
                match write_region(sink, shard.buffer()).await {
                    Ok(n) => bytes += n,
                    Err(e) => {
                        failed = true;
                        stats.record_flush_error();
                        eprintln!("flashlog: shard flush failed on {}: {e}", sink.name());
                    }
                }
            }
            stats.add_bytes_written(bytes);
            if !failed && bytes > 0 {
                stats.record_flush();
            }
        }
    }
}

async fn drain_region(sink: &mut Box<dyn SinkBoxed>, region: &LogBuffer, stats: &Stats) {
    match write_region(sink, region).await {
        Ok(0) => {}
        Ok(n) => {
            stats.add_bytes_written(n);
            stats.record_flush();
        }
        Err(e) => {
            stats.record_flush_error();
            eprintln!("flashlog: flush failed on {}: {e}", sink.name());
        }
    }
}

/// Seals, settles and writes one region. On success (or an empty region) the
/// region is recycled; on error it keeps its data for the final drain.
async fn write_region(sink: &mut Box<dyn SinkBoxed>, region: &LogBuffer) -> io::Result<u64> {
    region.seal();
    let len = region.settle();
    if len == 0 {
        region.reset();
        return Ok(0);
    }

    sink.write_boxed(region.filled(len)).await?;
    region.reset();
    Ok(len as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::{MemorySink, Sink};

    fn boxed(sink: impl Sink + 'static) -> Box<dyn SinkBoxed> {
        Box::new(sink)
    }

    #[tokio::test]
    async fn test_leaf_unit_writes_and_recycles() {
        let (sink, handle) = MemorySink::new();
        let mut sink = boxed(sink);
        let stats = Stats::new();

        let leaf = Arc::new(LogBuffer::new(64));
        leaf.push(b"record").unwrap();

        flush_unit(&mut sink, &FlushUnit::Leaf(Arc::clone(&leaf)), &stats).await;

        assert_eq!(handle.contents(), b"record\n");
        assert!(!leaf.is_sealed());
        assert!(leaf.is_empty());
        let snap = stats.snapshot();
        assert_eq!(snap.total_flushes, 1);
        assert_eq!(snap.bytes_written, 7);
    }

    #[tokio::test]
    async fn test_empty_leaf_is_recycled_silently() {
        let (sink, handle) = MemorySink::new();
        let mut sink = boxed(sink);
        let stats = Stats::new();

        let leaf = Arc::new(LogBuffer::new(64));
        leaf.seal();
        flush_unit(&mut sink, &FlushUnit::Leaf(Arc::clone(&leaf)), &stats).await;

        assert_eq!(handle.byte_len(), 0);
        assert!(!leaf.is_sealed());
        assert_eq!(stats.snapshot().total_flushes, 0);
    }

    #[tokio::test]
    async fn test_group_unit_drains_in_index_order() {
        use shardbuf::{ShardGroup, WriteMode};

        let (sink, handle) = MemorySink::new();
        let mut sink = boxed(sink);
        let stats = Stats::new();

        let group = Arc::new(ShardGroup::new(3, 64, WriteMode::Cas));
        group.shard(0).push(b"zero").unwrap();
        group.shard(2).push(b"two").unwrap();

        flush_unit(&mut sink, &FlushUnit::Group(Arc::clone(&group)), &stats).await;

        assert_eq!(handle.lines(), vec!["zero", "two"]);
        assert!(!group.has_data());
        let snap = stats.snapshot();
        assert_eq!(snap.total_flushes, 1); // once per unit, not per shard
        assert_eq!(snap.bytes_written, 9);
    }

    #[tokio::test]
    async fn test_write_error_preserves_region() {
        struct FailingSink;
        impl Sink for FailingSink {
            async fn write(&mut self, _buf: &[u8]) -> io::Result<()> {
                Err(io::Error::new(io::ErrorKind::Other, "injected"))
            }
            async fn sync(&mut self) -> io::Result<()> {
                Ok(())
            }
            async fn close(&mut self) -> io::Result<()> {
                Ok(())
            }
            fn name(&self) -> &str {
                "failing"
            }
        }

        let mut sink = boxed(FailingSink);
        let stats = Stats::new();

        let leaf = Arc::new(LogBuffer::new(64));
        leaf.push(b"keep me").unwrap();
        flush_unit(&mut sink, &FlushUnit::Leaf(Arc::clone(&leaf)), &stats).await;

        // The region was not reset: the data survives for the final drain.
        assert!(leaf.is_sealed());
        assert_eq!(leaf.len(), 8);
        let snap = stats.snapshot();
        assert_eq!(snap.flush_errors, 1);
        assert_eq!(snap.total_flushes, 0);
        assert_eq!(snap.bytes_written, 0);
    }
}
