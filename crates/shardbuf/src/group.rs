use crate::{PushError, Shard, WriteMode};
use crossbeam_utils::CachePadded;
use std::sync::atomic::{AtomicUsize, Ordering};
use thiserror::Error;

/// A successful group append.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupWrite {
    /// Framed bytes placed in the shard.
    pub len: usize,
    /// The append sealed its shard; the shard needs a flush.
    pub sealed: bool,
    /// Index of the shard that took the record.
    pub shard: usize,
}

/// Error types for group appends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum GroupError {
    /// The dispatched shard is sealed and awaiting flush. The group does not
    /// fall through to a neighbor; reacting is the caller's responsibility.
    #[error("shard {shard} is sealed and awaiting flush")]
    ShardSealed {
        /// Index of the sealed shard.
        shard: usize,
    },
}

/// An ordered set of N shards with round-robin dispatch.
///
/// Dispatch selects `counter.fetch_add(1) % N`, which gives uniform expected
/// distribution without any per-thread state. An append attempts exactly one
/// shard: spreading a rejected record to neighbors would equalize contention
/// slightly but muddy the accounting of which unit needs flushing.
#[derive(Debug)]
pub struct ShardGroup {
    shards: Box<[Shard]>,
    dispatch: CachePadded<AtomicUsize>,
}

impl ShardGroup {
    /// Creates a group of `count` shards, each of `shard_capacity` bytes.
    ///
    /// # Panics
    ///
    /// Panics if `count` is zero.
    pub fn new(count: usize, shard_capacity: usize, mode: WriteMode) -> Self {
        assert!(count > 0, "shard count must be greater than zero");
        let shards = (0..count)
            .map(|_| Shard::new(shard_capacity, mode))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        Self {
            shards,
            dispatch: CachePadded::new(AtomicUsize::new(0)),
        }
    }

    /// Number of shards in the group.
    #[inline]
    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    /// The shard at index `i`.
    #[inline]
    pub fn shard(&self, i: usize) -> &Shard {
        &self.shards[i]
    }

    /// Iterates the shards in index order.
    pub fn shards(&self) -> impl Iterator<Item = &Shard> {
        self.shards.iter()
    }

    /// Appends a record to the round-robin-dispatched shard.
    pub fn append(&self, record: &[u8]) -> Result<GroupWrite, GroupError> {
        let idx = self.dispatch.fetch_add(1, Ordering::Relaxed) % self.shards.len();
        match self.shards[idx].push(record) {
            Ok(w) => Ok(GroupWrite {
                len: w.len,
                sealed: w.sealed,
                shard: idx,
            }),
            Err(PushError::Sealed) => Err(GroupError::ShardSealed { shard: idx }),
        }
    }

    /// Returns true if any shard holds data.
    pub fn has_data(&self) -> bool {
        self.shards.iter().any(Shard::has_data)
    }

    /// Returns true if any shard is sealed.
    pub fn any_sealed(&self) -> bool {
        self.shards.iter().any(Shard::is_sealed)
    }

    /// Total bytes currently reserved across the group.
    pub fn total_len(&self) -> usize {
        self.shards.iter().map(Shard::len).sum()
    }

    /// Seals every shard. Drain-side preparation for a whole-group flush.
    pub fn seal_all(&self) {
        for shard in self.shards.iter() {
            shard.seal();
        }
    }

    /// Resets every shard. Drain side only.
    pub fn reset_all(&self) {
        for shard in self.shards.iter() {
            shard.buffer().reset();
        }
    }
}
