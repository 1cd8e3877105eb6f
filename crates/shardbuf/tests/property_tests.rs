//! Property-based tests over the region invariants.
//!
//! Coverage:
//! - LogBuffer (both write modes)
//! - ShardGroup round-robin dispatch
//!
//! The invariants mirror the engine's universal contract: bounded cursor,
//! exact byte accounting, seal monotonicity, reset recycling.

use proptest::prelude::*;
use shardbuf::{LogBuffer, ShardGroup, WriteMode};

fn mode_strategy() -> impl Strategy<Value = WriteMode> {
    prop_oneof![Just(WriteMode::Cas), Just(WriteMode::Locked)]
}

proptest! {
    /// The cursor never exceeds capacity, and equals the sum of accepted
    /// framed lengths, regardless of the record mix.
    #[test]
    fn prop_byte_accounting(
        capacity in 128usize..4096,
        records in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..200), 1..100),
        mode in mode_strategy(),
    ) {
        let buf = LogBuffer::new(capacity);
        let mut accepted = 0usize;

        for rec in &records {
            if let Ok(w) = buf.push_with(mode, rec) {
                prop_assert_eq!(w.len, LogBuffer::framed_len(rec));
                accepted += w.len;
            }
        }

        prop_assert!(buf.len() <= capacity,
            "cursor {} exceeds capacity {}", buf.len(), capacity);

        buf.seal();
        let len = buf.settle();
        prop_assert_eq!(len, accepted, "settled length disagrees with accepted bytes");
        prop_assert_eq!(buf.filled(len).len(), accepted);
    }

    /// Once sealed, every append fails and the cursor is frozen until reset.
    #[test]
    fn prop_seal_is_terminal(
        capacity in 64usize..512,
        records in prop::collection::vec(prop::collection::vec(any::<u8>(), 1..64), 1..200),
        mode in mode_strategy(),
    ) {
        let buf = LogBuffer::new(capacity);
        let mut sealed_at = None;

        for rec in &records {
            match buf.push_with(mode, rec) {
                Ok(w) if w.sealed => {
                    sealed_at = Some(buf.len());
                }
                Ok(_) => {
                    prop_assert!(sealed_at.is_none(), "append accepted after seal");
                }
                Err(_) => {
                    if sealed_at.is_none() {
                        sealed_at = Some(buf.len());
                    }
                    prop_assert_eq!(Some(buf.len()), sealed_at, "cursor moved while sealed");
                }
            }
        }
    }

    /// Reset recycles the region: generation bumps, cursor zeroes, appends
    /// succeed again.
    #[test]
    fn prop_reset_recycles(
        capacity in 64usize..512,
        fill in prop::collection::vec(any::<u8>(), 1..32),
        mode in mode_strategy(),
    ) {
        let buf = LogBuffer::new(capacity);
        while buf.push_with(mode, &fill).is_ok() {}
        prop_assert!(buf.is_sealed());

        let gen = buf.generation();
        buf.reset();
        prop_assert_eq!(buf.generation(), gen + 1);
        prop_assert!(buf.is_empty());
        prop_assert!(buf.push_with(mode, &fill).is_ok());
    }

    /// Round-robin dispatch touches every shard uniformly for a uniform load.
    #[test]
    fn prop_round_robin_uniform(
        shards in 1usize..9,
        writes_per_shard in 1usize..50,
        mode in mode_strategy(),
    ) {
        let group = ShardGroup::new(shards, 64 * 1024, mode);
        for _ in 0..(shards * writes_per_shard) {
            group.append(b"x").unwrap();
        }
        for i in 0..shards {
            prop_assert_eq!(group.shard(i).len(), writes_per_shard * 2,
                "shard {} load is uneven", i);
        }
    }
}
