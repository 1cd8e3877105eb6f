//! Shardbuf - Sealable Byte Regions for Concurrent Log Ingestion
//!
//! The building blocks of a high-throughput append-only log engine: fixed-size
//! byte regions that many producers fill concurrently and a single consumer
//! drains, one region at a time.
//!
//! # Key Features
//!
//! - Reserve-then-copy append: a CAS on the write cursor claims a disjoint
//!   range, the record is copied in without holding any lock
//! - A lock-based append path with the identical observable contract, for
//!   comparing mutex and lock-free deployments of the same engine
//! - Seal/settle/reset lifecycle: a sealed region accepts no further writes,
//!   a settled region is safe to drain, a reset region is writable again
//! - Round-robin shard groups that spread producer contention over N
//!   independent regions
//!
//! # Example
//!
//! ```
//! use shardbuf::LogBuffer;
//!
//! let buf = LogBuffer::new(4096);
//! buf.push(b"hello").unwrap();
//! buf.push(b"world\n").unwrap();
//!
//! // Drain side: stop writers, wait for in-flight copies, read, recycle.
//! buf.seal();
//! let len = buf.settle();
//! assert_eq!(buf.filled(len), b"hello\nworld\n");
//! buf.reset();
//! ```

mod buffer;
mod group;
mod shard;

pub use buffer::{LogBuffer, PushError, Written, WriteMode};
pub use group::{GroupError, GroupWrite, ShardGroup};
pub use shard::Shard;
