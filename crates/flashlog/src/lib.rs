//! Flashlog - Asynchronous High-Throughput Append-Only Log Engine
//!
//! Many concurrent producers append short text records; one background
//! consumer drains filled buffers to an append-only sink with bounded memory
//! and bounded per-record latency. Producers never hold a lock across I/O
//! and never observe errors: the engine degrades to counted drops rather
//! than aborting.
//!
//! # Strategies
//!
//! Six interchangeable strategies materialize the same external contract on
//! top of progressively richer concurrency structures:
//!
//! | Identifier | Structure |
//! |---|---|
//! | `mutex` | two leaf buffers, RwLock-guarded active slot, locked appends |
//! | `atomic` | two leaf buffers, CAS-swapped active slot, CAS appends |
//! | `sharded` | one shard group, per-shard mutex appends |
//! | `sharded-cas` | one shard group, CAS appends |
//! | `sharded-double-buffer` | two shard groups, locked wholesale swap |
//! | `sharded-double-buffer-cas` | two shard groups, CAS wholesale swap |
//!
//! Record ordering across producers is explicitly not a goal: bytes appear
//! in reservation order within a region, and regions reach the sink in the
//! order the consumer processes them.
//!
//! # Example
//!
//! ```no_run
//! use flashlog::{Config, Logger, Strategy};
//! use std::time::Duration;
//!
//! # async fn run() -> Result<(), flashlog::Error> {
//! let logger = Logger::open(
//!     Config::default()
//!         .with_capacity(4 * 1024 * 1024)
//!         .with_flush_interval(Duration::from_millis(250))
//!         .with_strategy(Strategy::ShardedDoubleBufferCas)
//!         .with_path("logs/app.log"),
//! )
//! .await?;
//!
//! logger.log(b"request handled");
//! let snapshot = logger.stats();
//! assert_eq!(snapshot.total_accepted, 1);
//!
//! logger.close().await?;
//! # Ok(())
//! # }
//! ```

mod config;
mod error;
mod logger;
mod pipeline;
mod sink;
mod stats;
mod strategy;

pub use config::{Config, ShardLayout, Strategy, DEFAULT_CAPACITY, DEFAULT_SHARDS, MIN_SHARD_CAPACITY};
pub use error::{ConfigError, Error};
pub use logger::Logger;
pub use sink::{FileSink, MemorySink, MemorySinkHandle, NullSink, Sink, SinkBoxed};
pub use stats::{Stats, StatsSnapshot};
