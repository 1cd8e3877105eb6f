//! Engine configuration, strategy selection, and shard layout.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Floor for the capacity of a single shard.
pub const MIN_SHARD_CAPACITY: usize = 64 * 1024;

/// Default total nominal buffer capacity (1 MiB).
pub const DEFAULT_CAPACITY: usize = 1024 * 1024;

/// Default shard count for sharded strategies.
pub const DEFAULT_SHARDS: usize = 16;

/// The six interchangeable buffering strategies.
///
/// All variants materialize the same external contract; they differ in the
/// concurrency structure underneath the write path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    /// Two leaf buffers, lock-free active-slot swap, CAS appends.
    Atomic,
    /// Two leaf buffers, reader-writer lock around the active slot, locked
    /// appends.
    Mutex,
    /// One shard group, per-shard mutex appends, per-shard flush handoff.
    Sharded,
    /// One shard group, CAS appends, per-shard flush handoff.
    ShardedCas,
    /// Two shard groups swapped wholesale under a lock.
    ShardedDoubleBuffer,
    /// Two shard groups swapped wholesale by CAS.
    ShardedDoubleBufferCas,
}

impl Strategy {
    /// The stable identifier used in diagnostics and configuration.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Atomic => "atomic",
            Self::Mutex => "mutex",
            Self::Sharded => "sharded",
            Self::ShardedCas => "sharded-cas",
            Self::ShardedDoubleBuffer => "sharded-double-buffer",
            Self::ShardedDoubleBufferCas => "sharded-double-buffer-cas",
        }
    }

    /// All variants, in declaration order. Useful for sweeps in tests and
    /// benchmarks.
    pub fn all() -> [Strategy; 6] {
        [
            Self::Atomic,
            Self::Mutex,
            Self::Sharded,
            Self::ShardedCas,
            Self::ShardedDoubleBuffer,
            Self::ShardedDoubleBufferCas,
        ]
    }
}

impl FromStr for Strategy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "atomic" => Ok(Self::Atomic),
            "mutex" => Ok(Self::Mutex),
            "sharded" => Ok(Self::Sharded),
            "sharded-cas" => Ok(Self::ShardedCas),
            "sharded-double-buffer" => Ok(Self::ShardedDoubleBuffer),
            "sharded-double-buffer-cas" => Ok(Self::ShardedDoubleBufferCas),
            other => Err(ConfigError::UnknownStrategy(other.to_string())),
        }
    }
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shard count and per-shard capacity derived from a validated config.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShardLayout {
    /// Number of shards per group.
    pub count: usize,
    /// Capacity of each shard in bytes; never below [`MIN_SHARD_CAPACITY`].
    pub per_shard: usize,
}

/// Engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Total nominal buffer capacity in bytes, divided across shards in
    /// sharded strategies.
    pub capacity: usize,

    /// Period of the tick task that promotes partially filled regions to the
    /// flush queue.
    pub flush_interval: Duration,

    /// Sink path, passed verbatim to sink construction.
    pub path: PathBuf,

    /// Which of the six variants to run.
    pub strategy: Strategy,

    /// Shard count for sharded strategies. Zero selects the default.
    pub shards: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            flush_interval: Duration::from_secs(1),
            path: PathBuf::from("logs/server.log"),
            strategy: Strategy::Atomic,
            shards: DEFAULT_SHARDS,
        }
    }
}

impl Config {
    /// Sets the total buffer capacity.
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Sets the flush interval.
    pub fn with_flush_interval(mut self, interval: Duration) -> Self {
        self.flush_interval = interval;
        self
    }

    /// Sets the sink path.
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = path.into();
        self
    }

    /// Sets the strategy.
    pub fn with_strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Sets the shard count.
    pub fn with_shards(mut self, shards: usize) -> Self {
        self.shards = shards;
        self
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.capacity == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        if self.flush_interval.is_zero() {
            return Err(ConfigError::ZeroInterval);
        }
        if self.path.as_os_str().is_empty() {
            return Err(ConfigError::EmptyPath);
        }
        Ok(())
    }

    /// Derives the shard layout: per-shard capacity is
    /// `max(capacity / N, 64 KiB)`, and N is reduced when that floor would
    /// exceed the total. Every shard ends up with at least 64 KiB.
    pub fn shard_layout(&self) -> ShardLayout {
        let requested = if self.shards == 0 { DEFAULT_SHARDS } else { self.shards };
        let count = if requested * MIN_SHARD_CAPACITY > self.capacity {
            (self.capacity / MIN_SHARD_CAPACITY).max(1)
        } else {
            requested
        };
        let per_shard = (self.capacity / count).max(MIN_SHARD_CAPACITY);
        ShardLayout { count, per_shard }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.capacity, 1024 * 1024);
        assert_eq!(config.flush_interval, Duration::from_secs(1));
        assert_eq!(config.path, PathBuf::from("logs/server.log"));
        assert_eq!(config.strategy, Strategy::Atomic);
        assert_eq!(config.shards, 16);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_errors() {
        assert_eq!(
            Config::default().with_capacity(0).validate(),
            Err(ConfigError::ZeroCapacity)
        );
        assert_eq!(
            Config::default()
                .with_flush_interval(Duration::ZERO)
                .validate(),
            Err(ConfigError::ZeroInterval)
        );
        assert_eq!(
            Config::default().with_path("").validate(),
            Err(ConfigError::EmptyPath)
        );
    }

    #[test]
    fn test_layout_applies_floor() {
        // Default 1 MiB over 16 shards sits exactly on the floor.
        let layout = Config::default().shard_layout();
        assert_eq!(layout.count, 16);
        assert_eq!(layout.per_shard, MIN_SHARD_CAPACITY);

        // Tiny totals collapse to one floor-sized shard.
        let layout = Config::default()
            .with_capacity(10 * 1024)
            .with_shards(8)
            .shard_layout();
        assert_eq!(layout.count, 1);
        assert_eq!(layout.per_shard, MIN_SHARD_CAPACITY);

        // 128 KiB over 8 requested shards reduces to 2 floor-sized shards.
        let layout = Config::default()
            .with_capacity(128 * 1024)
            .with_shards(8)
            .shard_layout();
        assert_eq!(layout.count, 2);
        assert_eq!(layout.per_shard, MIN_SHARD_CAPACITY);
    }

    #[test]
    fn test_zero_shards_selects_default() {
        let layout = Config::default()
            .with_capacity(16 * 1024 * 1024)
            .with_shards(0)
            .shard_layout();
        assert_eq!(layout.count, DEFAULT_SHARDS);
        assert_eq!(layout.per_shard, 1024 * 1024);
    }

    #[test]
    fn test_strategy_identifiers_round_trip() {
        for strategy in Strategy::all() {
            assert_eq!(strategy.as_str().parse::<Strategy>().unwrap(), strategy);
        }
        assert!(matches!(
            "double-buffer".parse::<Strategy>(),
            Err(ConfigError::UnknownStrategy(_))
        ));
    }

    #[test]
    fn test_strategy_serde_uses_kebab_case() {
        let json = serde_json::to_string(&Strategy::ShardedDoubleBufferCas).unwrap();
        assert_eq!(json, "\"sharded-double-buffer-cas\"");
        let parsed: Strategy = serde_json::from_str("\"sharded-cas\"").unwrap();
        assert_eq!(parsed, Strategy::ShardedCas);
    }
}
