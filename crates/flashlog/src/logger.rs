//! Engine lifecycle: construction, the producer-facing API, the tick task,
//! and idempotent shutdown with a final drain.

use crate::config::{Config, Strategy};
use crate::error::Error;
use crate::pipeline;
use crate::sink::{FileSink, Sink, SinkBoxed};
use crate::stats::{Stats, StatsSnapshot};
use crate::strategy::{self, WritePath};
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

/// Asynchronous append-only log engine.
///
/// Producers call [`log`](Self::log) from any thread with sub-microsecond
/// enqueue latency; a background consumer drains sealed regions to the sink
/// and a periodic tick bounds the staleness of partially filled regions.
///
/// Must be constructed inside a Tokio runtime (the flush consumer and tick
/// tasks are spawned on it). `log` itself is synchronous and runtime-free.
///
/// # Example
///
/// ```no_run
/// use flashlog::{Config, Logger, Strategy};
///
/// # async fn run() -> Result<(), flashlog::Error> {
/// let logger = Logger::open(
///     Config::default().with_strategy(Strategy::ShardedCas),
/// ).await?;
///
/// logger.log(b"payment accepted id=42");
/// logger.logf(format_args!("latency={}us", 17));
///
/// logger.close().await?;
/// # Ok(())
/// # }
/// ```
pub struct Logger {
    strategy: Arc<dyn WritePath>,
    stats: Arc<Stats>,
    variant: Strategy,
    closed: AtomicBool,
    tick_stop: Mutex<Option<oneshot::Sender<()>>>,
    tick_task: Mutex<Option<JoinHandle<()>>>,
    shutdown_tx: Mutex<Option<oneshot::Sender<()>>>,
    consumer_task: Mutex<Option<JoinHandle<()>>>,
}

impl Logger {
    /// Opens the configured sink path for appending (creating parent
    /// directories as needed) and starts the engine.
    pub async fn open(config: Config) -> Result<Self, Error> {
        config.validate()?;
        let sink = FileSink::open(&config.path).await?;
        Self::with_sink(config, sink)
    }

    /// Starts the engine over a caller-supplied sink.
    pub fn with_sink<S: Sink + 'static>(config: Config, sink: S) -> Result<Self, Error> {
        config.validate()?;

        let stats = Arc::new(Stats::new());
        let (tx, rx) = mpsc::channel(strategy::flush_channel_capacity(&config));
        let write_path = strategy::build(&config, tx, Arc::clone(&stats));

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let consumer_task = tokio::spawn(pipeline::run(
            rx,
            Box::new(sink) as Box<dyn SinkBoxed>,
            Arc::clone(&write_path),
            Arc::clone(&stats),
            shutdown_rx,
        ));

        let (tick_stop, tick_rx) = oneshot::channel();
        let tick_task = tokio::spawn(run_tick(
            Arc::clone(&write_path),
            Arc::clone(&stats),
            config.flush_interval,
            tick_rx,
        ));

        Ok(Self {
            strategy: write_path,
            stats,
            variant: config.strategy,
            closed: AtomicBool::new(false),
            tick_stop: Mutex::new(Some(tick_stop)),
            tick_task: Mutex::new(Some(tick_task)),
            shutdown_tx: Mutex::new(Some(shutdown_tx)),
            consumer_task: Mutex::new(Some(consumer_task)),
        })
    }

    /// Best-effort append. The record is newline-terminated in the sink (a
    /// terminator is added unless one is already present).
    ///
    /// Never blocks on I/O and never returns an error; failure modes are
    /// observable only through [`stats`](Self::stats).
    pub fn log(&self, record: &[u8]) {
        self.stats.record_accepted();
        if !self.strategy.append(record) {
            self.stats.record_dropped();
        }
    }

    /// Formats, then [`log`](Self::log)s. Allocates the formatted string;
    /// callers that cannot tolerate allocation should use `log` directly.
    pub fn logf(&self, args: std::fmt::Arguments<'_>) {
        self.log(std::fmt::format(args).as_bytes());
    }

    /// A snapshot of the engine counters.
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// The strategy this engine runs.
    pub fn strategy(&self) -> Strategy {
        self.variant
    }

    /// Idempotent shutdown: stops the tick, signals the consumer, and awaits
    /// the final drain (queued units, then the active structure, then any
    /// peer still holding data) followed by sink sync and close.
    ///
    /// Second and subsequent calls return `Ok` without touching the sink.
    /// Records logged after the shutdown signal are accepted into the active
    /// region but are not guaranteed to be persisted.
    pub async fn close(&self) -> Result<(), Error> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        if let Some(stop) = take(&self.tick_stop) {
            let _ = stop.send(());
        }
        if let Some(task) = take(&self.tick_task) {
            let _ = task.await;
        }

        if let Some(tx) = take(&self.shutdown_tx) {
            let _ = tx.send(());
        }
        if let Some(task) = take(&self.consumer_task) {
            task.await.map_err(|e| Error::Shutdown(e.to_string()))?;
        }
        Ok(())
    }
}

fn take<T>(slot: &Mutex<Option<T>>) -> Option<T> {
    slot.lock().unwrap_or_else(PoisonError::into_inner).take()
}

/// Tick task body: every `period`, prompt the strategy to promote non-empty
/// regions to the flush queue. The tick never blocks writers and never holds
/// the flush permit.
async fn run_tick(
    strategy: Arc<dyn WritePath>,
    stats: Arc<Stats>,
    period: Duration,
    mut stop: oneshot::Receiver<()>,
) {
    let mut interval = tokio::time::interval(period);
    // The first interval tick completes immediately; swallow it so the task
    // fires on the configured period.
    interval.tick().await;

    loop {
        tokio::select! {
            _ = interval.tick() => {
                if std::panic::catch_unwind(AssertUnwindSafe(|| strategy.tick())).is_err() {
                    stats.record_flush_error();
                    eprintln!("flashlog: tick panicked; task continues");
                }
            }
            _ = &mut stop => break,
        }
    }
}
