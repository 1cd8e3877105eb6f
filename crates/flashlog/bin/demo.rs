//! # Flashlog End-to-End Demo
//!
//! Drives the engine with concurrent producers and prints a live statistics
//! dashboard, finishing with a graceful drain.
//!
//! ## Running
//!
//! ```bash
//! # Default: atomic strategy, 8 producers x 5000 records, logs/demo.log
//! cargo run -p flashlog --bin demo --release
//!
//! # Pick a strategy by its identifier
//! cargo run -p flashlog --bin demo --release -- sharded-double-buffer-cas
//!
//! # Quick mode (4 producers x 500 records)
//! cargo run -p flashlog --bin demo --release -- sharded-cas --quick
//!
//! # Load the full configuration from JSON
//! cargo run -p flashlog --bin demo --release -- --config demo.json
//! ```

use flashlog::{Config, Logger, Strategy};
use rand::Rng;
use std::sync::Arc;
use std::time::{Duration, Instant};

const WORDS: &[&str] = &[
    "request", "accepted", "rejected", "retried", "cache", "miss", "hit", "timeout", "session",
    "opened", "closed", "payload", "queued", "flushed",
];

fn synth_record(rng: &mut impl Rng, producer: usize, seq: usize) -> String {
    let mut record = format!("producer={producer:02} seq={seq:05}");
    for _ in 0..rng.gen_range(1..6) {
        record.push(' ');
        record.push_str(WORDS[rng.gen_range(0..WORDS.len())]);
    }
    record
}

fn parse_args() -> (Config, bool) {
    let mut config = Config::default().with_path("logs/demo.log");
    let mut quick = false;

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--quick" => quick = true,
            "--config" => {
                let path = args.next().expect("--config requires a path");
                let text = std::fs::read_to_string(&path)
                    .unwrap_or_else(|e| panic!("cannot read {path}: {e}"));
                config = serde_json::from_str(&text)
                    .unwrap_or_else(|e| panic!("cannot parse {path}: {e}"));
            }
            other => {
                let strategy: Strategy = other
                    .parse()
                    .unwrap_or_else(|e| panic!("{e}; expected one of the six identifiers"));
                config = config.with_strategy(strategy);
            }
        }
    }
    (config, quick)
}

#[tokio::main]
async fn main() {
    let (config, quick) = parse_args();
    let (producers, records_each) = if quick { (4, 500) } else { (8, 5000) };

    println!("=== Flashlog Demo ===");
    println!("strategy:       {}", config.strategy);
    println!("capacity:       {} bytes", config.capacity);
    println!("flush interval: {:?}", config.flush_interval);
    println!("sink:           {}", config.path.display());
    println!("load:           {producers} producers x {records_each} records\n");

    let logger = Arc::new(Logger::open(config).await.expect("engine start"));
    let started = Instant::now();

    let mut tasks = Vec::new();
    for producer in 0..producers {
        let logger = Arc::clone(&logger);
        tasks.push(tokio::spawn(async move {
            for seq in 0..records_each {
                {
                    let mut rng = rand::thread_rng();
                    logger.log(synth_record(&mut rng, producer, seq).as_bytes());
                }
                if seq % 512 == 0 {
                    tokio::task::yield_now().await;
                }
            }
        }));
    }

    // Live dashboard while producers run.
    let watcher = {
        let logger = Arc::clone(&logger);
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(Duration::from_millis(200)).await;
                let s = logger.stats();
                println!(
                    "accepted={} dropped={} flushes={} bytes={} swaps={}",
                    s.total_accepted, s.total_dropped, s.total_flushes, s.bytes_written, s.set_swaps
                );
                if s.total_accepted >= (producers * records_each) as u64 {
                    break;
                }
            }
        })
    };

    for task in tasks {
        task.await.expect("producer task");
    }
    watcher.await.expect("watcher task");

    logger.close().await.expect("graceful close");
    let elapsed = started.elapsed();

    let final_stats = logger.stats();
    println!("\n=== Final Statistics ===");
    println!(
        "{}",
        serde_json::to_string_pretty(&final_stats).expect("stats serialize")
    );
    let total = (producers * records_each) as f64;
    println!(
        "\n{total:.0} records in {elapsed:?} ({:.0} records/sec)",
        total / elapsed.as_secs_f64()
    );
}
