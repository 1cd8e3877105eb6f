use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use shardbuf::{LogBuffer, ShardGroup, WriteMode};
use std::sync::Arc;
use std::thread;

const RECORD: &[u8] = b"benchmark payload, sixty-four bytes of plausible log record....";
const RECORDS: u64 = 200_000;

fn bench_single_region(c: &mut Criterion) {
    let mut group = c.benchmark_group("single_region");
    group.throughput(Throughput::Elements(RECORDS));

    for mode in [WriteMode::Cas, WriteMode::Locked] {
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{mode:?}")),
            &mode,
            |b, &mode| {
                b.iter(|| {
                    let buf = LogBuffer::new(32 * 1024 * 1024);
                    for _ in 0..RECORDS {
                        black_box(buf.push_with(mode, RECORD)).unwrap();
                    }
                });
            },
        );
    }

    group.finish();
}

fn bench_contended_group(c: &mut Criterion) {
    let mut group = c.benchmark_group("contended_group");

    for num_writers in [2usize, 4, 8] {
        let total = RECORDS * num_writers as u64 / 8;
        group.throughput(Throughput::Elements(total));

        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{num_writers}W_16S")),
            &num_writers,
            |b, &n| {
                b.iter(|| {
                    let shards = ShardGroup::new(16, 4 * 1024 * 1024, WriteMode::Cas);
                    let shards = Arc::new(shards);
                    let per_writer = total / n as u64;

                    let handles: Vec<_> = (0..n)
                        .map(|_| {
                            let shards = Arc::clone(&shards);
                            thread::spawn(move || {
                                for _ in 0..per_writer {
                                    black_box(shards.append(RECORD)).ok();
                                }
                            })
                        })
                        .collect();

                    for h in handles {
                        h.join().unwrap();
                    }
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_single_region, bench_contended_group);
criterion_main!(benches);
