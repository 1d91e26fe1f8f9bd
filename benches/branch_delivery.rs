//! Performance benchmarks for branch request handling.
//!
//! This module benchmarks:
//! - Sequential accepted writes on a single branch
//! - Rejected requests carrying a stale token
//! - Contended delivery from several threads
//!
//! Run with: cargo bench

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use bank_replica::{Branch, InProcessTransport, Operation, Propagator, Request, WriteSet};
use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};

/// A branch without peers, so accepted writes schedule nothing.
fn lone_branch() -> Branch {
    let propagator = Arc::new(Propagator::new(
        InProcessTransport::default(),
        Duration::from_secs(1),
    ));
    Branch::new(1, 0, Vec::new(), propagator)
}

/// Benchmark a chain of accepted deposits
fn bench_sequential_writes(c: &mut Criterion) {
    let mut group = c.benchmark_group("sequential_writes");

    for size in [100, 500, 1000].iter() {
        group.throughput(Throughput::Elements(*size as u64));
        group.bench_with_input(BenchmarkId::new("deposit", size), size, |b, &size| {
            b.iter(|| {
                let branch = lone_branch();
                let mut write_set = WriteSet::genesis();

                for _ in 0..size {
                    let reply =
                        branch.deliver(Request::new(Operation::Deposit, 1, write_set.clone()));
                    black_box(reply);
                    write_set = write_set.next();
                }

                black_box(branch.balance())
            });
        });
    }
    group.finish();
}

/// Benchmark rejections against a branch that has moved on
fn bench_stale_rejections(c: &mut Criterion) {
    let mut group = c.benchmark_group("stale_rejections");

    for writes in [10u64, 100, 1000].iter() {
        group.bench_with_input(
            BenchmarkId::new("query", writes),
            writes,
            |b, &writes| {
                let branch = lone_branch();
                let mut write_set = WriteSet::genesis();
                for _ in 0..writes {
                    branch.deliver(Request::new(Operation::Deposit, 1, write_set.clone()));
                    write_set = write_set.next();
                }
                let stale = WriteSet::with_writes(writes - 1);

                b.iter(|| black_box(branch.deliver(Request::query(stale.clone()))));
            },
        );
    }
    group.finish();
}

/// Benchmark several threads racing for the same token
fn bench_contended_delivery(c: &mut Criterion) {
    let mut group = c.benchmark_group("contended_delivery");

    for num_threads in [2, 4, 8].iter() {
        group.bench_with_input(
            BenchmarkId::new("threads", num_threads),
            num_threads,
            |b, &num_threads| {
                b.iter(|| {
                    let branch = Arc::new(lone_branch());
                    let handles: Vec<_> = (0..num_threads)
                        .map(|_| {
                            let branch = Arc::clone(&branch);
                            thread::spawn(move || {
                                let mut write_set = WriteSet::genesis();
                                for _ in 0..100 {
                                    // Re-read the token whenever a rival got there first
                                    let reply = branch.deliver(Request::new(
                                        Operation::Deposit,
                                        1,
                                        write_set.clone(),
                                    ));
                                    write_set = if reply.is_success() {
                                        write_set.next()
                                    } else {
                                        branch.write_set()
                                    };
                                }
                            })
                        })
                        .collect();

                    for handle in handles {
                        handle.join().unwrap();
                    }
                    black_box(branch.balance())
                });
            },
        );
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_sequential_writes,
    bench_stale_rejections,
    bench_contended_delivery
);
criterion_main!(benches);
