use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::sync::Arc;
use std::thread;

use crossbeam_channel::bounded;
use flume::bounded as flume_bounded;
use slotring::RingBuffer;

const MESSAGES: usize = 1_000_000;
const BUFFER_SIZE: usize = 1024;

/// (producers, consumers)
const SHAPES: [(usize, usize); 4] = [(1, 1), (4, 1), (1, 4), (4, 4)];

fn run_slotring(capacity: usize, producers: usize, consumers: usize) {
    let ring = Arc::new(RingBuffer::<usize>::new(capacity).unwrap());
    let per_producer = MESSAGES / producers;
    let per_consumer = MESSAGES / consumers;
    let mut handles = Vec::with_capacity(producers + consumers);

    for p in 0..producers {
        let ring = ring.clone();
        handles.push(thread::spawn(move || {
            for i in 0..per_producer {
                ring.enqueue(black_box(p * per_producer + i)).unwrap();
            }
        }));
    }

    for _ in 0..consumers {
        let ring = ring.clone();
        handles.push(thread::spawn(move || {
            for _ in 0..per_consumer {
                black_box(ring.dequeue().unwrap());
            }
        }));
    }

    for h in handles {
        h.join().unwrap();
    }
}

fn run_crossbeam(producers: usize, consumers: usize) {
    let (tx, rx) = bounded::<usize>(BUFFER_SIZE);
    let per_producer = MESSAGES / producers;
    let per_consumer = MESSAGES / consumers;
    let mut handles = Vec::with_capacity(producers + consumers);

    for p in 0..producers {
        let tx = tx.clone();
        handles.push(thread::spawn(move || {
            for i in 0..per_producer {
                tx.send(black_box(p * per_producer + i)).unwrap();
            }
        }));
    }
    drop(tx);

    for _ in 0..consumers {
        let rx = rx.clone();
        handles.push(thread::spawn(move || {
            for _ in 0..per_consumer {
                black_box(rx.recv().unwrap());
            }
        }));
    }

    for h in handles {
        h.join().unwrap();
    }
}

fn run_flume(producers: usize, consumers: usize) {
    let (tx, rx) = flume_bounded::<usize>(BUFFER_SIZE);
    let per_producer = MESSAGES / producers;
    let per_consumer = MESSAGES / consumers;
    let mut handles = Vec::with_capacity(producers + consumers);

    for p in 0..producers {
        let tx = tx.clone();
        handles.push(thread::spawn(move || {
            for i in 0..per_producer {
                tx.send(black_box(p * per_producer + i)).unwrap();
            }
        }));
    }
    drop(tx);

    for _ in 0..consumers {
        let rx = rx.clone();
        handles.push(thread::spawn(move || {
            for _ in 0..per_consumer {
                black_box(rx.recv().unwrap());
            }
        }));
    }

    for h in handles {
        h.join().unwrap();
    }
}

fn bench_shapes(c: &mut Criterion) {
    let mut group = c.benchmark_group("mpmc");
    group.throughput(Throughput::Elements(MESSAGES as u64));
    group.sample_size(10);

    for (producers, consumers) in SHAPES {
        let shape = format!("{}p_{}c", producers, consumers);

        group.bench_with_input(BenchmarkId::new("slotring", &shape), &(), |b, _| {
            b.iter(|| run_slotring(BUFFER_SIZE, producers, consumers));
        });
        group.bench_with_input(BenchmarkId::new("crossbeam_channel", &shape), &(), |b, _| {
            b.iter(|| run_crossbeam(producers, consumers));
        });
        group.bench_with_input(BenchmarkId::new("flume", &shape), &(), |b, _| {
            b.iter(|| run_flume(producers, consumers));
        });
    }

    group.finish();
}

/// Masked (power of two) against modulo slot lookup.
fn bench_capacity(c: &mut Criterion) {
    let mut group = c.benchmark_group("capacity");
    group.throughput(Throughput::Elements(MESSAGES as u64));
    group.sample_size(10);

    for capacity in [1, 7, 8, 1000, 1024] {
        group.bench_with_input(
            BenchmarkId::from_parameter(capacity),
            &capacity,
            |b, &capacity| {
                b.iter(|| run_slotring(capacity, 1, 1));
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_shapes, bench_capacity);
criterion_main!(benches);
