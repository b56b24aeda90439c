//! Priority queue benchmarks.

use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use std::hint::black_box;
use switchyard_queue::PriorityQueue;

fn benchmark_enqueue_dequeue(c: &mut Criterion) {
    let mut group = c.benchmark_group("priority_queue");
    group.throughput(Throughput::Elements(1));

    group.bench_function("enqueue_dequeue", |b| {
        let queue = PriorityQueue::new();

        b.iter(|| {
            queue.enqueue(black_box(42u64), black_box(1));
            black_box(queue.dequeue().unwrap())
        })
    });

    group.bench_function("mixed_priorities_1k", |b| {
        let queue = PriorityQueue::new();

        b.iter(|| {
            for i in 0..1000u64 {
                queue.enqueue(i, (i % 7) as i32);
            }
            while queue.can_dequeue() {
                black_box(queue.dequeue().unwrap());
            }
        })
    });

    group.finish();
}

criterion_group!(benches, benchmark_enqueue_dequeue);
criterion_main!(benches);
