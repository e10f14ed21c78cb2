//! Basic benchmarks for the `chunk_pool` crate.
#![allow(
    missing_docs,
    reason = "No need for API documentation in benchmark code"
)]

use std::hint::black_box;
use std::iter;
use std::ptr::NonNull;
use std::time::Instant;

use alloc_tracker::Allocator;
use chunk_pool::ChunkPool;
use criterion::{Criterion, criterion_group, criterion_main};

criterion_group!(benches, entrypoint);
criterion_main!(benches);

#[global_allocator]
static ALLOCATOR: Allocator<std::alloc::System> = Allocator::system();

const CHUNK_SIZE: usize = 4;
const CHUNKS_PER_BLOCK: usize = 1024;
const BATCH_SIZE: usize = 1024;

fn new_pool() -> ChunkPool {
    let mut pool = ChunkPool::new();
    pool.initialize(CHUNK_SIZE, CHUNKS_PER_BLOCK).unwrap();
    pool
}

fn entrypoint(c: &mut Criterion) {
    let allocs = alloc_tracker::Session::new();

    let mut group = c.benchmark_group("chunk_pool_basic");

    let allocs_op = allocs.operation("initialize");
    group.bench_function("initialize", |b| {
        b.iter_custom(|iters| {
            let _span = allocs_op.measure_thread().iterations(iters);

            let start = Instant::now();

            for _ in 0..iters {
                drop(black_box(new_pool()));
            }

            start.elapsed()
        });
    });

    let allocs_op = allocs.operation("alloc_one");
    group.bench_function("alloc_one", |b| {
        b.iter_custom(|iters| {
            let mut pools = iter::repeat_with(new_pool)
                .take(usize::try_from(iters).unwrap())
                .collect::<Vec<_>>();

            let _span = allocs_op.measure_thread().iterations(iters);

            let start = Instant::now();

            for pool in &mut pools {
                _ = black_box(pool.alloc());
            }

            start.elapsed()
        });
    });

    let allocs_op = allocs.operation("free_one");
    group.bench_function("free_one", |b| {
        b.iter_custom(|iters| {
            let mut pools = iter::repeat_with(new_pool)
                .take(usize::try_from(iters).unwrap())
                .collect::<Vec<_>>();

            let chunks = pools.iter_mut().map(ChunkPool::alloc).collect::<Vec<_>>();

            let _span = allocs_op.measure_thread().iterations(iters);

            let start = Instant::now();

            for (pool, chunk) in pools.iter_mut().zip(chunks) {
                // SAFETY: Each chunk came from the pool it is returned to and is freed once.
                unsafe { pool.free(black_box(chunk)) };
            }

            start.elapsed()
        });
    });

    let allocs_op = allocs.operation("alloc_free_cycle");
    group.bench_function("alloc_free_cycle", |b| {
        b.iter_custom(|iters| {
            let mut pool = new_pool();

            let _span = allocs_op.measure_thread().iterations(iters);

            let start = Instant::now();

            for _ in 0..iters {
                let chunk = black_box(pool.alloc());

                // SAFETY: The chunk came from this pool and is freed once.
                unsafe { pool.free(chunk) };
            }

            start.elapsed()
        });
    });

    group.finish();

    let mut group = c.benchmark_group("chunk_pool_slow");

    // Allocates a batch of small chunks and then frees all of them, comparing the pool
    // against boxing each value with the global allocator.
    let allocs_op = allocs.operation("pool_batch_1024");
    group.bench_function("pool_batch_1024", |b| {
        b.iter_custom(|iters| {
            let mut pool = new_pool();
            let mut chunks: Vec<Option<NonNull<u8>>> = Vec::with_capacity(BATCH_SIZE);

            let _span = allocs_op.measure_thread().iterations(iters);

            let start = Instant::now();

            for _ in 0..iters {
                chunks.extend(iter::repeat_with(|| pool.alloc()).take(BATCH_SIZE));

                #[expect(clippy::iter_with_drain, reason = "to reuse the buffer")]
                for chunk in chunks.drain(..) {
                    // SAFETY: Every chunk came from this pool and is freed once.
                    unsafe { pool.free(black_box(chunk)) };
                }
            }

            start.elapsed()
        });
    });

    let allocs_op = allocs.operation("box_batch_1024");
    group.bench_function("box_batch_1024", |b| {
        b.iter_custom(|iters| {
            let mut boxes: Vec<Box<[u8; CHUNK_SIZE]>> = Vec::with_capacity(BATCH_SIZE);

            let _span = allocs_op.measure_thread().iterations(iters);

            let start = Instant::now();

            for _ in 0..iters {
                boxes.extend(iter::repeat_with(|| Box::new([0_u8; CHUNK_SIZE])).take(BATCH_SIZE));

                #[expect(clippy::iter_with_drain, reason = "to reuse the buffer")]
                for value in boxes.drain(..) {
                    drop(black_box(value));
                }
            }

            start.elapsed()
        });
    });

    let allocs_op = allocs.operation("grow_10k");
    group.bench_function("grow_10k", |b| {
        b.iter_custom(|iters| {
            let mut pools = iter::repeat_with(new_pool)
                .take(usize::try_from(iters).unwrap())
                .collect::<Vec<_>>();

            let _span = allocs_op.measure_thread().iterations(iters);

            let start = Instant::now();

            for pool in &mut pools {
                for _ in 0..10_000 {
                    _ = black_box(pool.alloc());
                }
            }

            start.elapsed()
        });
    });

    group.finish();

    allocs.print_to_stdout();
}
