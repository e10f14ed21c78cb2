//! Integration tests for the `chunk_pool` package.
//!
//! These tests exercise `ChunkPool` through its public API only, covering the full lifecycle,
//! growth behavior, address stability and re-initialization.

#![allow(
    clippy::undocumented_unsafe_blocks,
    clippy::multiple_unsafe_ops_per_block,
    clippy::indexing_slicing,
    reason = "tests focus on succinct code and do not need to tick all the boxes"
)]

use std::collections::HashSet;
use std::ptr::NonNull;

use chunk_pool::{ChunkPool, Error};

/// Allocates until the pool reports exhaustion.
fn drain(pool: &mut ChunkPool) -> Vec<NonNull<u8>> {
    std::iter::from_fn(|| pool.alloc()).collect()
}

/// Allocates exactly `count` chunks.
fn alloc_many(pool: &mut ChunkPool, count: usize) -> Vec<NonNull<u8>> {
    (0..count).map(|_| pool.alloc().unwrap()).collect()
}

#[test]
fn two_chunk_pool_lifecycle() {
    let mut pool = ChunkPool::new();
    pool.initialize(4, 2).unwrap();
    pool.set_allow_growth(false);

    let a = pool.alloc().unwrap();
    let b = pool.alloc().unwrap();
    assert_ne!(a, b);

    assert!(pool.alloc().is_none());

    unsafe { pool.free(Some(a)) };
    let c = pool.alloc().unwrap();
    assert_eq!(c, a);

    unsafe {
        pool.free(Some(b));
        pool.free(Some(c));
    }

    pool.destroy();

    assert!(!pool.is_initialized());
    assert_eq!(pool.chunk_size(), 0);
    assert_eq!(pool.chunks_per_block(), 0);
    assert_eq!(pool.block_count(), 0);
}

#[test]
fn zero_sized_configuration_never_allocates() {
    let mut pool = ChunkPool::new();
    pool.initialize(0, 0).unwrap();

    assert!(pool.is_degenerate());
    assert!(pool.alloc().is_none());
    assert!(pool.alloc().is_none());
    assert_eq!(pool.block_count(), 0);
    assert!(matches!(pool.grow(), Err(Error::DegenerateConfiguration)));

    pool.destroy();
    assert!(!pool.is_initialized());
}

#[test]
fn growth_hands_out_distinct_non_overlapping_chunks() {
    const CHUNK_SIZE: usize = 24;
    const CHUNKS_PER_BLOCK: usize = 8;

    let mut pool = ChunkPool::new();
    pool.initialize(CHUNK_SIZE, CHUNKS_PER_BLOCK).unwrap();

    let chunks: Vec<_> = (0..=CHUNKS_PER_BLOCK)
        .map(|_| pool.alloc().unwrap())
        .collect();

    assert_eq!(pool.block_count(), 2);
    assert_eq!(pool.capacity(), CHUNKS_PER_BLOCK * 2);
    assert_eq!(pool.len(), CHUNKS_PER_BLOCK + 1);

    let distinct: HashSet<_> = chunks.iter().map(|chunk| chunk.addr()).collect();
    assert_eq!(distinct.len(), chunks.len());

    let mut addresses: Vec<_> = chunks.iter().map(|chunk| chunk.addr().get()).collect();
    addresses.sort_unstable();

    for pair in addresses.windows(2) {
        assert!(pair[1] - pair[0] >= CHUNK_SIZE);
    }

    for chunk in chunks {
        unsafe { pool.free(Some(chunk)) };
    }

    assert!(pool.is_empty());
    assert_eq!(pool.free_count(), pool.capacity());
}

#[test]
fn contents_survive_growth() {
    const CHUNK_SIZE: usize = 32;

    let mut pool = ChunkPool::new();
    pool.initialize(CHUNK_SIZE, 4).unwrap();

    let chunks: Vec<_> = (0..4).map(|_| pool.alloc().unwrap()).collect();

    for (index, chunk) in chunks.iter().enumerate() {
        let fill = u8::try_from(index).unwrap();
        unsafe { chunk.as_ptr().write_bytes(fill, CHUNK_SIZE) };
    }

    // Force several rounds of growth while the first chunks are in use.
    let more: Vec<_> = (0..16).map(|_| pool.alloc().unwrap()).collect();
    assert_eq!(pool.block_count(), 5);

    for chunk in &more {
        unsafe { chunk.as_ptr().write_bytes(0xFF, CHUNK_SIZE) };
    }

    for (index, chunk) in chunks.iter().enumerate() {
        let fill = u8::try_from(index).unwrap();
        let contents = unsafe { std::slice::from_raw_parts(chunk.as_ptr(), CHUNK_SIZE) };

        assert!(contents.iter().all(|byte| *byte == fill));
    }
}

#[test]
fn freed_chunks_are_reused_before_growing() {
    let mut pool = ChunkPool::new();
    pool.initialize(16, 4).unwrap();

    let chunks = alloc_many(&mut pool, 4);
    for chunk in chunks.iter().rev() {
        unsafe { pool.free(Some(*chunk)) };
    }

    let again = alloc_many(&mut pool, 4);

    assert_eq!(pool.block_count(), 1);
    assert_eq!(again, chunks);
}

#[test]
fn destroy_twice_behaves_like_fresh_pool() {
    let mut pool = ChunkPool::new();
    pool.initialize(8, 4).unwrap();
    pool.set_allow_growth(false);

    pool.destroy();
    pool.destroy();

    let fresh = ChunkPool::new();

    assert_eq!(pool.is_initialized(), fresh.is_initialized());
    assert_eq!(pool.chunk_size(), fresh.chunk_size());
    assert_eq!(pool.chunks_per_block(), fresh.chunks_per_block());
    assert_eq!(pool.block_count(), fresh.block_count());
    assert_eq!(pool.allows_growth(), fresh.allows_growth());
    assert_eq!(pool.stats(), fresh.stats());
    assert!(pool.alloc().is_none());
}

#[test]
fn reinitialize_replaces_configuration() {
    let mut pool = ChunkPool::new();
    pool.initialize(8, 4).unwrap();
    let _first = pool.alloc().unwrap();
    pool.grow().unwrap();
    assert_eq!(pool.block_count(), 2);

    pool.initialize(64, 2).unwrap();

    assert_eq!(pool.chunk_size(), 64);
    assert_eq!(pool.chunks_per_block(), 2);
    assert_eq!(pool.block_count(), 1);
    assert_eq!(pool.capacity(), 2);
    assert!(pool.is_empty());

    let chunk = pool.alloc().unwrap();
    unsafe { chunk.as_ptr().write_bytes(0x5A, 64) };
    unsafe { pool.free(Some(chunk)) };
}

#[test]
fn fixed_capacity_pool_recovers_after_free() {
    let mut pool = ChunkPool::builder()
        .chunk_size(12)
        .chunks_per_block(3)
        .allow_growth(false)
        .build()
        .unwrap();

    let chunks = drain(&mut pool);
    assert_eq!(chunks.len(), 3);
    assert_eq!(pool.free_count(), 0);

    unsafe { pool.free(chunks.first().copied()) };

    assert_eq!(pool.free_count(), 1);
    assert_eq!(pool.alloc(), chunks.first().copied());
    assert!(pool.alloc().is_none());
}

#[test]
fn enabling_growth_lets_exhausted_pool_continue() {
    let mut pool = ChunkPool::builder()
        .chunk_size(8)
        .chunks_per_block(2)
        .allow_growth(false)
        .build()
        .unwrap();

    assert_eq!(drain(&mut pool).len(), 2);

    pool.set_allow_growth(true);

    assert!(pool.alloc().is_some());
    assert_eq!(pool.block_count(), 2);
}

#[test]
fn typed_values_round_trip_through_chunks() {
    #[derive(Clone, Copy, Debug, PartialEq)]
    struct Particle {
        position: [f64; 3],
        id: u32,
    }

    let mut pool = ChunkPool::builder()
        .chunk_size_of::<Particle>()
        .chunks_per_block(16)
        .build()
        .unwrap();

    let handles: Vec<_> = (0..40_u32)
        .map(|id| {
            let chunk = pool.alloc().unwrap().cast::<Particle>();
            assert!(chunk.is_aligned());

            unsafe {
                chunk.write(Particle {
                    position: [f64::from(id); 3],
                    id,
                });
            }

            chunk
        })
        .collect();

    for (id, chunk) in (0..40_u32).zip(&handles) {
        let particle = unsafe { chunk.read() };
        assert_eq!(particle.id, id);
        assert_eq!(particle.position, [f64::from(id); 3]);
    }

    for chunk in handles {
        unsafe { pool.free(Some(chunk.cast())) };
    }

    let stats = pool.stats();
    assert_eq!(stats.allocations(), 40);
    assert_eq!(stats.frees(), 40);
    assert_eq!(stats.peak_in_use(), 40);
    assert_eq!(stats.blocks(), 3);
}

#[test]
fn pool_moves_to_another_thread_with_its_memory() {
    let mut pool = ChunkPool::builder().chunk_size(16).build().unwrap();

    let chunk = pool.alloc().unwrap();
    unsafe { chunk.as_ptr().write_bytes(7, 16) };
    unsafe { pool.free(Some(chunk)) };

    let handle = std::thread::spawn(move || {
        let chunk = pool.alloc().unwrap();
        unsafe { pool.free(Some(chunk)) };
        pool.stats()
    });

    let stats = handle.join().expect("thread completed successfully");
    assert_eq!(stats.allocations(), 2);
    assert_eq!(stats.in_use(), 0);
}
