//! Demonstrates the lifecycle of a `ChunkPool`: initialization, allocation, growth,
//! exhaustion with growth disabled and teardown.
//!
//! Pool lifecycle events are logged at debug level and printed by the subscriber.

use chunk_pool::ChunkPool;
use tracing::Level;

fn main() {
    tracing_subscriber::fmt().with_max_level(Level::DEBUG).init();

    println!("=== ChunkPool Basic Example ===");
    println!();

    let mut pool = ChunkPool::new();
    pool.initialize(24, 4).expect("initial block can be allocated");

    println!("Initialized pool:");
    println!("  Chunk size: {} bytes", pool.chunk_size());
    println!("  Chunk alignment: {} bytes", pool.chunk_align());
    println!("  Chunks per block: {}", pool.chunks_per_block());
    println!("  Capacity: {}", pool.capacity());
    println!();

    // Allocate more chunks than fit in one block to trigger growth.
    let chunks: Vec<_> = std::iter::repeat_with(|| pool.alloc())
        .take(6)
        .map(|chunk| chunk.expect("growth is allowed"))
        .collect();

    for (index, chunk) in chunks.iter().enumerate() {
        let fill = u8::try_from(index).expect("small index");

        // SAFETY: Each chunk is 24 bytes long and exclusively ours until freed.
        unsafe { chunk.as_ptr().write_bytes(fill, 24) };

        println!("  Chunk {index} at {chunk:?}");
    }

    println!();
    println!("After allocating {} chunks:", chunks.len());
    println!("  Blocks: {}", pool.block_count());
    println!("  Capacity: {}", pool.capacity());
    println!("  In use: {}", pool.len());
    println!("  Free without growing: {}", pool.free_count());
    println!();

    for chunk in chunks {
        // SAFETY: Every chunk came from this pool and is freed exactly once.
        unsafe { pool.free(Some(chunk)) };
    }

    // With growth disabled, the pool reports exhaustion instead of allocating.
    pool.set_allow_growth(false);

    let held: Vec<_> = std::iter::from_fn(|| pool.alloc()).collect();
    println!("Growth disabled, handed out {} chunks before exhaustion", held.len());

    for chunk in held {
        // SAFETY: Every chunk came from this pool and is freed exactly once.
        unsafe { pool.free(Some(chunk)) };
    }

    let stats = pool.stats();
    println!();
    println!("Statistics:");
    println!("  Allocations: {}", stats.allocations());
    println!("  Frees: {}", stats.frees());
    println!("  Peak in use: {}", stats.peak_in_use());
    println!();

    pool.destroy();

    println!("Destroyed pool, initialized: {}", pool.is_initialized());
}
