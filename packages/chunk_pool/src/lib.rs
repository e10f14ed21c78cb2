#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! A fixed-size chunk allocator backed by pre-reserved memory blocks.
//!
//! This crate provides [`ChunkPool`], which reserves memory in large blocks, splits each block
//! into equally sized chunks and hands them out through an intrusive free list. Once a block
//! exists, allocating and freeing its chunks are constant-time pointer swaps that never touch the
//! system allocator.
//!
//! # Key Features
//!
//! - **Constant-time allocation**: Allocating pops the head of the free list, freeing pushes onto
//!   it. The most recently freed chunk is the next one handed out.
//! - **No per-chunk bookkeeping**: The free list is threaded through the chunks themselves, using
//!   a pointer-sized header in front of every payload.
//! - **Stable addresses**: Blocks never move, so pointers stay valid when the pool grows.
//! - **Optional growth**: An exhausted pool allocates another block on demand unless growth has
//!   been disabled, in which case allocation reports exhaustion.
//! - **Fallible, never aborting**: Out-of-memory conditions are reported as errors or as a failed
//!   allocation, never as a process abort.
//! - **Thread mobility**: The pool can be moved between threads but not shared without
//!   synchronization.
//!
//! # Examples
//!
//! ## Lifecycle of a manually initialized pool
//!
//! ```rust
//! use chunk_pool::ChunkPool;
//!
//! let mut pool = ChunkPool::new();
//! pool.initialize(64, 16).unwrap();
//!
//! let chunk = pool.alloc().unwrap();
//!
//! // SAFETY: The chunk is 64 bytes long and exclusively ours until freed.
//! unsafe { chunk.as_ptr().write_bytes(0xAB, 64) };
//!
//! // SAFETY: The chunk came from this pool and is freed exactly once.
//! unsafe { pool.free(Some(chunk)) };
//!
//! pool.destroy();
//! ```
//!
//! ## Storing typed values
//!
//! ```rust
//! use chunk_pool::ChunkPool;
//!
//! let mut pool = ChunkPool::builder()
//!     .chunk_size_of::<(u64, u32)>()
//!     .build()
//!     .unwrap();
//!
//! let chunk = pool.alloc().unwrap().cast::<(u64, u32)>();
//!
//! // SAFETY: Chunks are sized and aligned for the type we asked for.
//! unsafe {
//!     chunk.write((42, 7));
//!     assert_eq!(chunk.read(), (42, 7));
//! }
//!
//! // SAFETY: The chunk came from this pool and is freed exactly once.
//! unsafe { pool.free(Some(chunk.cast())) };
//! ```
//!
//! ## Fixed capacity
//!
//! ```rust
//! use chunk_pool::ChunkPool;
//!
//! let mut pool = ChunkPool::builder()
//!     .chunk_size(16)
//!     .chunks_per_block(2)
//!     .allow_growth(false)
//!     .build()
//!     .unwrap();
//!
//! assert!(pool.alloc().is_some());
//! assert!(pool.alloc().is_some());
//!
//! // Exhausted and not allowed to grow.
//! assert!(pool.alloc().is_none());
//! ```

mod block;
mod builder;
mod error;
mod free_list;
mod header;
mod layout;
mod metrics;
mod pool;
mod registry;
mod stats;

pub(crate) use block::*;
pub use builder::*;
pub use error::{Error, Result};
pub(crate) use free_list::*;
pub(crate) use layout::ChunkLayout;
pub use pool::{ChunkPool, DEFAULT_CHUNKS_PER_BLOCK};
pub(crate) use registry::*;
pub use stats::PoolStats;
pub(crate) use stats::Counters;
