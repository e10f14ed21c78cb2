use std::cell::Cell;
use std::marker::PhantomData;

use crate::layout::HEADER_ALIGN;
use crate::{ChunkPool, DEFAULT_CHUNKS_PER_BLOCK, Result};

/// Builder for creating an initialized [`ChunkPool`].
///
/// The chunk size is mandatory. Use either `.chunk_size()` to provide a size in bytes or
/// `.chunk_size_of::<T>()` to size and align chunks for a specific type. Other settings are
/// optional.
///
/// # Examples
///
/// Using a size in bytes:
///
/// ```
/// use chunk_pool::ChunkPool;
///
/// let pool = ChunkPool::builder().chunk_size(48).build().unwrap();
///
/// assert_eq!(pool.chunk_size(), 48);
/// ```
///
/// Using a type:
///
/// ```
/// use chunk_pool::ChunkPool;
///
/// let pool = ChunkPool::builder()
///     .chunk_size_of::<[u64; 4]>()
///     .chunks_per_block(256)
///     .allow_growth(false)
///     .build()
///     .unwrap();
///
/// assert_eq!(pool.chunk_size(), 32);
/// assert_eq!(pool.capacity(), 256);
/// assert!(!pool.allows_growth());
/// ```
///
/// # Thread safety
///
/// The builder is thread-mobile ([`Send`]) and can be safely transferred between threads,
/// allowing pool configuration to happen on different threads than where the pool is used.
/// However, it is not thread-safe ([`Sync`]) as it contains mutable configuration state.
#[derive(Debug)]
#[must_use]
pub struct ChunkPoolBuilder {
    chunk_size: Option<usize>,
    chunk_align: usize,
    chunks_per_block: usize,
    allow_growth: bool,

    // Prevents Sync while allowing Send - builders are thread-mobile but not thread-safe
    _not_sync: PhantomData<Cell<()>>,
}

impl ChunkPoolBuilder {
    #[inline]
    pub(crate) fn new() -> Self {
        Self {
            chunk_size: None,
            chunk_align: HEADER_ALIGN,
            chunks_per_block: DEFAULT_CHUNKS_PER_BLOCK.get(),
            allow_growth: true,
            _not_sync: PhantomData,
        }
    }

    /// Sets the payload size of every chunk, in bytes.
    ///
    /// Zero is accepted and produces a degenerate pool that never hands out chunks.
    #[inline]
    pub fn chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = Some(chunk_size);
        self
    }

    /// Sets the payload size and alignment of every chunk to those of `T`.
    ///
    /// # Examples
    ///
    /// ```
    /// use chunk_pool::ChunkPool;
    ///
    /// let mut pool = ChunkPool::builder().chunk_size_of::<u128>().build().unwrap();
    ///
    /// let chunk = pool.alloc().unwrap();
    /// assert!(chunk.cast::<u128>().is_aligned());
    /// ```
    #[inline]
    pub fn chunk_size_of<T>(mut self) -> Self {
        self.chunk_size = Some(size_of::<T>());
        self.chunk_align = align_of::<T>();
        self
    }

    /// Sets the alignment of every payload, in bytes. Must be a power of two.
    ///
    /// Alignments below the alignment of a pointer are raised to it.
    #[inline]
    pub fn chunk_align(mut self, chunk_align: usize) -> Self {
        self.chunk_align = chunk_align;
        self
    }

    /// Sets the number of chunks in each block. Defaults to [`DEFAULT_CHUNKS_PER_BLOCK`].
    ///
    /// Zero is accepted and produces a degenerate pool that never hands out chunks.
    #[inline]
    pub fn chunks_per_block(mut self, chunks_per_block: usize) -> Self {
        self.chunks_per_block = chunks_per_block;
        self
    }

    /// Sets whether the pool allocates another block when it runs out of free chunks.
    /// Defaults to `true`.
    #[inline]
    pub fn allow_growth(mut self, allow_growth: bool) -> Self {
        self.allow_growth = allow_growth;
        self
    }

    /// Builds and initializes the pool, allocating its first block.
    ///
    /// # Errors
    ///
    /// Returns an error if the alignment is not a power of two, if the block size overflows or if
    /// the first block cannot be allocated.
    ///
    /// # Panics
    ///
    /// Panics if no chunk size has been set using either [`chunk_size`](Self::chunk_size) or
    /// [`chunk_size_of`](Self::chunk_size_of).
    pub fn build(self) -> Result<ChunkPool> {
        let chunk_size = self.chunk_size.expect(
            "chunk size must be set using .chunk_size() or .chunk_size_of::<T>() before calling .build()",
        );

        let mut pool = ChunkPool::new();
        pool.set_allow_growth(self.allow_growth);
        pool.initialize_aligned(chunk_size, self.chunks_per_block, self.chunk_align)?;

        Ok(pool)
    }
}
