use std::num::NonZero;
use std::ptr::NonNull;

use new_zealand::nz;
use tracing::debug;

use crate::layout::HEADER_ALIGN;
use crate::{
    Block, BlockRegistry, ChunkLayout, ChunkPoolBuilder, Counters, Error, FreeList, PoolStats,
    Result, metrics,
};

/// Number of chunks in each block when the pool is created via the builder without specifying
/// a block size.
#[cfg(not(miri))]
pub const DEFAULT_CHUNKS_PER_BLOCK: NonZero<usize> = nz!(128);

// Under Miri, we use smaller blocks because Miri test runtime scales by memory usage.
#[cfg(miri)]
pub const DEFAULT_CHUNKS_PER_BLOCK: NonZero<usize> = nz!(16);

/// A fixed-size chunk allocator.
///
/// The pool reserves memory in large blocks, each split into equally sized chunks, and hands out
/// chunks from an intrusive free list. Allocating pops the front of the list and freeing pushes
/// onto the front, so the most recently freed chunk is the next one handed out.
///
/// # Lifecycle
///
/// A pool created with [`new()`](Self::new) is empty and holds no memory.
/// [`initialize()`](Self::initialize) fixes the chunk size and block size and allocates the first
/// block. [`destroy()`](Self::destroy) releases every block and returns the pool to the empty
/// state, after which it may be initialized again. Dropping the pool releases its memory.
///
/// # Memory
///
/// Pointers returned by [`alloc()`](Self::alloc) point into blocks owned by the pool. Blocks never
/// move, so pointers stay valid when the pool grows. They become dangling when the pool is
/// destroyed, re-initialized or dropped. Returned memory is not zeroed and may contain data from
/// a previous use of the same chunk.
///
/// # Examples
///
/// ```
/// use chunk_pool::ChunkPool;
///
/// let mut pool = ChunkPool::new();
/// pool.initialize(4, 2).unwrap();
/// pool.set_allow_growth(false);
///
/// let a = pool.alloc().unwrap();
/// let b = pool.alloc().unwrap();
/// assert_ne!(a, b);
///
/// // The pool is exhausted and may not grow.
/// assert!(pool.alloc().is_none());
///
/// // SAFETY: `a` came from this pool and is not free.
/// unsafe { pool.free(Some(a)) };
///
/// // The most recently freed chunk is handed out next.
/// assert_eq!(pool.alloc(), Some(a));
///
/// pool.destroy();
/// assert_eq!(pool.chunk_size(), 0);
/// ```
///
/// # Thread safety
///
/// The pool is thread-mobile ([`Send`]) but not thread-safe ([`Sync`]). To share a pool between
/// threads, guard the whole pool with a mutex.
#[derive(Debug)]
pub struct ChunkPool {
    /// Layout of the chunks in this pool, `None` if the pool has not been initialized.
    chunk_layout: Option<ChunkLayout>,

    chunks_per_block: usize,

    /// Whether an exhausted pool may allocate another block on demand.
    allow_growth: bool,

    /// Owns all blocks. Not used on the allocate and free paths.
    registry: BlockRegistry,

    /// Chunks that are available for allocation.
    free_list: FreeList,

    counters: Counters,
}

impl ChunkPool {
    /// Creates an empty pool that holds no memory.
    ///
    /// The pool must be initialized before it can hand out chunks.
    ///
    /// # Example
    ///
    /// ```
    /// use chunk_pool::ChunkPool;
    ///
    /// let mut pool = ChunkPool::new();
    ///
    /// assert!(!pool.is_initialized());
    /// assert_eq!(pool.capacity(), 0);
    /// assert!(pool.alloc().is_none());
    /// ```
    #[must_use]
    pub const fn new() -> Self {
        Self {
            chunk_layout: None,
            chunks_per_block: 0,
            allow_growth: true,
            registry: BlockRegistry::new(),
            free_list: FreeList::new(),
            counters: Counters::new(),
        }
    }

    /// Creates a builder for configuring and initializing a [`ChunkPool`] in one step.
    ///
    /// # Example
    ///
    /// ```
    /// use chunk_pool::ChunkPool;
    ///
    /// let pool = ChunkPool::builder()
    ///     .chunk_size(64)
    ///     .chunks_per_block(32)
    ///     .build()
    ///     .unwrap();
    ///
    /// assert_eq!(pool.chunk_size(), 64);
    /// assert_eq!(pool.capacity(), 32);
    /// ```
    #[inline]
    pub fn builder() -> ChunkPoolBuilder {
        ChunkPoolBuilder::new()
    }

    /// Configures the pool for chunks of `chunk_size` bytes, allocated in blocks of
    /// `chunks_per_block` chunks, and allocates the first block.
    ///
    /// Any memory the pool already holds is released first, invalidating all pointers previously
    /// handed out. The growth setting is kept.
    ///
    /// A chunk size or block size of zero is accepted and produces a degenerate pool that holds
    /// no memory and reports exhaustion on every allocation.
    ///
    /// Payloads are aligned to the alignment of a pointer. Use
    /// [`initialize_aligned()`](Self::initialize_aligned) for stricter alignment.
    ///
    /// # Errors
    ///
    /// Returns an error if the first block cannot be allocated or its size overflows.
    /// The pool is left empty in that case.
    pub fn initialize(&mut self, chunk_size: usize, chunks_per_block: usize) -> Result<()> {
        self.initialize_aligned(chunk_size, chunks_per_block, HEADER_ALIGN)
    }

    /// Same as [`initialize()`](Self::initialize) but aligns every payload to `chunk_align`
    /// bytes. Alignments below the alignment of a pointer are raised to it.
    ///
    /// # Example
    ///
    /// ```
    /// use chunk_pool::ChunkPool;
    ///
    /// let mut pool = ChunkPool::new();
    /// pool.initialize_aligned(48, 16, 64).unwrap();
    ///
    /// let chunk = pool.alloc().unwrap();
    /// assert_eq!(chunk.addr().get() % 64, 0);
    /// ```
    ///
    /// # Errors
    ///
    /// Returns an error if `chunk_align` is not a power of two, if the block size overflows or if
    /// the first block cannot be allocated. The pool is left empty in that case.
    pub fn initialize_aligned(
        &mut self,
        chunk_size: usize,
        chunks_per_block: usize,
        chunk_align: usize,
    ) -> Result<()> {
        if self.is_initialized() {
            self.release_memory();
        }

        let chunk_layout =
            ChunkLayout::calculate(chunk_size, chunk_align).map_err(|error| match error {
                // The chunk layout is calculated for a single chunk, so report the real block size.
                Error::LayoutOverflow { chunk_size, .. } => Error::LayoutOverflow {
                    chunk_size,
                    chunks_per_block,
                },
                other => other,
            })?;

        self.chunk_layout = Some(chunk_layout);
        self.chunks_per_block = chunks_per_block;

        if self.is_degenerate() {
            debug!(
                chunk_size,
                chunks_per_block, "initialized degenerate chunk pool without memory"
            );
            return Ok(());
        }

        if let Err(error) = self.grow() {
            self.release_memory();
            return Err(error);
        }

        debug!(
            chunk_size,
            chunks_per_block,
            stride = chunk_layout.stride(),
            "initialized chunk pool"
        );

        Ok(())
    }

    /// Releases all memory held by the pool and returns it to the empty state.
    ///
    /// All pointers previously handed out become dangling. The growth setting returns to its
    /// default (allowed). Calling this on an empty pool releases nothing.
    ///
    /// # Example
    ///
    /// ```
    /// use chunk_pool::ChunkPool;
    ///
    /// let mut pool = ChunkPool::builder().chunk_size(16).build().unwrap();
    ///
    /// pool.destroy();
    /// pool.destroy();
    ///
    /// assert!(!pool.is_initialized());
    /// assert_eq!(pool.block_count(), 0);
    /// ```
    pub fn destroy(&mut self) {
        if self.is_initialized() {
            debug!(
                blocks = self.registry.len(),
                bytes = self.registry.size_bytes(),
                in_use = self.counters.in_use(),
                "destroying chunk pool"
            );
        }

        self.release_memory();
        self.allow_growth = true;
    }

    /// Hands out a chunk of [`chunk_size()`](Self::chunk_size) bytes, or `None` if the pool is
    /// exhausted and cannot grow.
    ///
    /// If no chunk is free and growth is allowed, a new block is allocated first. Failure to
    /// allocate the block results in `None`. A pool that is not initialized or is degenerate
    /// always returns `None` without attempting to grow.
    ///
    /// The returned memory is not zeroed. It remains owned by the pool and may only be released
    /// via [`free()`](Self::free) or by destroying the pool.
    ///
    /// # Example
    ///
    /// ```
    /// use chunk_pool::ChunkPool;
    ///
    /// let mut pool = ChunkPool::builder().chunk_size_of::<u64>().build().unwrap();
    ///
    /// let chunk = pool.alloc().unwrap().cast::<u64>();
    ///
    /// // SAFETY: The chunk is large enough and sufficiently aligned for a u64
    /// // and nobody else is accessing it.
    /// unsafe {
    ///     chunk.write(42);
    ///     assert_eq!(chunk.read(), 42);
    /// }
    /// ```
    #[must_use]
    pub fn alloc(&mut self) -> Option<NonNull<u8>> {
        // An empty or degenerate pool has nothing to hand out and nothing to grow.
        let chunk_layout = self.chunk_layout.filter(|_| !self.is_degenerate())?;

        if self.free_list.is_empty() {
            if !self.allow_growth {
                return None;
            }

            if let Err(error) = self.grow() {
                debug!(%error, "chunk pool exhausted and could not grow");
                return None;
            }
        }

        let chunk = self.free_list.pop()?;

        self.counters.record_alloc();

        // SAFETY: The payload follows the header within the same chunk,
        // so the offset stays inside the block that contains the chunk.
        Some(unsafe { chunk.byte_add(chunk_layout.payload_offset()) })
    }

    /// Returns a chunk to the pool. Passing `None` does nothing.
    ///
    /// The chunk becomes the next one handed out by [`alloc()`](Self::alloc).
    ///
    /// # Panics
    ///
    /// In debug builds, panics if the pointer does not point to the payload of a chunk in this
    /// pool. Release builds do not check this.
    ///
    /// # Safety
    ///
    /// The caller must ensure that:
    /// - `ptr` was returned by [`alloc()`](Self::alloc) on this pool since it was last initialized.
    /// - The chunk has not been freed since it was returned (no double free).
    /// - The chunk memory is not accessed after this call.
    pub unsafe fn free(&mut self, ptr: Option<NonNull<u8>>) {
        let Some(ptr) = ptr else {
            return;
        };

        debug_assert!(
            self.chunk_layout.is_some(),
            "freed a chunk into a chunk pool that holds no memory"
        );

        let Some(chunk_layout) = self.chunk_layout else {
            return;
        };

        // SAFETY: The caller guarantees that `ptr` is the payload of a chunk in this pool,
        // which sits exactly `payload_offset` bytes after the chunk header.
        let chunk = unsafe { ptr.byte_sub(chunk_layout.payload_offset()) };

        debug_assert!(
            self.registry.contains_chunk(chunk),
            "freed pointer {ptr:?} does not belong to this chunk pool"
        );

        // SAFETY: The chunk is in a block owned by this pool and the caller guarantees
        // that it is not already free.
        unsafe { self.free_list.push(chunk) };

        self.counters.record_free();
    }

    /// Allocates one more block and appends its chunks to the end of the free list.
    ///
    /// [`alloc()`](Self::alloc) calls this automatically when the pool is exhausted and growth is
    /// allowed. Calling it directly pre-allocates capacity, which also works when growth is not
    /// allowed. Pointers already handed out remain valid.
    ///
    /// # Example
    ///
    /// ```
    /// use chunk_pool::ChunkPool;
    ///
    /// let mut pool = ChunkPool::builder()
    ///     .chunk_size(8)
    ///     .chunks_per_block(4)
    ///     .allow_growth(false)
    ///     .build()
    ///     .unwrap();
    ///
    /// pool.grow().unwrap();
    ///
    /// assert_eq!(pool.block_count(), 2);
    /// assert_eq!(pool.capacity(), 8);
    /// ```
    ///
    /// # Errors
    ///
    /// Returns an error if the pool is not initialized, if it is degenerate, or if memory for the
    /// block cannot be allocated. The pool is unchanged in all these cases.
    #[cfg_attr(test, mutants::skip)] // Can be mutated to infinitely growing memory use.
    pub fn grow(&mut self) -> Result<()> {
        let chunk_layout = self.chunk_layout.ok_or(Error::NotInitialized)?;

        let chunks_per_block = NonZero::new(self.chunks_per_block)
            .filter(|_| chunk_layout.chunk_size() > 0)
            .ok_or(Error::DegenerateConfiguration)?;

        let chain = self
            .registry
            .try_push_with(|| Block::allocate(&chunk_layout, chunks_per_block))?;

        // SAFETY: The chain is the pre-linked chunk chain of a block we just allocated and
        // registered, so none of its chunks can already be in the free list.
        unsafe { self.free_list.append(chain) };

        let block_bytes = chunk_layout
            .stride()
            .wrapping_mul(chunks_per_block.get());

        metrics::record_block_allocated(block_bytes);

        debug!(
            blocks = self.registry.len(),
            block_bytes, "chunk pool grew by one block"
        );

        Ok(())
    }

    /// The payload size of every chunk, or zero if the pool is not initialized.
    #[must_use]
    #[inline]
    pub fn chunk_size(&self) -> usize {
        self.chunk_layout.map_or(0, |layout| layout.chunk_size())
    }

    /// The number of chunks in each block, or zero if the pool is not initialized.
    #[must_use]
    #[inline]
    pub fn chunks_per_block(&self) -> usize {
        self.chunks_per_block
    }

    /// The alignment of every payload, or zero if the pool is not initialized.
    #[must_use]
    #[inline]
    pub fn chunk_align(&self) -> usize {
        self.chunk_layout.map_or(0, |layout| layout.align())
    }

    /// Whether the pool allocates another block when it runs out of free chunks.
    #[must_use]
    #[inline]
    pub fn allows_growth(&self) -> bool {
        self.allow_growth
    }

    /// Sets whether the pool allocates another block when it runs out of free chunks.
    ///
    /// When growth is not allowed, [`alloc()`](Self::alloc) returns `None` on exhaustion.
    #[inline]
    pub fn set_allow_growth(&mut self, allow: bool) {
        self.allow_growth = allow;
    }

    /// Whether the pool has been initialized and not destroyed since.
    #[must_use]
    #[inline]
    pub fn is_initialized(&self) -> bool {
        self.chunk_layout.is_some()
    }

    /// Whether the pool was initialized with a zero chunk size or zero chunks per block.
    ///
    /// A degenerate pool holds no memory and every allocation fails.
    #[must_use]
    pub fn is_degenerate(&self) -> bool {
        self.chunk_layout
            .is_some_and(|layout| layout.chunk_size() == 0 || self.chunks_per_block == 0)
    }

    /// The number of blocks the pool holds.
    #[must_use]
    #[inline]
    pub fn block_count(&self) -> usize {
        self.registry.len()
    }

    /// The total number of chunks across all blocks, whether free or in use.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.registry.chunk_count()
    }

    /// The number of chunks currently handed out to callers.
    #[must_use]
    #[inline]
    pub fn len(&self) -> usize {
        self.counters.in_use()
    }

    /// Whether no chunks are currently handed out to callers.
    ///
    /// An empty pool may still be holding memory.
    #[must_use]
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The number of chunks available without growing.
    ///
    /// This walks the free list, so it takes time proportional to the result.
    #[must_use]
    pub fn free_count(&self) -> usize {
        self.free_list.len()
    }

    /// A snapshot of the allocation counters of the pool.
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        self.counters
            .snapshot(self.registry.len(), self.registry.chunk_count())
    }

    /// Releases all blocks and clears configuration, but keeps the growth setting.
    fn release_memory(&mut self) {
        // The free list points into the blocks, so it must be forgotten together with them.
        self.free_list.clear();
        self.registry.clear();
        self.counters.reset();
        self.chunk_layout = None;
        self.chunks_per_block = 0;
    }

    #[cfg(test)]
    pub(crate) fn owns_chunk_payload(&self, ptr: NonNull<u8>) -> bool {
        self.chunk_layout.is_some_and(|layout| {
            let chunk = ptr.as_ptr().wrapping_byte_sub(layout.payload_offset());

            NonNull::new(chunk).is_some_and(|chunk| self.registry.contains_chunk(chunk))
        })
    }
}

impl Default for ChunkPool {
    fn default() -> Self {
        Self::new()
    }
}

// SAFETY: The pool exclusively owns all of its blocks and the free list only points into those
// blocks, so moving the whole pool to another thread moves all the memory it refers to.
// The pool is not Sync because allocating and freeing mutate shared state without synchronization.
unsafe impl Send for ChunkPool {}

#[cfg(test)]
#[allow(
    clippy::undocumented_unsafe_blocks,
    clippy::multiple_unsafe_ops_per_block,
    clippy::indexing_slicing,
    reason = "tests focus on succinct code and do not need to tick all the boxes"
)]
mod tests {
    use std::io;
    use std::sync::{Arc, Mutex};

    use static_assertions::{assert_impl_all, assert_not_impl_any};
    use tracing::Level;

    use super::*;

    /// Log output of everything emitted while running a closure.
    #[derive(Clone, Debug, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn capture_logs(f: impl FnOnce()) -> String {
        let logs = CapturedLogs::default();
        let writer = logs.clone();

        let subscriber = tracing_subscriber::fmt()
            .with_max_level(Level::DEBUG)
            .with_writer(move || writer.clone())
            .finish();

        tracing::subscriber::with_default(subscriber, f);

        let bytes = logs.0.lock().unwrap();
        String::from_utf8_lossy(&bytes).into_owned()
    }

    assert_impl_all!(ChunkPool: Send, std::fmt::Debug, Default);
    assert_not_impl_any!(ChunkPool: Sync, Clone);

    #[test]
    fn new_pool_is_empty() {
        let pool = ChunkPool::new();

        assert!(!pool.is_initialized());
        assert!(!pool.is_degenerate());
        assert_eq!(pool.chunk_size(), 0);
        assert_eq!(pool.chunks_per_block(), 0);
        assert_eq!(pool.chunk_align(), 0);
        assert_eq!(pool.block_count(), 0);
        assert_eq!(pool.capacity(), 0);
        assert_eq!(pool.free_count(), 0);
        assert!(pool.is_empty());
        assert!(pool.allows_growth());
    }

    #[test]
    fn initialize_allocates_one_block() {
        let mut pool = ChunkPool::new();

        pool.initialize(24, 10).unwrap();

        assert!(pool.is_initialized());
        assert_eq!(pool.chunk_size(), 24);
        assert_eq!(pool.chunks_per_block(), 10);
        assert_eq!(pool.block_count(), 1);
        assert_eq!(pool.capacity(), 10);
        assert_eq!(pool.free_count(), 10);
    }

    #[test]
    fn exactly_one_block_of_chunks_without_growth() {
        for chunks_per_block in [1, 2, 7, 64] {
            let mut pool = ChunkPool::new();
            pool.set_allow_growth(false);
            pool.initialize(16, chunks_per_block).unwrap();

            for _ in 0..chunks_per_block {
                assert!(pool.alloc().is_some());
            }

            assert!(pool.alloc().is_none());
            assert_eq!(pool.len(), chunks_per_block);
            assert_eq!(pool.block_count(), 1);
        }
    }

    #[test]
    fn free_then_alloc_returns_same_chunk() {
        let mut pool = ChunkPool::new();
        pool.set_allow_growth(false);
        pool.initialize(32, 4).unwrap();

        let a = pool.alloc();
        let _b = pool.alloc();

        unsafe { pool.free(a) };

        assert_eq!(pool.alloc(), a);
    }

    #[test]
    fn free_none_is_noop() {
        let mut pool = ChunkPool::new();
        pool.initialize(8, 2).unwrap();

        unsafe { pool.free(None) };

        assert_eq!(pool.free_count(), 2);
        assert_eq!(pool.stats().frees(), 0);

        let mut empty = ChunkPool::new();
        unsafe { empty.free(None) };
        assert!(!empty.is_initialized());
    }

    #[test]
    fn growth_appends_new_block() {
        let mut pool = ChunkPool::new();
        pool.initialize(8, 3).unwrap();

        let chunks: Vec<_> = (0..4).map(|_| pool.alloc().unwrap()).collect();

        assert_eq!(pool.block_count(), 2);
        assert_eq!(pool.capacity(), 6);
        assert_eq!(pool.free_count(), 2);

        for chunk in &chunks {
            assert!(pool.owns_chunk_payload(*chunk));
        }
    }

    #[test]
    fn growth_disabled_reports_exhaustion() {
        let mut pool = ChunkPool::new();
        pool.initialize(8, 3).unwrap();
        pool.set_allow_growth(false);

        for _ in 0..3 {
            assert!(pool.alloc().is_some());
        }

        assert!(pool.alloc().is_none());
        assert_eq!(pool.block_count(), 1);
    }

    #[test]
    fn explicit_grow_appends_after_existing_free_chunks() {
        let mut pool = ChunkPool::new();
        pool.set_allow_growth(false);
        pool.initialize(8, 2).unwrap();

        let first_block_chunk = pool.alloc().unwrap();
        unsafe { pool.free(Some(first_block_chunk)) };

        pool.grow().unwrap();

        assert_eq!(pool.free_count(), 4);

        // Chunks from the first block come out before the appended ones.
        let a = pool.alloc().unwrap();
        let b = pool.alloc().unwrap();
        let c = pool.alloc().unwrap();
        let d = pool.alloc().unwrap();

        assert_eq!(a, first_block_chunk);

        let first_block_start = first_block_chunk.addr().get();
        let stride = pool.chunk_layout.unwrap().stride();

        assert_eq!(b.addr().get().abs_diff(first_block_start), stride);
        assert_ne!(c.addr().get().abs_diff(first_block_start), stride);
        assert_eq!(d.addr().get().abs_diff(c.addr().get()), stride);
        assert!(pool.alloc().is_none());
    }

    #[test]
    fn grow_requires_initialization() {
        let mut pool = ChunkPool::new();

        assert!(matches!(pool.grow(), Err(Error::NotInitialized)));
    }

    #[test]
    fn degenerate_configuration_is_accepted_but_empty() {
        for (chunk_size, chunks_per_block) in [(0, 0), (0, 8), (8, 0)] {
            let mut pool = ChunkPool::new();

            pool.initialize(chunk_size, chunks_per_block).unwrap();

            assert!(pool.is_initialized());
            assert!(pool.is_degenerate());
            assert_eq!(pool.block_count(), 0);
            assert!(pool.alloc().is_none());

            pool.set_allow_growth(false);
            assert!(pool.alloc().is_none());

            assert!(matches!(pool.grow(), Err(Error::DegenerateConfiguration)));
        }
    }

    #[test]
    fn destroy_is_idempotent() {
        let mut pool = ChunkPool::new();
        pool.initialize(8, 4).unwrap();
        pool.set_allow_growth(false);
        let _chunk = pool.alloc();

        pool.destroy();
        pool.destroy();

        assert!(!pool.is_initialized());
        assert_eq!(pool.chunk_size(), 0);
        assert_eq!(pool.chunks_per_block(), 0);
        assert_eq!(pool.block_count(), 0);
        assert_eq!(pool.free_count(), 0);
        assert_eq!(pool.stats(), PoolStats::default());
        assert!(pool.allows_growth());
    }

    #[test]
    fn reinitialize_releases_previous_blocks() {
        let mut pool = ChunkPool::new();
        pool.initialize(8, 2).unwrap();

        for _ in 0..5 {
            _ = pool.alloc();
        }
        assert_eq!(pool.block_count(), 3);

        pool.initialize(64, 5).unwrap();

        assert_eq!(pool.block_count(), 1);
        assert_eq!(pool.chunk_size(), 64);
        assert_eq!(pool.capacity(), 5);
        assert_eq!(pool.free_count(), 5);
        assert!(pool.is_empty());
    }

    #[test]
    fn reinitialize_keeps_growth_setting() {
        let mut pool = ChunkPool::new();
        pool.set_allow_growth(false);
        pool.initialize(8, 1).unwrap();

        pool.initialize(8, 1).unwrap();

        assert!(!pool.allows_growth());
        assert!(pool.alloc().is_some());
        assert!(pool.alloc().is_none());
    }

    #[test]
    fn failed_initialize_leaves_pool_empty() {
        let mut pool = ChunkPool::new();
        pool.initialize(8, 2).unwrap();

        let result = pool.initialize(1 << 20, usize::MAX / 2);

        assert!(matches!(result, Err(Error::LayoutOverflow { .. })));
        assert!(!pool.is_initialized());
        assert_eq!(pool.block_count(), 0);
        assert!(pool.alloc().is_none());
    }

    #[test]
    #[cfg(target_pointer_width = "64")]
    #[cfg_attr(miri, ignore = "Miri reports oversized allocations as resource exhaustion")]
    fn out_of_memory_on_initialize_leaves_pool_empty() {
        let mut pool = ChunkPool::new();
        pool.initialize(8, 2).unwrap();

        let mut result = Ok(());
        let logs = capture_logs(|| result = pool.initialize(1 << 40, 1 << 20));

        assert!(matches!(result, Err(Error::AllocationFailed { bytes }) if bytes > 1 << 60));
        assert!(logs.contains("block allocation failed"));
        assert!(!pool.is_initialized());
        assert_eq!(pool.block_count(), 0);
        assert!(pool.alloc().is_none());

        // The pool remains usable after the failure.
        pool.initialize(8, 2).unwrap();
        assert!(pool.alloc().is_some());
    }

    #[test]
    fn chunk_overflow_reports_requested_block_size() {
        let mut pool = ChunkPool::new();

        let result = pool.initialize_aligned(usize::MAX - 2, 16, 8);

        match result {
            Err(Error::LayoutOverflow {
                chunk_size,
                chunks_per_block,
            }) => {
                assert_eq!(chunk_size, usize::MAX - 2);
                assert_eq!(chunks_per_block, 16);
            }
            other => panic!("expected layout overflow, got {other:?}"),
        }

        assert!(!pool.is_initialized());
    }

    #[test]
    fn alloc_without_memory_does_not_attempt_growth() {
        let mut uninitialized = ChunkPool::new();
        let mut degenerate = ChunkPool::new();
        degenerate.initialize(0, 4).unwrap();

        let logs = capture_logs(|| {
            assert!(uninitialized.alloc().is_none());
            assert!(degenerate.alloc().is_none());
        });

        assert!(!logs.contains("could not grow"), "unexpected log output: {logs}");
        assert_eq!(uninitialized.block_count(), 0);
        assert_eq!(degenerate.block_count(), 0);
    }

    #[test]
    fn alloc_logs_failed_growth() {
        let mut pool = ChunkPool::new();
        pool.initialize(8, 1).unwrap();
        assert!(pool.alloc().is_some());

        // Forge a block size that cannot be laid out so the next growth fails.
        pool.chunks_per_block = usize::MAX;

        let mut chunk = None;
        let logs = capture_logs(|| chunk = pool.alloc());

        assert!(chunk.is_none());
        assert!(logs.contains("could not grow"));
        assert_eq!(pool.block_count(), 1);
    }

    #[test]
    fn invalid_alignment_is_error() {
        let mut pool = ChunkPool::new();

        let result = pool.initialize_aligned(8, 2, 24);

        assert!(matches!(result, Err(Error::InvalidAlignment { align: 24 })));
        assert!(!pool.is_initialized());
    }

    #[test]
    fn payloads_respect_alignment() {
        let mut pool = ChunkPool::new();
        pool.initialize_aligned(3, 5, 32).unwrap();

        assert_eq!(pool.chunk_align(), 32);

        for _ in 0..12 {
            let chunk = pool.alloc().unwrap();
            assert_eq!(chunk.addr().get() % 32, 0);
        }
    }

    #[test]
    fn small_alignment_is_raised_to_header_alignment() {
        let mut pool = ChunkPool::new();
        pool.initialize_aligned(3, 5, 1).unwrap();

        assert_eq!(pool.chunk_align(), HEADER_ALIGN);
    }

    #[test]
    fn stats_track_activity() {
        let mut pool = ChunkPool::new();
        pool.initialize(8, 2).unwrap();

        let a = pool.alloc();
        let b = pool.alloc();
        let c = pool.alloc();

        unsafe {
            pool.free(b);
            pool.free(a);
        }

        let stats = pool.stats();

        assert_eq!(stats.allocations(), 3);
        assert_eq!(stats.frees(), 2);
        assert_eq!(stats.in_use(), 1);
        assert_eq!(stats.peak_in_use(), 3);
        assert_eq!(stats.blocks(), 2);
        assert_eq!(stats.capacity(), 4);
        assert_eq!(pool.len(), 1);

        unsafe { pool.free(c) };
        assert!(pool.is_empty());
    }

    #[test]
    fn free_count_matches_capacity_minus_len() {
        let mut pool = ChunkPool::new();
        pool.initialize(16, 8).unwrap();

        let mut chunks = Vec::new();

        for _ in 0..13 {
            chunks.push(pool.alloc());
            assert_eq!(pool.free_count(), pool.capacity() - pool.len());
        }

        for chunk in chunks.drain(..) {
            unsafe { pool.free(chunk) };
            assert_eq!(pool.free_count(), pool.capacity() - pool.len());
        }
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic]
    fn free_foreign_pointer_panics_in_debug() {
        let mut pool = ChunkPool::new();
        pool.initialize(8, 2).unwrap();

        let mut other = ChunkPool::new();
        other.initialize(8, 2).unwrap();
        let foreign = other.alloc();

        unsafe { pool.free(foreign) };
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic]
    fn free_into_empty_pool_panics_in_debug() {
        let mut other = ChunkPool::new();
        other.initialize(8, 2).unwrap();
        let foreign = other.alloc();

        let mut pool = ChunkPool::new();
        unsafe { pool.free(foreign) };
    }

    #[test]
    fn pool_can_move_between_threads() {
        let mut pool = ChunkPool::new();
        pool.initialize(8, 4).unwrap();

        let pool = std::thread::spawn(move || {
            let chunk = pool.alloc();
            unsafe { pool.free(chunk) };
            pool
        })
        .join()
        .expect("thread completed successfully");

        assert_eq!(pool.stats().allocations(), 1);
        assert_eq!(pool.free_count(), 4);
    }
}
