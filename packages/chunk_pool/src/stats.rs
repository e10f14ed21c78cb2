/// A snapshot of the allocation activity of a [`ChunkPool`][crate::ChunkPool].
///
/// The counters only observe the pool. They never influence allocation behavior and they are
/// reset by [`destroy()`][crate::ChunkPool::destroy].
///
/// # Examples
///
/// ```
/// use chunk_pool::ChunkPool;
///
/// let mut pool = ChunkPool::builder()
///     .chunk_size(32)
///     .chunks_per_block(4)
///     .build()
///     .unwrap();
///
/// let a = pool.alloc();
/// let b = pool.alloc();
///
/// // SAFETY: Both pointers came from this pool and are freed exactly once.
/// unsafe {
///     pool.free(a);
///     pool.free(b);
/// }
///
/// let stats = pool.stats();
/// assert_eq!(stats.allocations(), 2);
/// assert_eq!(stats.frees(), 2);
/// assert_eq!(stats.in_use(), 0);
/// assert_eq!(stats.peak_in_use(), 2);
/// assert_eq!(stats.capacity(), 4);
/// ```
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct PoolStats {
    pub(crate) allocations: u64,
    pub(crate) frees: u64,
    pub(crate) in_use: usize,
    pub(crate) peak_in_use: usize,
    pub(crate) blocks: usize,
    pub(crate) capacity: usize,
}

impl PoolStats {
    /// Number of successful allocations since the pool was last initialized.
    #[must_use]
    pub fn allocations(&self) -> u64 {
        self.allocations
    }

    /// Number of chunks returned to the pool since it was last initialized.
    #[must_use]
    pub fn frees(&self) -> u64 {
        self.frees
    }

    /// Number of chunks currently handed out to callers.
    #[must_use]
    pub fn in_use(&self) -> usize {
        self.in_use
    }

    /// The largest value [`in_use()`][Self::in_use] has reached since the pool was last
    /// initialized.
    #[must_use]
    pub fn peak_in_use(&self) -> usize {
        self.peak_in_use
    }

    /// Number of blocks the pool holds.
    #[must_use]
    pub fn blocks(&self) -> usize {
        self.blocks
    }

    /// Number of chunks across all blocks.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Running counters kept by the pool.
#[derive(Debug, Default)]
pub(crate) struct Counters {
    allocations: u64,
    frees: u64,
    in_use: usize,
    peak_in_use: usize,
}

impl Counters {
    #[must_use]
    pub(crate) const fn new() -> Self {
        Self {
            allocations: 0,
            frees: 0,
            in_use: 0,
            peak_in_use: 0,
        }
    }

    #[cfg_attr(test, mutants::skip)] // Observability only, pool behavior does not depend on it.
    pub(crate) fn record_alloc(&mut self) {
        self.allocations = self.allocations.wrapping_add(1);

        // Cannot overflow because every chunk in use occupies memory.
        self.in_use = self.in_use.wrapping_add(1);
        self.peak_in_use = self.peak_in_use.max(self.in_use);
    }

    #[cfg_attr(test, mutants::skip)] // Observability only, pool behavior does not depend on it.
    pub(crate) fn record_free(&mut self) {
        self.frees = self.frees.wrapping_add(1);

        // Freeing more than was allocated is caller error; we do not let it wrap around.
        self.in_use = self.in_use.saturating_sub(1);
    }

    #[must_use]
    pub(crate) fn in_use(&self) -> usize {
        self.in_use
    }

    pub(crate) fn reset(&mut self) {
        *self = Self::default();
    }

    #[must_use]
    pub(crate) fn snapshot(&self, blocks: usize, capacity: usize) -> PoolStats {
        PoolStats {
            allocations: self.allocations,
            frees: self.frees,
            in_use: self.in_use,
            peak_in_use: self.peak_in_use,
            blocks,
            capacity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn peak_tracks_high_water_mark() {
        let mut counters = Counters::default();

        counters.record_alloc();
        counters.record_alloc();
        counters.record_alloc();
        counters.record_free();
        counters.record_free();
        counters.record_alloc();

        let stats = counters.snapshot(1, 8);

        assert_eq!(stats.allocations(), 4);
        assert_eq!(stats.frees(), 2);
        assert_eq!(stats.in_use(), 2);
        assert_eq!(stats.peak_in_use(), 3);
        assert_eq!(stats.blocks(), 1);
        assert_eq!(stats.capacity(), 8);
    }

    #[test]
    fn excess_free_does_not_wrap() {
        let mut counters = Counters::default();

        counters.record_free();

        assert_eq!(counters.in_use(), 0);
    }

    #[test]
    fn reset_clears_everything() {
        let mut counters = Counters::default();
        counters.record_alloc();
        counters.record_free();

        counters.reset();

        assert_eq!(counters.snapshot(0, 0), PoolStats::default());
    }
}
