//! Metrics for chunk pool growth.
//!
//! Only growth is observed here. The allocate and free paths are too hot to carry even the
//! small cost of an event observation.

use nm::{Event, Magnitude};

/// Histogram buckets for the size of newly allocated blocks, in bytes.
const BLOCK_BYTES_BUCKETS: &[Magnitude] = &[
    1024, 4096, 16_384, 65_536, 262_144, 1_048_576, 4_194_304, 16_777_216,
];

thread_local! {
    /// Event for observing the allocation of a new block by any pool on this thread.
    pub(crate) static BLOCKS_ALLOCATED: Event = Event::builder()
        .name("chunk_pool_blocks_allocated")
        .build();

    /// Event for observing the size of newly allocated blocks.
    ///
    /// The magnitude is the block size in bytes.
    pub(crate) static BLOCK_BYTES: Event = Event::builder()
        .name("chunk_pool_block_bytes")
        .histogram(BLOCK_BYTES_BUCKETS)
        .build();
}

/// Records the allocation of a block of `bytes` bytes.
pub(crate) fn record_block_allocated(bytes: usize) {
    BLOCKS_ALLOCATED.with(|event| event.observe_once());
    BLOCK_BYTES.with(|event| event.observe(bytes));
}

#[cfg(test)]
mod tests {
    use nm::Report;

    use super::*;

    #[test]
    fn block_allocation_is_reported() {
        record_block_allocated(4096);

        let report = Report::collect();

        let blocks = report
            .events()
            .find(|event| event.name() == "chunk_pool_blocks_allocated")
            .expect("event was observed on this thread");
        assert!(blocks.count() >= 1);

        let bytes = report
            .events()
            .find(|event| event.name() == "chunk_pool_block_bytes")
            .expect("event was observed on this thread");
        assert!(bytes.histogram().is_some());
    }
}
