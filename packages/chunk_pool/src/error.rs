use std::collections::TryReserveError;

use thiserror::Error;

/// Errors that can occur when reserving memory for a [`ChunkPool`][crate::ChunkPool].
///
/// Misuse of the pool (freeing foreign pointers, double free) is not reported through this type.
/// Such misuse is undefined behavior and is only caught by debug assertions, if at all.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The system allocator could not provide memory for a new block.
    #[error("failed to allocate a memory block of {bytes} bytes")]
    AllocationFailed {
        /// Size of the block allocation that failed.
        bytes: usize,
    },

    /// The block registry could not make room for one more block.
    #[error("failed to grow the block registry")]
    RegistryFull {
        /// The underlying reservation failure.
        #[source]
        source: TryReserveError,
    },

    /// The requested chunk or block size does not fit in the address space.
    #[error(
        "chunk size {chunk_size} with {chunks_per_block} chunks per block exceeds the addressable memory size"
    )]
    LayoutOverflow {
        /// The configured chunk size in bytes.
        chunk_size: usize,

        /// The configured number of chunks per block.
        chunks_per_block: usize,
    },

    /// The requested chunk alignment is not a power of two.
    #[error("chunk alignment {align} is not a power of two")]
    InvalidAlignment {
        /// The alignment that was requested.
        align: usize,
    },

    /// Growth was requested on a pool that has not been initialized.
    #[error("the chunk pool has not been initialized")]
    NotInitialized,

    /// Growth was requested on a pool configured with a zero chunk size or zero chunks per block.
    #[error("the chunk pool is configured with zero-sized chunks or blocks and cannot grow")]
    DegenerateConfiguration,
}

/// A specialized `Result` type for chunk pool operations, returning the crate's
/// [`Error`] type as the error value.
pub type Result<T> = std::result::Result<T, Error>;
