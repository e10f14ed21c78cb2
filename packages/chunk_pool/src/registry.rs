use std::ptr::NonNull;

use crate::{Block, Error, Result};

/// Ordered collection of the blocks owned by a pool.
///
/// The registry exists to release memory at teardown. It is not consulted when allocating or
/// freeing chunks, except for debug-build validation of freed pointers.
#[derive(Debug, Default)]
pub(crate) struct BlockRegistry {
    blocks: Vec<Block>,
}

impl BlockRegistry {
    #[must_use]
    pub(crate) const fn new() -> Self {
        Self { blocks: Vec::new() }
    }

    /// Grows the registry by one block created by `create_block`, returning the first chunk of
    /// the new block.
    ///
    /// The growth is atomic: room for the new entry is reserved before the block is created and
    /// the entry is only committed once the block exists. If either step fails, the registry is
    /// left exactly as it was.
    pub(crate) fn try_push_with(
        &mut self,
        create_block: impl FnOnce() -> Result<Block>,
    ) -> Result<NonNull<u8>> {
        self.blocks
            .try_reserve(1)
            .map_err(|source| Error::RegistryFull { source })?;

        let block = create_block()?;
        let first_chunk = block.first_chunk();

        // Cannot reallocate because we reserved room above.
        self.blocks.push(block);

        Ok(first_chunk)
    }

    #[must_use]
    pub(crate) fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Total number of chunks across all blocks.
    #[must_use]
    pub(crate) fn chunk_count(&self) -> usize {
        self.blocks.iter().map(Block::chunk_count).sum()
    }

    /// Total number of bytes allocated for blocks.
    #[must_use]
    pub(crate) fn size_bytes(&self) -> usize {
        self.blocks.iter().map(Block::size_bytes).sum()
    }

    /// Whether `chunk` is the header address of a chunk in any registered block.
    #[must_use]
    pub(crate) fn contains_chunk(&self, chunk: NonNull<u8>) -> bool {
        self.blocks.iter().any(|block| block.contains_chunk(chunk))
    }

    /// Releases every block.
    pub(crate) fn clear(&mut self) {
        self.blocks.clear();
        self.blocks.shrink_to_fit();
    }
}
