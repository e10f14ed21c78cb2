use std::alloc::{Layout, alloc, dealloc};
use std::num::NonZero;
use std::ptr::NonNull;

use tracing::warn;

use crate::header::set_next;
use crate::{ChunkLayout, Error, Result};

/// One contiguous allocation subdivided into a fixed number of chunks.
///
/// On creation, every chunk in the block is linked to the chunk after it, with the last chunk
/// linking to nothing, so the block is a ready-made free chain starting at [`first_chunk()`].
///
/// The block does not keep references to its chunks. Callers may access chunk memory through
/// pointers for as long as the block is alive.
///
/// [`first_chunk()`]: Self::first_chunk
#[derive(Debug)]
pub(crate) struct Block {
    /// Start of the allocation, which is also the header of the first chunk.
    ptr: NonNull<u8>,

    /// Layout used for the allocation, required again for deallocation.
    layout: Layout,

    /// Distance between the starts of neighboring chunks.
    stride: usize,

    chunk_count: NonZero<usize>,
}

impl Block {
    /// Allocates a new block with `chunk_count` pre-linked chunks of the given layout.
    ///
    /// The chunk layout must describe non-empty payloads.
    pub(crate) fn allocate(chunk_layout: &ChunkLayout, chunk_count: NonZero<usize>) -> Result<Self> {
        debug_assert!(
            chunk_layout.chunk_size() > 0,
            "blocks are never allocated for zero-sized chunks"
        );

        let layout = chunk_layout.block_layout(chunk_count)?;
        let stride = chunk_layout.stride();

        // SAFETY: The layout has a non-zero size because the stride always includes the header
        // and the chunk count is non-zero.
        let Some(ptr) = NonNull::new(unsafe { alloc(layout) }) else {
            warn!(bytes = layout.size(), "chunk pool block allocation failed");
            return Err(Error::AllocationFailed {
                bytes: layout.size(),
            });
        };

        let mut chunk = ptr;

        for index in 1..chunk_count.get() {
            // Cannot overflow because the whole block fits in the layout we just allocated.
            let offset = index.wrapping_mul(stride);

            // SAFETY: index < chunk_count, so the offset is inside the allocation.
            let next = unsafe { ptr.byte_add(offset) };

            // SAFETY: `chunk` is the start of a chunk inside the allocation we exclusively own.
            unsafe { set_next(chunk, Some(next)) };

            chunk = next;
        }

        // SAFETY: `chunk` is now the last chunk of the allocation we exclusively own.
        unsafe { set_next(chunk, None) };

        Ok(Self {
            ptr,
            layout,
            stride,
            chunk_count,
        })
    }

    /// The header address of the first chunk, which heads the chain covering the whole block.
    #[must_use]
    pub(crate) fn first_chunk(&self) -> NonNull<u8> {
        self.ptr
    }

    #[must_use]
    pub(crate) fn chunk_count(&self) -> usize {
        self.chunk_count.get()
    }

    /// Size of the underlying allocation in bytes.
    #[must_use]
    pub(crate) fn size_bytes(&self) -> usize {
        self.layout.size()
    }

    /// Whether `chunk` is the header address of one of the chunks in this block.
    #[must_use]
    pub(crate) fn contains_chunk(&self, chunk: NonNull<u8>) -> bool {
        let start = self.ptr.addr().get();
        let address = chunk.addr().get();

        let Some(offset) = address.checked_sub(start) else {
            return false;
        };

        offset < self.layout.size() && offset.checked_rem(self.stride) == Some(0)
    }
}

impl Drop for Block {
    fn drop(&mut self) {
        // SAFETY: We allocated this memory with this exact layout in allocate()
        // and it has not been deallocated yet.
        unsafe {
            dealloc(self.ptr.as_ptr(), self.layout);
        }
    }
}

#[cfg(test)]
#[allow(
    clippy::undocumented_unsafe_blocks,
    clippy::multiple_unsafe_ops_per_block,
    reason = "tests focus on succinct code and do not need to tick all the boxes"
)]
mod tests {
    use new_zealand::nz;

    use super::*;
    use crate::header::get_next;

    fn layout_for(chunk_size: usize) -> ChunkLayout {
        ChunkLayout::calculate(chunk_size, crate::layout::HEADER_ALIGN).unwrap()
    }

    #[test]
    fn chunks_are_chained_in_address_order() {
        let chunk_layout = layout_for(4);
        let block = Block::allocate(&chunk_layout, nz!(5)).unwrap();

        let mut chunk = Some(block.first_chunk());
        let mut visited = 0;

        while let Some(current) = chunk {
            assert_eq!(
                current.addr().get() - block.first_chunk().addr().get(),
                visited * chunk_layout.stride()
            );

            visited += 1;
            chunk = unsafe { get_next(current) };
        }

        assert_eq!(visited, 5);
        assert_eq!(block.chunk_count(), 5);
    }

    #[test]
    fn single_chunk_block_ends_immediately() {
        let block = Block::allocate(&layout_for(16), nz!(1)).unwrap();

        assert_eq!(unsafe { get_next(block.first_chunk()) }, None);
    }

    #[test]
    fn size_is_stride_times_count() {
        let chunk_layout = layout_for(100);
        let block = Block::allocate(&chunk_layout, nz!(7)).unwrap();

        assert_eq!(block.size_bytes(), chunk_layout.stride() * 7);
    }

    #[test]
    fn contains_chunk_accepts_only_chunk_boundaries() {
        let chunk_layout = layout_for(8);
        let block = Block::allocate(&chunk_layout, nz!(3)).unwrap();
        let first = block.first_chunk();

        assert!(block.contains_chunk(first));
        assert!(block.contains_chunk(unsafe { first.byte_add(chunk_layout.stride()) }));
        assert!(block.contains_chunk(unsafe { first.byte_add(chunk_layout.stride() * 2) }));

        // Inside the block but not on a chunk boundary.
        assert!(!block.contains_chunk(unsafe { first.byte_add(1) }));

        // Just past the end of the block.
        let past_end =
            NonNull::new(first.as_ptr().wrapping_byte_add(chunk_layout.stride() * 3)).unwrap();
        assert!(!block.contains_chunk(past_end));

        // Somewhere else entirely.
        let mut unrelated = 0_u64;
        assert!(!block.contains_chunk(NonNull::from(&mut unrelated).cast()));
    }

    #[test]
    fn oversized_block_is_error() {
        let chunk_layout = layout_for(1 << 20);

        let result = Block::allocate(&chunk_layout, NonZero::new(usize::MAX / 4).unwrap());

        assert!(matches!(result, Err(Error::LayoutOverflow { .. })));
    }
}
