use std::ptr::NonNull;

use crate::header::{get_next, set_next};

/// Intrusive singly linked stack of free chunks.
///
/// The links live in the chunk headers themselves, so the list needs no memory of its own beyond
/// the head pointer. Every chunk reachable from the head is a valid chunk header inside a live
/// block; the unsafe insertion methods are where callers vouch for this.
#[derive(Debug, Default)]
pub(crate) struct FreeList {
    head: Option<NonNull<u8>>,
}

impl FreeList {
    #[must_use]
    pub(crate) const fn new() -> Self {
        Self { head: None }
    }

    #[must_use]
    pub(crate) fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    /// Detaches and returns the chunk at the front of the list.
    #[must_use]
    pub(crate) fn pop(&mut self) -> Option<NonNull<u8>> {
        let chunk = self.head?;

        // SAFETY: Every chunk reachable from the head is a valid chunk header,
        // guaranteed by the callers of push() and append().
        self.head = unsafe { get_next(chunk) };

        Some(chunk)
    }

    /// Makes `chunk` the new front of the list.
    ///
    /// # Safety
    ///
    /// `chunk` must be the header address of a chunk inside a live block that outlives its
    /// membership in this list, and the chunk must not already be in the list.
    pub(crate) unsafe fn push(&mut self, chunk: NonNull<u8>) {
        // SAFETY: Forwarding guarantee from the caller that `chunk` is a valid chunk header.
        unsafe { set_next(chunk, self.head) };

        self.head = Some(chunk);
    }

    /// Attaches the chain starting at `chain` after the last chunk of the list.
    ///
    /// This walks the whole list to find its tail, which is acceptable because chains are only
    /// appended when the pool grows.
    ///
    /// # Safety
    ///
    /// `chain` must be the first chunk of a properly terminated chain of chunk headers inside live
    /// blocks that outlive their membership in this list. None of the chunks in the chain may
    /// already be in the list.
    pub(crate) unsafe fn append(&mut self, chain: NonNull<u8>) {
        let Some(mut tail) = self.head else {
            self.head = Some(chain);
            return;
        };

        // SAFETY: Every chunk reachable from the head is a valid chunk header.
        while let Some(next) = unsafe { get_next(tail) } {
            tail = next;
        }

        // SAFETY: `tail` is a valid chunk header that is part of this list.
        unsafe { set_next(tail, Some(chain)) };
    }

    /// Counts the chunks in the list by walking it.
    #[must_use]
    pub(crate) fn len(&self) -> usize {
        let mut count: usize = 0;
        let mut chunk = self.head;

        while let Some(current) = chunk {
            // Cannot overflow because every chunk occupies at least one pointer worth of memory.
            count = count.wrapping_add(1);

            // SAFETY: Every chunk reachable from the head is a valid chunk header.
            chunk = unsafe { get_next(current) };
        }

        count
    }

    /// Forgets all chunks in the list without touching their memory.
    pub(crate) fn clear(&mut self) {
        self.head = None;
    }
}

#[cfg(test)]
#[allow(
    clippy::undocumented_unsafe_blocks,
    clippy::multiple_unsafe_ops_per_block,
    clippy::indexing_slicing,
    reason = "tests focus on succinct code and do not need to tick all the boxes"
)]
mod tests {
    use new_zealand::nz;

    use super::*;
    use crate::layout::HEADER_ALIGN;
    use crate::{Block, ChunkLayout};

    fn block_of(count: usize) -> Block {
        let chunk_layout = ChunkLayout::calculate(8, HEADER_ALIGN).unwrap();
        Block::allocate(&chunk_layout, std::num::NonZero::new(count).unwrap()).unwrap()
    }

    #[test]
    fn new_list_is_empty() {
        let mut list = FreeList::new();

        assert!(list.is_empty());
        assert_eq!(list.len(), 0);
        assert_eq!(list.pop(), None);
    }

    #[test]
    fn append_to_empty_list_adopts_chain() {
        let block = block_of(4);
        let mut list = FreeList::new();

        unsafe { list.append(block.first_chunk()) };

        assert!(!list.is_empty());
        assert_eq!(list.len(), 4);
        assert_eq!(list.pop(), Some(block.first_chunk()));
        assert_eq!(list.len(), 3);
    }

    #[test]
    fn push_and_pop_are_lifo() {
        let block = block_of(3);
        let mut list = FreeList::new();

        unsafe { list.append(block.first_chunk()) };

        let a = list.pop().unwrap();
        let b = list.pop().unwrap();
        assert_ne!(a, b);

        unsafe {
            list.push(a);
            list.push(b);
        }

        assert_eq!(list.pop(), Some(b));
        assert_eq!(list.pop(), Some(a));
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn append_goes_after_existing_tail() {
        let first_block = block_of(2);
        let second_block = Block::allocate(
            &ChunkLayout::calculate(8, HEADER_ALIGN).unwrap(),
            nz!(2),
        )
        .unwrap();

        let mut list = FreeList::new();

        unsafe {
            list.append(first_block.first_chunk());
            list.append(second_block.first_chunk());
        }

        assert_eq!(list.len(), 4);

        // The existing chunks are handed out before the appended ones.
        let popped: Vec<_> = std::iter::from_fn(|| list.pop()).collect();

        assert_eq!(popped.len(), 4);
        assert!(popped[..2].iter().all(|chunk| first_block.contains_chunk(*chunk)));
        assert!(popped[2..].iter().all(|chunk| second_block.contains_chunk(*chunk)));
        assert!(list.is_empty());
    }

    #[test]
    fn clear_forgets_chunks() {
        let block = block_of(5);
        let mut list = FreeList::new();

        unsafe { list.append(block.first_chunk()) };
        list.clear();

        assert!(list.is_empty());
        assert_eq!(list.len(), 0);
    }
}
