//! The link field stored at the start of every chunk.
//!
//! All knowledge of where the header lives and what it contains is kept in this module. The rest
//! of the crate only deals with chunk addresses (the address of the header) and payload addresses
//! (what callers see).

use std::ptr::NonNull;

/// Contents of a chunk header: the address of the next free chunk, or `None` at the end of a
/// chain. The null niche keeps this exactly one pointer wide.
pub(crate) type Header = Option<NonNull<u8>>;

/// Reads the next-chunk link from the header of `chunk`.
///
/// # Safety
///
/// `chunk` must point to the start of a chunk inside a live block. The header must have been
/// written at least once (blocks pre-link every chunk when allocated, so this always holds for
/// chunks obtained from a block).
#[must_use]
pub(crate) unsafe fn get_next(chunk: NonNull<u8>) -> Option<NonNull<u8>> {
    // SAFETY: The caller guarantees that `chunk` points to an initialized header inside a live
    // block. Chunk strides are padded to the header alignment so the read is aligned.
    unsafe { chunk.cast::<Header>().read() }
}

/// Writes the next-chunk link into the header of `chunk`.
///
/// # Safety
///
/// `chunk` must point to the start of a chunk inside a live block that nobody else is
/// accessing the header of.
pub(crate) unsafe fn set_next(chunk: NonNull<u8>, next: Option<NonNull<u8>>) {
    // SAFETY: The caller guarantees that `chunk` points to a chunk header inside a live block
    // that we have exclusive access to. Chunk strides are padded to the header alignment.
    unsafe { chunk.cast::<Header>().write(next) };
}

#[cfg(test)]
#[allow(
    clippy::undocumented_unsafe_blocks,
    clippy::multiple_unsafe_ops_per_block,
    reason = "tests focus on succinct code and do not need to tick all the boxes"
)]
mod tests {
    use std::mem::MaybeUninit;

    use super::*;

    #[test]
    fn header_is_pointer_sized() {
        assert_eq!(size_of::<Header>(), size_of::<*mut u8>());
    }

    #[test]
    fn set_then_get_links() {
        let mut first = MaybeUninit::<Header>::uninit();
        let mut second = MaybeUninit::<Header>::uninit();

        let first_ptr = NonNull::from(&mut first).cast::<u8>();
        let second_ptr = NonNull::from(&mut second).cast::<u8>();

        unsafe {
            set_next(first_ptr, Some(second_ptr));
            set_next(second_ptr, None);

            assert_eq!(get_next(first_ptr), Some(second_ptr));
            assert_eq!(get_next(second_ptr), None);
        }
    }
}
