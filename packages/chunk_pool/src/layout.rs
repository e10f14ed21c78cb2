use std::alloc::Layout;
use std::num::NonZero;

use crate::header::Header;
use crate::{Error, Result};

/// Alignment of the chunk header. Payloads are always at least this aligned.
pub(crate) const HEADER_ALIGN: usize = align_of::<Header>();

/// Memory layout of one chunk: a header followed by the caller-visible payload.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) struct ChunkLayout {
    /// Payload size requested by the caller.
    chunk_size: usize,

    /// Distance between the starts of two neighboring chunks in a block. This is the header plus
    /// the payload, padded so that the next header is properly aligned.
    stride: usize,

    /// Byte offset from the chunk header to the payload.
    payload_offset: usize,

    /// Alignment of every chunk in a block (and therefore of every payload).
    align: usize,
}

impl ChunkLayout {
    /// Calculates the chunk layout for payloads of `chunk_size` bytes aligned to `chunk_align`.
    ///
    /// Alignments below the header alignment are raised to it.
    pub(crate) fn calculate(chunk_size: usize, chunk_align: usize) -> Result<Self> {
        if !chunk_align.is_power_of_two() {
            return Err(Error::InvalidAlignment { align: chunk_align });
        }

        let overflow = || Error::LayoutOverflow {
            chunk_size,
            chunks_per_block: 1,
        };

        let payload_layout = Layout::from_size_align(chunk_size, chunk_align)
            .map_err(|_layout_error| overflow())?;

        let (combined_layout, payload_offset) = Layout::new::<Header>()
            .extend(payload_layout)
            .map_err(|_layout_error| overflow())?;

        // Padding to alignment makes the size usable as the array stride.
        let combined_layout = combined_layout.pad_to_align();

        Ok(Self {
            chunk_size,
            stride: combined_layout.size(),
            payload_offset,
            align: combined_layout.align(),
        })
    }

    #[must_use]
    pub(crate) fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    #[must_use]
    pub(crate) fn stride(&self) -> usize {
        self.stride
    }

    #[must_use]
    pub(crate) fn payload_offset(&self) -> usize {
        self.payload_offset
    }

    #[must_use]
    pub(crate) fn align(&self) -> usize {
        self.align
    }

    /// Layout of a block that holds `chunks_per_block` chunks.
    pub(crate) fn block_layout(&self, chunks_per_block: NonZero<usize>) -> Result<Layout> {
        let overflow = || Error::LayoutOverflow {
            chunk_size: self.chunk_size,
            chunks_per_block: chunks_per_block.get(),
        };

        let size = self
            .stride
            .checked_mul(chunks_per_block.get())
            .ok_or_else(overflow)?;

        Layout::from_size_align(size, self.align).map_err(|_layout_error| overflow())
    }
}
