//! Raw block header and trailer layouts.
//!
//! The external allocator brackets every tracked allocation with a fixed
//! little-endian header and trailer:
//!
//! ```text
//! Header (24 bytes)                    Trailer (16 bytes)
//! Offset  Size  Field                  Offset  Size  Field
//!   0       4   magic                    0       4   free stack-trace id
//!   4       4   checksum                 4       4   allocating thread id
//!   8       4   body size                8       4   freeing thread id
//!  12       2   header padding size     12       4   heap id
//!  14       2   trailer padding size
//!  16       1   allocation state
//!  17       3   reserved (zero)
//!  20       4   alloc stack-trace id
//! ```
//!
//! Stack-trace ids are weak references into an external trace cache; this
//! crate stores and digests them but never resolves them. All field reads
//! go through [`HeaderView`]/[`TrailerView`] so nothing is dereferenced
//! outside the tracked span.

use crate::util::span::HeapSpan;

/// Sentinel value expected in every block header's magic field.
pub const BLOCK_HEADER_MAGIC: u32 = 0xB10C_CAFE;

/// Size of the fixed block header in bytes.
pub const BLOCK_HEADER_SIZE: usize = 24;

/// Size of the fixed block trailer in bytes.
pub const BLOCK_TRAILER_SIZE: usize = 16;

pub(crate) const OFFSET_MAGIC: usize = 0;
pub(crate) const OFFSET_CHECKSUM: usize = 4;
pub(crate) const OFFSET_BODY_SIZE: usize = 8;
pub(crate) const OFFSET_HEADER_PADDING: usize = 12;
pub(crate) const OFFSET_TRAILER_PADDING: usize = 14;
pub(crate) const OFFSET_STATE: usize = 16;
pub(crate) const OFFSET_ALLOC_TRACE_ID: usize = 20;

/// Allocation state recorded in a block header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockState {
    /// Live allocation; the body belongs to the application.
    Allocated,
    /// Freed but retained by the allocator to catch use-after-free; the
    /// body must stay exactly as poisoned.
    Quarantined,
    /// Freed and released from quarantine.
    Freed,
}

impl BlockState {
    /// Decode the raw state byte. Returns `None` for values the allocator
    /// never writes.
    pub fn from_raw(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(Self::Allocated),
            1 => Some(Self::Quarantined),
            2 => Some(Self::Freed),
            _ => None,
        }
    }

    /// Raw byte as stored in the header.
    pub fn as_raw(self) -> u8 {
        match self {
            Self::Allocated => 0,
            Self::Quarantined => 1,
            Self::Freed => 2,
        }
    }
}

/// Bounds-checked field reader over one block header.
///
/// Constructing the view only records the base address; each getter
/// re-checks its own extent against the span, so a header truncated by the
/// span edge reads as `None` rather than faulting.
#[derive(Debug, Clone, Copy)]
pub struct HeaderView<'a> {
    span: HeapSpan<'a>,
    base: usize,
}

impl<'a> HeaderView<'a> {
    /// View the header claimed to start at `base`.
    pub fn new(span: HeapSpan<'a>, base: usize) -> Self {
        Self { span, base }
    }

    /// Address of the header's first byte.
    #[inline]
    pub fn base(&self) -> usize {
        self.base
    }

    /// Magic sentinel field.
    pub fn magic(&self) -> Option<u32> {
        self.span.read_u32(self.base + OFFSET_MAGIC)
    }

    /// Stored checksum field.
    pub fn checksum(&self) -> Option<u32> {
        self.span.read_u32(self.base + OFFSET_CHECKSUM)
    }

    /// Body size in bytes.
    pub fn body_size(&self) -> Option<usize> {
        self.span
            .read_u32(self.base + OFFSET_BODY_SIZE)
            .map(|v| v as usize)
    }

    /// Padding between header and body, in bytes.
    pub fn header_padding(&self) -> Option<usize> {
        self.span
            .read_u16(self.base + OFFSET_HEADER_PADDING)
            .map(|v| v as usize)
    }

    /// Padding between body and trailer, in bytes.
    pub fn trailer_padding(&self) -> Option<usize> {
        self.span
            .read_u16(self.base + OFFSET_TRAILER_PADDING)
            .map(|v| v as usize)
    }

    /// Raw allocation-state byte.
    pub fn state_raw(&self) -> Option<u8> {
        self.span.read_u8(self.base + OFFSET_STATE)
    }

    /// Decoded allocation state, if the raw byte is recognizable.
    pub fn state(&self) -> Option<BlockState> {
        self.state_raw().and_then(BlockState::from_raw)
    }

    /// Weak id of the allocation stack trace.
    pub fn alloc_trace_id(&self) -> Option<u32> {
        self.span.read_u32(self.base + OFFSET_ALLOC_TRACE_ID)
    }
}

/// Bounds-checked field reader over one block trailer.
///
/// The checker treats trailer contents as opaque digest input; the typed
/// getters exist for diagnostic consumers.
#[derive(Debug, Clone, Copy)]
pub struct TrailerView<'a> {
    span: HeapSpan<'a>,
    base: usize,
}

impl<'a> TrailerView<'a> {
    /// View the trailer starting at `base`.
    pub fn new(span: HeapSpan<'a>, base: usize) -> Self {
        Self { span, base }
    }

    /// Weak id of the free stack trace (zero while allocated).
    pub fn free_trace_id(&self) -> Option<u32> {
        self.span.read_u32(self.base)
    }

    /// Id of the allocating thread.
    pub fn alloc_thread_id(&self) -> Option<u32> {
        self.span.read_u32(self.base + 4)
    }

    /// Id of the freeing thread (zero while allocated).
    pub fn free_thread_id(&self) -> Option<u32> {
        self.span.read_u32(self.base + 8)
    }

    /// Id of the owning heap.
    pub fn heap_id(&self) -> Option<u32> {
        self.span.read_u32(self.base + 12)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: usize = 0x4000_0000;

    fn sample_header() -> [u8; BLOCK_HEADER_SIZE] {
        let mut bytes = [0u8; BLOCK_HEADER_SIZE];
        bytes[OFFSET_MAGIC..OFFSET_MAGIC + 4].copy_from_slice(&BLOCK_HEADER_MAGIC.to_le_bytes());
        bytes[OFFSET_CHECKSUM..OFFSET_CHECKSUM + 4].copy_from_slice(&0x1234_5678u32.to_le_bytes());
        bytes[OFFSET_BODY_SIZE..OFFSET_BODY_SIZE + 4].copy_from_slice(&100u32.to_le_bytes());
        bytes[OFFSET_TRAILER_PADDING..OFFSET_TRAILER_PADDING + 2]
            .copy_from_slice(&4u16.to_le_bytes());
        bytes[OFFSET_STATE] = BlockState::Quarantined.as_raw();
        bytes[OFFSET_ALLOC_TRACE_ID..OFFSET_ALLOC_TRACE_ID + 4]
            .copy_from_slice(&77u32.to_le_bytes());
        bytes
    }

    #[test]
    fn test_field_reads() {
        let bytes = sample_header();
        let span = HeapSpan::new(BASE, &bytes);
        let header = HeaderView::new(span, BASE);

        assert_eq!(header.base(), BASE);
        assert_eq!(header.magic(), Some(BLOCK_HEADER_MAGIC));
        assert_eq!(header.checksum(), Some(0x1234_5678));
        assert_eq!(header.body_size(), Some(100));
        assert_eq!(header.header_padding(), Some(0));
        assert_eq!(header.trailer_padding(), Some(4));
        assert_eq!(header.state(), Some(BlockState::Quarantined));
        assert_eq!(header.alloc_trace_id(), Some(77));
    }

    #[test]
    fn test_truncated_header_reads_none() {
        let bytes = sample_header();
        let span = HeapSpan::new(BASE, &bytes[..OFFSET_STATE]);
        let header = HeaderView::new(span, BASE);

        assert_eq!(header.magic(), Some(BLOCK_HEADER_MAGIC));
        assert_eq!(header.state(), None);
        assert_eq!(header.alloc_trace_id(), None);
    }

    #[test]
    fn test_trailer_field_reads() {
        let mut bytes = [0u8; BLOCK_TRAILER_SIZE];
        bytes[0..4].copy_from_slice(&9u32.to_le_bytes());
        bytes[4..8].copy_from_slice(&0x1001u32.to_le_bytes());
        bytes[12..16].copy_from_slice(&3u32.to_le_bytes());
        let span = HeapSpan::new(BASE, &bytes);
        let trailer = TrailerView::new(span, BASE);

        assert_eq!(trailer.free_trace_id(), Some(9));
        assert_eq!(trailer.alloc_thread_id(), Some(0x1001));
        assert_eq!(trailer.free_thread_id(), Some(0));
        assert_eq!(trailer.heap_id(), Some(3));
    }

    #[test]
    fn test_unknown_state_byte() {
        assert_eq!(BlockState::from_raw(0), Some(BlockState::Allocated));
        assert_eq!(BlockState::from_raw(3), None);
        assert_eq!(BlockState::from_raw(0xCD), None);
    }
}
