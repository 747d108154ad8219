//! Block metadata digests.
//!
//! The digest seals a block's metadata against in-place tampering. It is
//! XXH3-64 folded to the 32 bits the header's checksum field holds,
//! computed over:
//!
//! - the header bytes, with the checksum field itself zeroed,
//! - the body bytes, but only for quarantined/freed blocks (a live body is
//!   application-owned and mutable; a poisoned body must not change),
//! - the trailer bytes.
//!
//! Padding bytes carry no sealed content and are excluded.

use xxhash_rust::xxh3::Xxh3;

use crate::util::span::HeapSpan;

use super::header::{
    BlockState, HeaderView, BLOCK_HEADER_SIZE, BLOCK_TRAILER_SIZE, OFFSET_CHECKSUM,
};
use super::layout::{BlockInfo, ParseError};

/// Compute the digest for a block with the given extents.
///
/// Reads the allocation state from the header to decide body coverage;
/// fails with [`ParseError::UnknownBlockState`] when the state byte is
/// unrecognizable and with [`ParseError::OutOfBounds`] when any covered
/// region leaves the span.
pub fn compute(heap: &HeapSpan<'_>, info: &BlockInfo) -> Result<u32, ParseError> {
    let address = info.header_addr;
    let header_bytes = heap
        .bytes_at(address, BLOCK_HEADER_SIZE)
        .ok_or(ParseError::OutOfBounds { address })?;
    let trailer_bytes = heap
        .bytes_at(info.trailer_addr, BLOCK_TRAILER_SIZE)
        .ok_or(ParseError::OutOfBounds { address })?;
    let state = HeaderView::new(*heap, address)
        .state()
        .ok_or(ParseError::UnknownBlockState { address })?;

    let mut hasher = Xxh3::new();
    hasher.update(&header_bytes[..OFFSET_CHECKSUM]);
    hasher.update(&[0u8; 4]);
    hasher.update(&header_bytes[OFFSET_CHECKSUM + 4..]);

    if state != BlockState::Allocated {
        let body = heap
            .bytes_at(info.body_addr, info.body_size)
            .ok_or(ParseError::OutOfBounds { address })?;
        hasher.update(body);
    }

    hasher.update(trailer_bytes);

    let digest = hasher.digest();
    Ok((digest ^ (digest >> 32)) as u32)
}

/// Recompute the digest and compare it against the stored checksum field.
///
/// Any anomaly (unreadable fields, unknown state) verifies as `false`; the
/// caller classifies the block corrupt rather than handling an error.
pub fn verify(heap: &HeapSpan<'_>, info: &BlockInfo) -> bool {
    let stored = match HeaderView::new(*heap, info.header_addr).checksum() {
        Some(stored) => stored,
        None => return false,
    };
    match compute(heap, info) {
        Ok(expected) => expected == stored,
        Err(_) => false,
    }
}
